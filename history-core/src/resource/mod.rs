//! Public resource representations
//!
//! Adapters map raw rows (plus the ledger they closed in, where one applies)
//! to the JSON documents clients see. Every resource exposes a paging token
//! and hypermedia links rooted at the configured base URL.

mod page;

pub use page::{Page, PageLinks};

use crate::asset::Asset;
use crate::error::{Error, Result};
use crate::types::{amount_string, Ledger, Offer, Operation, Price, Transaction};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A hypermedia link
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    /// Target URL
    pub href: String,
    /// Whether `href` is a URI template
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub templated: bool,
}

/// Builds links under one base URL
#[derive(Debug, Clone)]
pub struct LinkBuilder {
    base_url: String,
}

impl LinkBuilder {
    /// Links rooted at `base_url`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Absolute URL for `path`
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Plain link to `path`
    pub fn link(&self, path: &str) -> Link {
        Link {
            href: self.url(path),
            templated: false,
        }
    }

    /// Templated link to `path`
    pub fn templated(&self, path: &str) -> Link {
        Link {
            href: self.url(path),
            templated: true,
        }
    }
}

/// Records that can appear in a page or on a stream
pub trait Pageable {
    /// Cursor clients resume from
    fn paging_token(&self) -> &str;
}

/// Asset as rendered in resources
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetResource {
    /// `native`, `credit_alphanum4` or `credit_alphanum12`
    pub asset_type: &'static str,
    /// Asset code, absent for native
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_code: Option<String>,
    /// Issuer, absent for native
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_issuer: Option<String>,
}

impl From<&Asset> for AssetResource {
    fn from(asset: &Asset) -> Self {
        if asset.is_native() {
            return Self {
                asset_type: asset.asset_type().name(),
                asset_code: None,
                asset_issuer: None,
            };
        }
        Self {
            asset_type: asset.asset_type().name(),
            asset_code: Some(asset.code().to_string()),
            asset_issuer: Some(asset.issuer().to_string()),
        }
    }
}

/// Links of a transaction
#[derive(Debug, Clone, Serialize)]
pub struct TransactionLinks {
    #[serde(rename = "self")]
    self_: Link,
    account: Link,
    ledger: Link,
    operations: Link,
    precedes: Link,
    succeeds: Link,
}

/// Transaction resource
#[derive(Debug, Clone, Serialize)]
pub struct TransactionResource {
    #[serde(rename = "_links")]
    links: TransactionLinks,
    /// Transaction hash
    pub id: String,
    /// Paging token
    pub paging_token: String,
    /// Outcome; legacy rows without a flag render as successful
    pub successful: bool,
    /// Transaction hash
    pub hash: String,
    /// Ledger sequence
    pub ledger: i32,
    /// Close time of the ledger
    pub created_at: DateTime<Utc>,
    /// Source account
    pub source_account: String,
    /// Source account sequence number
    pub source_account_sequence: String,
    /// Fee charged (stroops)
    pub fee_paid: i32,
    /// Number of operations
    pub operation_count: i32,
    /// Envelope, base64 XDR
    pub envelope_xdr: String,
    /// Result, base64 XDR
    pub result_xdr: String,
    /// Result meta, base64 XDR
    pub result_meta_xdr: String,
    /// Fee meta, base64 XDR
    pub fee_meta_xdr: String,
    /// Memo type
    pub memo_type: String,
    /// Memo value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    /// Signatures
    pub signatures: Vec<String>,
    /// Time bound lower edge
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_after: Option<DateTime<Utc>>,
    /// Time bound upper edge
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_before: Option<DateTime<Utc>>,
}

fn time_bound(value: Option<i64>) -> Option<DateTime<Utc>> {
    value
        .filter(|secs| *secs > 0)
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

impl TransactionResource {
    /// Adapt a transaction row closed in `ledger`
    pub fn new(row: &Transaction, ledger: &Ledger, links: &LinkBuilder) -> Self {
        let token = row.paging_token();
        let signatures = row
            .signatures
            .split(',')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        Self {
            links: TransactionLinks {
                self_: links.link(&format!("/transactions/{}", row.transaction_hash)),
                account: links.link(&format!("/accounts/{}", row.account)),
                ledger: links.link(&format!("/ledgers/{}", row.ledger_sequence)),
                operations: links.templated(&format!(
                    "/transactions/{}/operations{{?cursor,limit,order}}",
                    row.transaction_hash
                )),
                precedes: links.link(&format!("/transactions?order=asc&cursor={}", token)),
                succeeds: links.link(&format!("/transactions?order=desc&cursor={}", token)),
            },
            id: row.transaction_hash.clone(),
            paging_token: token,
            successful: row.is_successful(),
            hash: row.transaction_hash.clone(),
            ledger: row.ledger_sequence,
            created_at: ledger.closed_at,
            source_account: row.account.clone(),
            source_account_sequence: row.account_sequence.to_string(),
            fee_paid: row.fee_paid,
            operation_count: row.operation_count,
            envelope_xdr: row.tx_envelope.clone(),
            result_xdr: row.tx_result.clone(),
            result_meta_xdr: row.tx_meta.clone(),
            fee_meta_xdr: row.tx_fee_meta.clone(),
            memo_type: row.memo_type.clone(),
            memo: row.memo.clone(),
            signatures,
            valid_after: time_bound(row.valid_after),
            valid_before: time_bound(row.valid_before),
        }
    }
}

impl Pageable for TransactionResource {
    fn paging_token(&self) -> &str {
        &self.paging_token
    }
}

/// Links of an operation
#[derive(Debug, Clone, Serialize)]
pub struct OperationLinks {
    #[serde(rename = "self")]
    self_: Link,
    transaction: Link,
    precedes: Link,
    succeeds: Link,
}

/// Operation resource
#[derive(Debug, Clone, Serialize)]
pub struct OperationResource {
    #[serde(rename = "_links")]
    links: OperationLinks,
    /// Operation id
    pub id: String,
    /// Paging token
    pub paging_token: String,
    /// Outcome of the owning transaction
    pub transaction_successful: bool,
    /// Source account
    pub source_account: String,
    /// Type name
    #[serde(rename = "type")]
    pub type_name: &'static str,
    /// Type code
    pub type_i: i32,
    /// Close time of the ledger
    pub created_at: DateTime<Utc>,
    /// Hash of the owning transaction
    pub transaction_hash: String,
    /// Type-specific fields
    #[serde(flatten)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

impl OperationResource {
    /// Adapt an operation row closed in `ledger`
    pub fn new(row: &Operation, ledger: &Ledger, links: &LinkBuilder) -> Result<Self> {
        let details = match row.details.as_deref() {
            None | Some("") => serde_json::Map::new(),
            Some(raw) => serde_json::from_str(raw).map_err(|e| {
                Error::Decode(format!("operation {} has malformed details: {}", row.id, e))
            })?,
        };
        let token = row.paging_token();

        Ok(Self {
            links: OperationLinks {
                self_: links.link(&format!("/operations/{}", row.id)),
                transaction: links.link(&format!("/transactions/{}", row.transaction_hash)),
                precedes: links.link(&format!("/operations?order=asc&cursor={}", token)),
                succeeds: links.link(&format!("/operations?order=desc&cursor={}", token)),
            },
            id: row.id.to_string(),
            paging_token: token,
            transaction_successful: row.is_successful(),
            source_account: row.source_account.clone(),
            type_name: row.type_name(),
            type_i: row.type_code,
            created_at: ledger.closed_at,
            transaction_hash: row.transaction_hash.clone(),
            details,
        })
    }
}

impl Pageable for OperationResource {
    fn paging_token(&self) -> &str {
        &self.paging_token
    }
}

/// Links of an offer
#[derive(Debug, Clone, Serialize)]
pub struct OfferLinks {
    #[serde(rename = "self")]
    self_: Link,
    offer_maker: Link,
}

/// Offer resource
#[derive(Debug, Clone, Serialize)]
pub struct OfferResource {
    #[serde(rename = "_links")]
    links: OfferLinks,
    /// Offer id
    pub id: i64,
    /// Paging token
    pub paging_token: String,
    /// Seller account
    pub seller: String,
    /// Asset being sold
    pub selling: AssetResource,
    /// Asset being bought
    pub buying: AssetResource,
    /// Remaining amount, 7 fraction digits
    pub amount: String,
    /// Exact price fraction
    pub price_r: Price,
    /// Price with 7 fraction digits
    pub price: String,
    /// Ledger that last modified the offer
    pub last_modified_ledger: i32,
}

impl OfferResource {
    /// Adapt an offer row
    pub fn new(row: &Offer, links: &LinkBuilder) -> Self {
        Self {
            links: OfferLinks {
                self_: links.link(&format!("/offers/{}", row.offer_id)),
                offer_maker: links.link(&format!("/accounts/{}", row.seller_id)),
            },
            id: row.offer_id,
            paging_token: row.paging_token(),
            seller: row.seller_id.clone(),
            selling: AssetResource::from(&row.selling),
            buying: AssetResource::from(&row.buying),
            amount: amount_string(row.amount),
            price_r: row.price,
            price: row.price.to_decimal_string(),
            last_modified_ledger: row.last_modified_ledger,
        }
    }
}

impl Pageable for OfferResource {
    fn paging_token(&self) -> &str {
        &self.paging_token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger(sequence: i32) -> Ledger {
        Ledger {
            sequence,
            hash: "ab".repeat(32),
            closed_at: DateTime::from_timestamp(1_560_000_000, 0).unwrap(),
        }
    }

    fn transaction(successful: Option<bool>) -> Transaction {
        Transaction {
            id: 8589938688,
            transaction_hash: "cd".repeat(32),
            ledger_sequence: 2,
            application_order: 1,
            account: "GSOURCE".into(),
            account_sequence: 77,
            fee_paid: 100,
            operation_count: 1,
            tx_envelope: "AAAA".into(),
            tx_result: "AAAB".into(),
            tx_meta: "AAAC".into(),
            tx_fee_meta: "AAAD".into(),
            successful,
            signatures: "sig1,sig2".into(),
            memo_type: "none".into(),
            memo: None,
            valid_after: None,
            valid_before: Some(1_560_000_100),
        }
    }

    #[test]
    fn test_legacy_transaction_renders_successful() {
        let links = LinkBuilder::new("https://history.example/");
        let res = TransactionResource::new(&transaction(None), &ledger(2), &links);
        assert!(res.successful);
        assert_eq!(res.paging_token, "8589938688");
        assert_eq!(res.signatures, vec!["sig1", "sig2"]);

        let json = serde_json::to_value(&res).unwrap();
        assert_eq!(
            json["_links"]["self"]["href"],
            format!("https://history.example/transactions/{}", "cd".repeat(32))
        );
        assert_eq!(json["_links"]["operations"]["templated"], true);
        assert!(json.get("memo").is_none());
        assert!(json.get("valid_after").is_none());
        assert_eq!(json["created_at"], "2019-06-08T13:20:00Z");
    }

    #[test]
    fn test_failed_transaction_renders_failed() {
        let links = LinkBuilder::new("http://h");
        let res = TransactionResource::new(&transaction(Some(false)), &ledger(2), &links);
        assert!(!res.successful);
    }

    #[test]
    fn test_operation_details_are_flattened() {
        let row = Operation {
            id: 8589938689,
            transaction_id: 8589938688,
            application_order: 1,
            type_code: 1,
            details: Some(r#"{"amount":"10.0000000","to":"GDEST"}"#.into()),
            source_account: "GSOURCE".into(),
            transaction_hash: "cd".repeat(32),
            transaction_successful: Some(true),
        };
        let res = OperationResource::new(&row, &ledger(2), &LinkBuilder::new("http://h")).unwrap();
        let json = serde_json::to_value(&res).unwrap();
        assert_eq!(json["type"], "payment");
        assert_eq!(json["type_i"], 1);
        assert_eq!(json["amount"], "10.0000000");
        assert_eq!(json["to"], "GDEST");
    }

    #[test]
    fn test_malformed_details_is_decode_error() {
        let row = Operation {
            id: 1,
            transaction_id: 1,
            application_order: 1,
            type_code: 1,
            details: Some("{not json".into()),
            source_account: "G".into(),
            transaction_hash: "h".into(),
            transaction_successful: None,
        };
        let links = LinkBuilder::new("http://h");
        let err = OperationResource::new(&row, &ledger(0), &links).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn test_offer_resource() {
        let issuer = stellar_strkey::ed25519::PublicKey([4; 32]).to_string();
        let offer = Offer {
            offer_id: 12,
            seller_id: "GSELLER".into(),
            selling: Asset::native(),
            buying: Asset::credit("USD", issuer.clone()).unwrap(),
            amount: 25_000_000,
            price: Price { n: 1, d: 3 },
            flags: 0,
            last_modified_ledger: 9,
        };
        let resource = OfferResource::new(&offer, &LinkBuilder::new("http://h"));
        let json = serde_json::to_value(resource).unwrap();
        assert_eq!(json["paging_token"], "12");
        assert_eq!(json["amount"], "2.5000000");
        assert_eq!(json["price"], "0.3333333");
        assert_eq!(json["price_r"]["n"], 1);
        assert_eq!(json["selling"]["asset_type"], "native");
        assert!(json["selling"].get("asset_code").is_none());
        assert_eq!(json["buying"]["asset_type"], "credit_alphanum4");
        assert_eq!(json["buying"]["asset_issuer"], issuer);
    }
}
