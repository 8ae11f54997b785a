//! Row types of the history read model
//!
//! All records are read-only here; ingestion owns creation and mutation.

use crate::asset::Asset;
use crate::toid::TotalOrderId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Fraction digits of a stroop amount
pub const AMOUNT_SCALE: u32 = 7;

/// Closed ledger summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ledger {
    /// Ledger sequence
    pub sequence: i32,
    /// Ledger hash (hex)
    pub hash: String,
    /// Close time
    pub closed_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct LedgerRow {
    pub sequence: i32,
    pub ledger_hash: String,
    pub closed_at: i64,
}

impl TryFrom<LedgerRow> for Ledger {
    type Error = crate::Error;

    fn try_from(row: LedgerRow) -> crate::Result<Self> {
        let closed_at = DateTime::from_timestamp(row.closed_at, 0).ok_or_else(|| {
            crate::Error::Decode(format!(
                "ledger {} has invalid close time {}",
                row.sequence, row.closed_at
            ))
        })?;
        Ok(Ledger {
            sequence: row.sequence,
            hash: row.ledger_hash,
            closed_at,
        })
    }
}

/// A transaction row from `history_transactions`
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Transaction {
    /// Total order id
    pub id: i64,
    /// Transaction hash (hex)
    pub transaction_hash: String,
    /// Ledger the transaction was applied in
    pub ledger_sequence: i32,
    /// Application order within the ledger
    pub application_order: i32,
    /// Source account
    pub account: String,
    /// Source account sequence number
    pub account_sequence: i64,
    /// Fee charged (stroops)
    pub fee_paid: i32,
    /// Number of operations
    pub operation_count: i32,
    /// Envelope, base64 XDR
    pub tx_envelope: String,
    /// Result, base64 XDR
    pub tx_result: String,
    /// Result meta, base64 XDR
    pub tx_meta: String,
    /// Fee meta, base64 XDR
    pub tx_fee_meta: String,
    /// NULL on rows ingested before the success flag existed
    pub successful: Option<bool>,
    /// Comma-separated base64 signatures
    pub signatures: String,
    /// Memo type name
    pub memo_type: String,
    /// Memo value
    pub memo: Option<String>,
    /// Time bound lower edge (unix seconds)
    pub valid_after: Option<i64>,
    /// Time bound upper edge (unix seconds)
    pub valid_before: Option<i64>,
}

impl Transaction {
    /// Legacy rows without a success flag count as successful
    pub fn is_successful(&self) -> bool {
        self.successful.unwrap_or(true)
    }

    /// Paging token (the total order id)
    pub fn paging_token(&self) -> String {
        self.id.to_string()
    }
}

/// An operation row from `history_operations`, joined with its transaction
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Operation {
    /// Total order id
    pub id: i64,
    /// Owning transaction id
    pub transaction_id: i64,
    /// Application order within the transaction
    pub application_order: i32,
    /// Operation type code
    #[sqlx(rename = "type")]
    pub type_code: i32,
    /// Type-specific details as a JSON object
    pub details: Option<String>,
    /// Source account
    pub source_account: String,
    /// Hash of the owning transaction
    pub transaction_hash: String,
    /// Success flag of the owning transaction
    pub transaction_successful: Option<bool>,
}

impl Operation {
    /// Ledger the operation was applied in
    pub fn ledger_sequence(&self) -> i32 {
        TotalOrderId::parse(self.id)
            .map(|id| id.ledger_sequence)
            .unwrap_or_default()
    }

    /// Legacy rows without a success flag count as successful
    pub fn is_successful(&self) -> bool {
        self.transaction_successful.unwrap_or(true)
    }

    /// Paging token (the total order id)
    pub fn paging_token(&self) -> String {
        self.id.to_string()
    }

    /// Operation type name
    pub fn type_name(&self) -> &'static str {
        OperationType::from_code(self.type_code)
            .map(OperationType::name)
            .unwrap_or("unknown")
    }
}

/// Operation types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum OperationType {
    /// Fund a new account
    CreateAccount = 0,
    /// Send an asset
    Payment = 1,
    /// Send through a conversion path
    PathPayment = 2,
    /// Create, update or delete an offer
    ManageOffer = 3,
    /// Create a passive offer
    CreatePassiveOffer = 4,
    /// Change account options
    SetOptions = 5,
    /// Change a trustline
    ChangeTrust = 6,
    /// Authorize a trustline
    AllowTrust = 7,
    /// Merge an account into another
    AccountMerge = 8,
    /// Run inflation
    Inflation = 9,
    /// Set or clear a data entry
    ManageData = 10,
    /// Bump the sequence number
    BumpSequence = 11,
}

impl OperationType {
    /// Types that move value between accounts
    pub const PAYMENTS: [OperationType; 4] = [
        OperationType::CreateAccount,
        OperationType::Payment,
        OperationType::PathPayment,
        OperationType::AccountMerge,
    ];

    /// Parse a stored type code
    pub fn from_code(code: i32) -> Option<Self> {
        use OperationType::*;
        let ty = match code {
            0 => CreateAccount,
            1 => Payment,
            2 => PathPayment,
            3 => ManageOffer,
            4 => CreatePassiveOffer,
            5 => SetOptions,
            6 => ChangeTrust,
            7 => AllowTrust,
            8 => AccountMerge,
            9 => Inflation,
            10 => ManageData,
            11 => BumpSequence,
            _ => return None,
        };
        Some(ty)
    }

    /// Public type name
    pub fn name(self) -> &'static str {
        match self {
            OperationType::CreateAccount => "create_account",
            OperationType::Payment => "payment",
            OperationType::PathPayment => "path_payment",
            OperationType::ManageOffer => "manage_offer",
            OperationType::CreatePassiveOffer => "create_passive_offer",
            OperationType::SetOptions => "set_options",
            OperationType::ChangeTrust => "change_trust",
            OperationType::AllowTrust => "allow_trust",
            OperationType::AccountMerge => "account_merge",
            OperationType::Inflation => "inflation",
            OperationType::ManageData => "manage_data",
            OperationType::BumpSequence => "bump_sequence",
        }
    }
}

/// Offer price as a reduced fraction, exactly as stored by the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Numerator
    pub n: i32,
    /// Denominator
    pub d: i32,
}

impl Price {
    /// Decimal approximation with 7 fraction digits, rounded half away from zero
    pub fn to_decimal_string(&self) -> String {
        if self.d == 0 {
            return "0.0000000".to_string();
        }
        let scale = 10i128.pow(AMOUNT_SCALE);
        let numerator = self.n as i128 * scale;
        let denominator = self.d as i128;

        let mut quotient = numerator / denominator;
        let remainder = numerator % denominator;
        if remainder.abs() * 2 >= denominator.abs() {
            quotient += if (numerator < 0) != (denominator < 0) { -1 } else { 1 };
        }

        Decimal::from_i128_with_scale(quotient, AMOUNT_SCALE).to_string()
    }
}

/// Render a stroop amount with 7 fraction digits
pub fn amount_string(stroops: i64) -> String {
    Decimal::new(stroops, AMOUNT_SCALE).to_string()
}

/// A standing offer from core `offers`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Offer {
    /// Offer id
    pub offer_id: i64,
    /// Seller account
    pub seller_id: String,
    /// Asset being sold
    pub selling: Asset,
    /// Asset being bought
    pub buying: Asset,
    /// Remaining amount of `selling` (stroops)
    pub amount: i64,
    /// Price of one unit of `selling` in `buying`
    pub price: Price,
    /// Offer flags
    pub flags: i32,
    /// Ledger that last modified the offer
    pub last_modified_ledger: i32,
}

impl Offer {
    /// Paging token (the offer id)
    pub fn paging_token(&self) -> String {
        self.offer_id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_string_has_seven_digits() {
        assert_eq!(Price { n: 1, d: 2 }.to_decimal_string(), "0.5000000");
        assert_eq!(Price { n: 5, d: 1 }.to_decimal_string(), "5.0000000");
        assert_eq!(Price { n: 1, d: 3 }.to_decimal_string(), "0.3333333");
        assert_eq!(Price { n: 2, d: 3 }.to_decimal_string(), "0.6666667");
    }

    #[test]
    fn test_price_rounds_half_away_from_zero() {
        assert_eq!(Price { n: 1, d: 16 }.to_decimal_string(), "0.0625000");
        // 1 / 20_000_000 lands exactly on half a unit
        assert_eq!(Price { n: 1, d: 20_000_000 }.to_decimal_string(), "0.0000001");
        assert_eq!(Price { n: 1, d: 20_000_001 }.to_decimal_string(), "0.0000000");
    }

    #[test]
    fn test_amount_string() {
        assert_eq!(amount_string(10_000_000), "1.0000000");
        assert_eq!(amount_string(1), "0.0000001");
    }

    #[test]
    fn test_operation_type_names() {
        assert_eq!(OperationType::from_code(1).map(OperationType::name), Some("payment"));
        assert_eq!(OperationType::from_code(42), None);
        assert!(OperationType::PAYMENTS.contains(&OperationType::AccountMerge));
    }
}
