//! Assets and their two on-disk encodings
//!
//! Pre-migration core schemas store an asset as decomposed columns
//! (`<prefix>assettype`, `<prefix>assetcode`, `<prefix>issuer`), with NULL
//! code and issuer for the native asset. From schema version 9 on the same
//! asset is a single base64 XDR blob in `<prefix>asset`. Both decode to the
//! same [`Asset`], so identity comparisons never depend on the encoding.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite};
use std::fmt;
use stellar_xdr::curr::{
    AccountId, AlphaNum12, AlphaNum4, AssetCode12, AssetCode4, Limits, PublicKey, ReadXdr,
    Uint256, WriteXdr,
};

/// First core schema version that stores assets as XDR blobs
pub const ENCODED_ASSET_SCHEMA: u32 = 9;

/// Asset type discriminant (values match the XDR enum)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    /// Network native asset
    Native,
    /// Credit asset with a 1-4 character code
    CreditAlphanum4,
    /// Credit asset with a 5-12 character code
    CreditAlphanum12,
}

impl AssetType {
    /// Integer stored in decomposed columns
    pub fn code(self) -> i32 {
        match self {
            AssetType::Native => 0,
            AssetType::CreditAlphanum4 => 1,
            AssetType::CreditAlphanum12 => 2,
        }
    }

    /// Parse the integer stored in decomposed columns
    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            0 => Ok(AssetType::Native),
            1 => Ok(AssetType::CreditAlphanum4),
            2 => Ok(AssetType::CreditAlphanum12),
            other => Err(Error::Decode(format!("unknown asset type {}", other))),
        }
    }

    /// Public name, as rendered in resources
    pub fn name(self) -> &'static str {
        match self {
            AssetType::Native => "native",
            AssetType::CreditAlphanum4 => "credit_alphanum4",
            AssetType::CreditAlphanum12 => "credit_alphanum12",
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Logical asset: (type, code, issuer)
///
/// Construction goes through [`Asset::native`] and [`Asset::credit`], so a
/// credit asset always has a non-empty code and a valid issuer, and native
/// always has neither.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Asset {
    asset_type: AssetType,
    code: String,
    issuer: String,
}

impl Asset {
    /// The native asset
    pub fn native() -> Self {
        Self {
            asset_type: AssetType::Native,
            code: String::new(),
            issuer: String::new(),
        }
    }

    /// A credit asset; the type is derived from the code length
    pub fn credit(code: impl Into<String>, issuer: impl Into<String>) -> Result<Self> {
        let code = code.into();
        let issuer = issuer.into();

        let asset_type = match code.len() {
            1..=4 => AssetType::CreditAlphanum4,
            5..=12 => AssetType::CreditAlphanum12,
            _ => return Err(Error::Decode(format!("invalid asset code `{}`", code))),
        };
        if !code.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(Error::Decode(format!("invalid asset code `{}`", code)));
        }
        stellar_strkey::ed25519::PublicKey::from_string(&issuer)
            .map_err(|_| Error::Decode(format!("invalid asset issuer `{}`", issuer)))?;

        Ok(Self {
            asset_type,
            code,
            issuer,
        })
    }

    /// Asset type
    pub fn asset_type(&self) -> AssetType {
        self.asset_type
    }

    /// Asset code (empty for native)
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Issuer account (empty for native)
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Whether this is the native asset
    pub fn is_native(&self) -> bool {
        self.asset_type == AssetType::Native
    }

    /// Rebuild from decomposed column values
    pub fn from_columns(
        asset_type: i32,
        code: Option<String>,
        issuer: Option<String>,
    ) -> Result<Self> {
        match AssetType::from_code(asset_type)? {
            AssetType::Native => Ok(Asset::native()),
            expected => {
                let asset = Asset::credit(code.unwrap_or_default(), issuer.unwrap_or_default())?;
                if asset.asset_type != expected {
                    return Err(Error::Decode(format!(
                        "asset code `{}` does not fit type {}",
                        asset.code, expected
                    )));
                }
                Ok(asset)
            }
        }
    }

    /// Decode a base64 XDR blob
    pub fn from_xdr_base64(blob: &str) -> Result<Self> {
        let xdr = stellar_xdr::curr::Asset::from_xdr_base64(blob, Limits::none())?;
        Asset::try_from(&xdr)
    }

    /// Encode as a base64 XDR blob
    pub fn to_xdr_base64(&self) -> Result<String> {
        let xdr = stellar_xdr::curr::Asset::try_from(self)?;
        Ok(xdr.to_xdr_base64(Limits::none())?)
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_native() {
            f.write_str("native")
        } else {
            write!(f, "{}:{}", self.code, self.issuer)
        }
    }
}

fn code_from_bytes(bytes: &[u8]) -> Result<String> {
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    String::from_utf8(bytes[..end].to_vec())
        .map_err(|_| Error::Decode("asset code is not valid utf-8".into()))
}

fn issuer_from_account(account: &AccountId) -> String {
    let PublicKey::PublicKeyTypeEd25519(Uint256(key)) = &account.0;
    stellar_strkey::ed25519::PublicKey(*key).to_string()
}

fn account_from_issuer(issuer: &str) -> Result<AccountId> {
    let key = stellar_strkey::ed25519::PublicKey::from_string(issuer)
        .map_err(|_| Error::Decode(format!("invalid asset issuer `{}`", issuer)))?;
    Ok(AccountId(PublicKey::PublicKeyTypeEd25519(Uint256(key.0))))
}

impl TryFrom<&stellar_xdr::curr::Asset> for Asset {
    type Error = Error;

    fn try_from(xdr: &stellar_xdr::curr::Asset) -> Result<Self> {
        match xdr {
            stellar_xdr::curr::Asset::Native => Ok(Asset::native()),
            stellar_xdr::curr::Asset::CreditAlphanum4(a) => {
                Asset::credit(code_from_bytes(&a.asset_code.0)?, issuer_from_account(&a.issuer))
            }
            stellar_xdr::curr::Asset::CreditAlphanum12(a) => {
                let asset = Asset::credit(
                    code_from_bytes(&a.asset_code.0)?,
                    issuer_from_account(&a.issuer),
                )?;
                if asset.asset_type != AssetType::CreditAlphanum12 {
                    return Err(Error::Decode(format!(
                        "asset code `{}` is too short for credit_alphanum12",
                        asset.code
                    )));
                }
                Ok(asset)
            }
        }
    }
}

impl TryFrom<&Asset> for stellar_xdr::curr::Asset {
    type Error = Error;

    fn try_from(asset: &Asset) -> Result<Self> {
        match asset.asset_type {
            AssetType::Native => Ok(stellar_xdr::curr::Asset::Native),
            AssetType::CreditAlphanum4 => {
                let mut code = [0u8; 4];
                code[..asset.code.len()].copy_from_slice(asset.code.as_bytes());
                Ok(stellar_xdr::curr::Asset::CreditAlphanum4(AlphaNum4 {
                    asset_code: AssetCode4(code),
                    issuer: account_from_issuer(&asset.issuer)?,
                }))
            }
            AssetType::CreditAlphanum12 => {
                let mut code = [0u8; 12];
                code[..asset.code.len()].copy_from_slice(asset.code.as_bytes());
                Ok(stellar_xdr::curr::Asset::CreditAlphanum12(AlphaNum12 {
                    asset_code: AssetCode12(code),
                    issuer: account_from_issuer(&asset.issuer)?,
                }))
            }
        }
    }
}

/// Version-aware mapping between asset columns and [`Asset`]
///
/// The codec is a value built from one schema-version probe. Callers build a
/// fresh codec per repository call so a live migration is observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetCodec {
    schema_version: u32,
}

impl AssetCodec {
    /// Codec for the given core schema version
    pub fn new(schema_version: u32) -> Self {
        Self { schema_version }
    }

    /// Schema version this codec targets
    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    /// Whether assets are stored as a single encoded blob
    pub fn is_encoded(&self) -> bool {
        self.schema_version >= ENCODED_ASSET_SCHEMA
    }

    /// Decode the asset stored under `prefix` (`selling` or `buying`) in a row
    pub fn decode(&self, row: &SqliteRow, prefix: &str) -> Result<Asset> {
        if self.is_encoded() {
            let blob: String = row.try_get(format!("{}asset", prefix).as_str())?;
            Asset::from_xdr_base64(&blob)
                .map_err(|e| Error::Decode(format!("Error decoding {}asset: {}", prefix, e)))
        } else {
            let asset_type: i32 = row.try_get(format!("{}assettype", prefix).as_str())?;
            let code: Option<String> = row.try_get(format!("{}assetcode", prefix).as_str())?;
            let issuer: Option<String> = row.try_get(format!("{}issuer", prefix).as_str())?;
            Asset::from_columns(asset_type, code, issuer)
        }
    }

    /// Push `<prefix> matches asset` onto a query, as one parenthesized predicate
    pub fn push_filter(
        &self,
        builder: &mut QueryBuilder<'_, Sqlite>,
        column_prefix: &str,
        asset: &Asset,
    ) -> Result<()> {
        if self.is_encoded() {
            builder.push(format!("{}asset = ", column_prefix));
            builder.push_bind(asset.to_xdr_base64()?);
            return Ok(());
        }

        builder.push(format!("({}assettype = ", column_prefix));
        builder.push_bind(asset.asset_type().code());
        if !asset.is_native() {
            builder.push(format!(" AND {}assetcode = ", column_prefix));
            builder.push_bind(asset.code().to_string());
            builder.push(format!(" AND {}issuer = ", column_prefix));
            builder.push_bind(asset.issuer().to_string());
        }
        builder.push(")");
        Ok(())
    }

    /// Columns that identify the asset stored under `prefix`, for grouping
    pub fn columns(&self, prefix: &str) -> Vec<String> {
        if self.is_encoded() {
            vec![format!("{}asset", prefix)]
        } else {
            vec![
                format!("{}assettype", prefix),
                format!("{}assetcode", prefix),
                format!("{}issuer", prefix),
            ]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer(seed: u8) -> String {
        stellar_strkey::ed25519::PublicKey([seed; 32]).to_string()
    }

    #[test]
    fn test_credit_type_follows_code_length() {
        let usd = Asset::credit("USD", issuer(1)).unwrap();
        assert_eq!(usd.asset_type(), AssetType::CreditAlphanum4);

        let long = Asset::credit("LONGCODE", issuer(1)).unwrap();
        assert_eq!(long.asset_type(), AssetType::CreditAlphanum12);
    }

    #[test]
    fn test_credit_rejects_bad_parts() {
        assert!(Asset::credit("", issuer(1)).is_err());
        assert!(Asset::credit("THIRTEENCHARS", issuer(1)).is_err());
        assert!(Asset::credit("USD", "not-an-account").is_err());
    }

    #[test]
    fn test_xdr_roundtrip() {
        for asset in [
            Asset::native(),
            Asset::credit("USD", issuer(7)).unwrap(),
            Asset::credit("EURTOKEN", issuer(9)).unwrap(),
        ] {
            let blob = asset.to_xdr_base64().unwrap();
            assert_eq!(Asset::from_xdr_base64(&blob).unwrap(), asset);
        }
    }

    #[test]
    fn test_native_xdr_is_four_zero_bytes() {
        assert_eq!(Asset::native().to_xdr_base64().unwrap(), "AAAAAA==");
    }

    #[test]
    fn test_garbage_blob_is_decode_error() {
        assert!(matches!(
            Asset::from_xdr_base64("not base64 at all!"),
            Err(Error::Decode(_))
        ));
        assert!(matches!(Asset::from_xdr_base64("AAAACQ=="), Err(Error::Decode(_))));
    }

    #[test]
    fn test_from_columns() {
        assert_eq!(Asset::from_columns(0, None, None).unwrap(), Asset::native());

        let usd = Asset::from_columns(1, Some("USD".into()), Some(issuer(3))).unwrap();
        assert_eq!(usd, Asset::credit("USD", issuer(3)).unwrap());

        assert!(Asset::from_columns(2, Some("USD".into()), Some(issuer(3))).is_err());
        assert!(Asset::from_columns(1, None, None).is_err());
        assert!(Asset::from_columns(5, None, None).is_err());
    }

    #[test]
    fn test_filter_shapes() {
        let usd = Asset::credit("USD", issuer(2)).unwrap();

        let mut pre = QueryBuilder::<Sqlite>::new("SELECT 1 FROM offers WHERE ");
        AssetCodec::new(8).push_filter(&mut pre, "selling", &usd).unwrap();
        assert_eq!(
            pre.sql(),
            "SELECT 1 FROM offers WHERE (sellingassettype = ? AND sellingassetcode = ? AND sellingissuer = ?)"
        );

        let mut native = QueryBuilder::<Sqlite>::new("");
        AssetCodec::new(8).push_filter(&mut native, "selling", &Asset::native()).unwrap();
        assert_eq!(native.sql(), "(sellingassettype = ?)");

        let mut post = QueryBuilder::<Sqlite>::new("");
        AssetCodec::new(9).push_filter(&mut post, "selling", &usd).unwrap();
        assert_eq!(post.sql(), "sellingasset = ?");
    }
}
