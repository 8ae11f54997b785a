//! Request parameter access and validation
//!
//! Path segments and query-string values are merged into one map, path
//! segments winning. Empty values are treated as absent.

use history_core::config::HistoryConfig;
use history_core::{Error, PageQuery, Result};
use std::collections::HashMap;

/// Cursor value meaning "only records from ledgers that close from now on"
pub const NOW_CURSOR: &str = "now";

/// Raw request parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    values: HashMap<String, String>,
}

impl Params {
    /// Parameters from a decoded query string
    pub fn new(query: HashMap<String, String>) -> Self {
        Self { values: query }
    }

    /// Add a path segment value, overriding any query-string value
    pub fn with_path(mut self, key: &str, value: impl Into<String>) -> Self {
        self.values.insert(key.to_string(), value.into());
        self
    }

    /// Apply a `Last-Event-ID` header; it overrides the `cursor` parameter
    pub fn with_last_event_id(mut self, last_event_id: Option<&str>) -> Self {
        if let Some(id) = last_event_id.map(str::trim).filter(|id| !id.is_empty()) {
            self.values.insert("cursor".to_string(), id.to_string());
        }
        self
    }

    /// Non-empty value of `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    /// Account address; must be a valid ed25519 strkey
    pub fn account_id(&self, key: &str) -> Result<Option<String>> {
        self.get(key)
            .map(|value| {
                stellar_strkey::ed25519::PublicKey::from_string(value)
                    .map(|_| value.to_string())
                    .map_err(|_| Error::invalid_field(key, "invalid address"))
            })
            .transpose()
    }

    /// Ledger sequence; must be a positive 32-bit integer
    pub fn ledger_id(&self, key: &str) -> Result<Option<i32>> {
        self.get(key)
            .map(|value| match value.parse::<i32>() {
                Ok(sequence) if sequence > 0 => Ok(sequence),
                _ => Err(Error::invalid_field(key, "must be a positive integer")),
            })
            .transpose()
    }

    /// Transaction hash; must be 64 hex characters
    pub fn tx_hash(&self, key: &str) -> Result<Option<String>> {
        self.get(key)
            .map(|value| {
                let bytes = hex::decode(value)
                    .map_err(|_| Error::invalid_field(key, "must be hex encoded"))?;
                if bytes.len() != 32 {
                    return Err(Error::invalid_field(key, "must be 64 hex characters"));
                }
                Ok(value.to_ascii_lowercase())
            })
            .transpose()
    }

    /// Boolean flag; absent means false
    pub fn flag(&self, key: &str) -> Result<bool> {
        match self.get(key) {
            None => Ok(false),
            Some("true") => Ok(true),
            Some("false") => Ok(false),
            Some(_) => Err(Error::invalid_field(key, "must be true or false")),
        }
    }

    /// `include_failed`, rejected when failed transactions are not ingested
    pub fn include_failed(&self, config: &HistoryConfig) -> Result<bool> {
        let include_failed = self.flag("include_failed")?;
        if include_failed && !config.ingest_failed_transactions {
            return Err(Error::invalid_field(
                "include_failed",
                "failed transactions are not ingested",
            ));
        }
        Ok(include_failed)
    }

    /// Paging parameters
    pub fn page(&self, config: &HistoryConfig) -> Result<PageQuery> {
        PageQuery::from_params(
            self.get("cursor"),
            self.get("order"),
            self.get("limit"),
            config.default_limit,
            config.max_limit,
        )
    }

    /// `(key, value)` pairs of `keys` that are present, for page links
    pub fn link_params(&self, keys: &[&str]) -> Vec<(String, String)> {
        keys.iter()
            .filter_map(|key| self.get(key).map(|v| (key.to_string(), v.to_string())))
            .collect()
    }
}
