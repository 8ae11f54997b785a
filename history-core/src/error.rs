//! Error taxonomy for the history read path

use thiserror::Error;

/// Result type for history operations
pub type Result<T> = std::result::Result<T, Error>;

/// History errors
#[derive(Error, Debug)]
pub enum Error {
    /// A request parameter failed validation
    #[error("Invalid parameter `{field}`: {reason}")]
    Validation {
        /// Offending parameter name
        field: String,
        /// Why it was rejected
        reason: String,
    },

    /// The page cursor could not be parsed into the expected shape
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    /// No matching record
    #[error("Not found: {0}")]
    NotFound(String),

    /// The query references ledgers beyond the ingested horizon
    #[error("Query references ledger {requested} but history ends at ledger {latest}")]
    StaleQuery {
        /// Ledger referenced by the query
        requested: i32,
        /// Latest ingested ledger
        latest: i32,
    },

    /// The query references ledgers older than the retained history
    #[error("Query references ledger {requested} but history starts at ledger {elder}")]
    BeforeHistory {
        /// Ledger referenced by the query
        requested: i32,
        /// Oldest ingested ledger
        elder: i32,
    },

    /// History ingestion lags behind core beyond the configured threshold
    #[error("History is stale: history at ledger {history}, core at ledger {core}")]
    StaleHistory {
        /// Latest history ledger
        history: i32,
        /// Latest core ledger
        core: i32,
    },

    /// Malformed asset or binary payload
    #[error("Decode error: {0}")]
    Decode(String),

    /// Ledger cache dereference after load found nothing
    #[error("Could not find ledger data for sequence {0}")]
    MissingLedgerData(i32),

    /// The schema version probe failed
    #[error("Schema version error: {0}")]
    SchemaVersion(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Build a validation error for `field`
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// HTTP-equivalent status code
    pub fn status(&self) -> u16 {
        match self {
            Error::Validation { .. }
            | Error::InvalidCursor(_)
            | Error::Decode(_)
            | Error::StaleQuery { .. } => 400,
            Error::NotFound(_) => 404,
            Error::BeforeHistory { .. } => 410,
            Error::StaleHistory { .. } => 503,
            Error::MissingLedgerData(_)
            | Error::SchemaVersion(_)
            | Error::Database(_)
            | Error::Config(_) => 500,
        }
    }

    /// Machine-readable problem kind
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation { .. } | Error::InvalidCursor(_) | Error::Decode(_) => "bad_request",
            Error::StaleQuery { .. } => "stale_query",
            Error::NotFound(_) => "not_found",
            Error::BeforeHistory { .. } => "before_history",
            Error::StaleHistory { .. } => "stale_history",
            Error::MissingLedgerData(_)
            | Error::SchemaVersion(_)
            | Error::Database(_)
            | Error::Config(_) => "server_error",
        }
    }

    /// Whether the error signals an internal inconsistency rather than caller error
    pub fn is_server_fault(&self) -> bool {
        self.status() >= 500
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<stellar_xdr::curr::Error> for Error {
    fn from(err: stellar_xdr::curr::Error) -> Self {
        Error::Decode(err.to_string())
    }
}
