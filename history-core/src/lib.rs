//! History read path
//!
//! Read-only query layer over an ingested ledger history and the core node's
//! offers table.
//!
//! # Architecture
//!
//! - **Query specs**: immutable filter values compiled to SQL in one pass
//! - **Paging**: opaque string cursors over total-order ids
//! - **Asset codec**: per-call probe of the core schema version picks the
//!   decomposed or encoded asset columns
//! - **Ledger cache**: one batched ledger fetch per page of records
//! - **Resources**: public JSON documents with hypermedia links

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod asset;
pub mod config;
pub mod db;
pub mod error;
pub mod ledger_cache;
pub mod paging;
pub mod query;
pub mod resource;
pub mod schema;
pub mod toid;
pub mod types;

#[cfg(feature = "testing")]
pub mod testing;

// Re-exports
pub use asset::{Asset, AssetCodec, AssetType};
pub use config::Config;
pub use db::{CoreQ, DbPool, HistoryQ};
pub use error::{Error, Result};
pub use ledger_cache::{LedgerCache, LedgerSource};
pub use paging::{Order, PageQuery};
pub use query::{OperationsQuery, TransactionsQuery};
pub use schema::SchemaVersionSource;
pub use toid::TotalOrderId;
pub use types::{Ledger, Offer, Operation, OperationType, Price, Transaction};
