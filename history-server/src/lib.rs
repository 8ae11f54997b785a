//! History HTTP service
//!
//! Serves paged collections and event streams over the `history_core` read
//! path.
//!
//! # Request flow
//!
//! - **Params**: path and query values merged and validated per action
//! - **Pipeline**: setup stages once, execute stages once or per stream tick
//! - **Stream**: sent-count and limit per connection, woken by ledger closes
//! - **Problem**: errors rendered as structured problem documents

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod action;
pub mod actions;
pub mod handlers;
pub mod metrics;
pub mod params;
pub mod problem;
pub mod sse;
pub mod state;
pub mod stream;
pub mod watcher;

// Re-exports
pub use metrics::Metrics;
pub use problem::{ApiError, Problem};
pub use state::AppState;
