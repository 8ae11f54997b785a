//! Server-sent event framing

use crate::problem::Problem;
use bytes::Bytes;
use history_core::{Error, Result};
use serde::Serialize;

/// Content type of event streams
pub const CONTENT_TYPE: &str = "text/event-stream";

/// Reconnect delay advertised to the client
pub fn retry(millis: u64) -> Bytes {
    Bytes::from(format!("retry: {}\n\n", millis))
}

/// First event of every stream
pub fn open() -> Bytes {
    Bytes::from_static(b"event: open\ndata: \"hello\"\n\n")
}

/// Data event keyed by the record's paging token
pub fn data<T: Serialize>(id: &str, body: &T) -> Result<Bytes> {
    let json = serde_json::to_string(body)
        .map_err(|e| Error::Decode(format!("Error encoding event {}: {}", id, e)))?;
    Ok(Bytes::from(format!("id: {}\ndata: {}\n\n", id, json)))
}

/// Terminal error event
pub fn error(problem: &Problem) -> Bytes {
    let json = serde_json::to_string(problem).unwrap_or_else(|_| format!("\"{}\"", problem.kind));
    Bytes::from(format!("event: error\ndata: {}\n\n", json))
}
