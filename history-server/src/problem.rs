//! Problem documents returned for failed requests

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use history_core::Error;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::error;

/// Structured error body: machine kind, human title, optional extras
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Problem {
    /// Machine-readable kind
    #[serde(rename = "type")]
    pub kind: String,
    /// Short human-readable summary
    pub title: String,
    /// HTTP status
    pub status: u16,
    /// Explanation of this occurrence
    pub detail: String,
    /// Kind-specific data, such as the offending parameter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
}

fn title(kind: &str) -> &'static str {
    match kind {
        "bad_request" => "Bad Request",
        "not_found" => "Resource Missing",
        "stale_query" => "Stale Query",
        "before_history" => "Data Not Available",
        "stale_history" => "Historical DB Is Too Stale",
        _ => "Internal Server Error",
    }
}

impl From<&Error> for Problem {
    fn from(err: &Error) -> Self {
        let kind = err.kind();

        // Server faults never leak internals to the caller.
        let detail = if err.is_server_fault() {
            "The server encountered an error while processing the request.".to_string()
        } else {
            err.to_string()
        };

        let extras = match err {
            Error::Validation { field, reason } => {
                Some(json!({ "invalid_field": field, "reason": reason }))
            }
            Error::InvalidCursor(reason) => {
                Some(json!({ "invalid_field": "cursor", "reason": reason }))
            }
            Error::StaleQuery { requested, latest } => {
                Some(json!({ "requested_ledger": requested, "latest_ledger": latest }))
            }
            Error::BeforeHistory { requested, elder } => {
                Some(json!({ "requested_ledger": requested, "elder_ledger": elder }))
            }
            Error::StaleHistory { history, core } => {
                Some(json!({ "history_latest_ledger": history, "core_latest_ledger": core }))
            }
            Error::MissingLedgerData(sequence) => Some(json!({ "ledger": sequence })),
            _ => None,
        };

        Self {
            kind: kind.to_string(),
            title: title(kind).to_string(),
            status: err.status(),
            detail,
            extras,
        }
    }
}

/// Transport wrapper so handlers can return `history_core::Error` with `?`
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub Error);

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.0.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        if self.0.is_server_fault() {
            error!(error = %self.0, "Request failed");
        }
        HttpResponse::build(self.status_code())
            .content_type("application/problem+json")
            .json(Problem::from(&self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_problem_names_field() {
        let problem = Problem::from(&Error::invalid_field("limit", "must be positive"));
        assert_eq!(problem.status, 400);
        assert_eq!(problem.kind, "bad_request");
        assert_eq!(problem.extras.unwrap()["invalid_field"], "limit");
    }

    #[test]
    fn test_missing_ledger_is_server_fault_with_sequence() {
        let problem = Problem::from(&Error::MissingLedgerData(42));
        assert_eq!(problem.status, 500);
        assert_eq!(problem.kind, "server_error");
        assert!(!problem.detail.contains("42"));
        assert_eq!(problem.extras.unwrap()["ledger"], 42);
    }

    #[test]
    fn test_stale_query_problem() {
        let problem = Problem::from(&Error::StaleQuery {
            requested: 10,
            latest: 8,
        });
        assert_eq!(problem.status, 400);
        assert_eq!(problem.title, "Stale Query");
    }

    #[test]
    fn test_serialized_shape() {
        let value = serde_json::to_value(Problem::from(&Error::NotFound("transaction x".into())))
            .unwrap();
        assert_eq!(value["type"], "not_found");
        assert_eq!(value["status"], 404);
        assert!(value.get("extras").is_none());
    }

    #[test]
    fn test_api_error_status() {
        let err = ApiError(Error::BeforeHistory {
            requested: 1,
            elder: 5,
        });
        assert_eq!(err.status_code(), StatusCode::GONE);
    }
}
