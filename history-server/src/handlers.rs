//! HTTP routes
//!
//! Every collection route answers with a JSON page, or with an event stream
//! when the client sends `Accept: text/event-stream`.

use crate::action::{self, CollectionAction};
use crate::actions::{show_transaction, OffersAction, OperationsAction, TransactionsAction};
use crate::params::Params;
use crate::problem::ApiError;
use crate::sse;
use crate::state::AppState;
use crate::stream;
use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse};
use history_core::db;
use serde_json::json;
use std::collections::HashMap;
use tracing::error;

type Query = web::Query<HashMap<String, String>>;

fn wants_stream(req: &HttpRequest) -> bool {
    req.headers()
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok())
        .map(|accept| accept.contains(sse::CONTENT_TYPE))
        .unwrap_or(false)
}

fn request_params(req: &HttpRequest, query: HashMap<String, String>, streaming: bool) -> Params {
    let mut params = Params::new(query);
    for (key, value) in req.match_info().iter() {
        params = params.with_path(key, value);
    }
    if streaming {
        let last_event_id = req
            .headers()
            .get("Last-Event-ID")
            .and_then(|value| value.to_str().ok());
        params = params.with_last_event_id(last_event_id);
    }
    params
}

async fn respond<A: CollectionAction>(
    state: &AppState,
    req: &HttpRequest,
    query: Query,
    action: A,
) -> Result<HttpResponse, ApiError> {
    let streaming = wants_stream(req);
    let params = request_params(req, query.into_inner(), streaming);

    if streaming {
        return Ok(stream::start(action, params, state.clone()).await?);
    }
    let page = action::page(action, params, state).await?;
    Ok(HttpResponse::Ok().json(page))
}

/// Transactions, optionally for one account or ledger
pub async fn transactions_index(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: Query,
) -> Result<HttpResponse, ApiError> {
    respond(&state, &req, query, TransactionsAction::default()).await
}

/// One transaction by hash
pub async fn transactions_show(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let params = request_params(&req, HashMap::new(), false);
    let resource = show_transaction(&state, &params).await?;
    Ok(HttpResponse::Ok().json(resource))
}

/// Operations, optionally for one account, ledger or transaction
pub async fn operations_index(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: Query,
) -> Result<HttpResponse, ApiError> {
    respond(&state, &req, query, OperationsAction::operations()).await
}

/// Payments, optionally for one account, ledger or transaction
pub async fn payments_index(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: Query,
) -> Result<HttpResponse, ApiError> {
    respond(&state, &req, query, OperationsAction::payments()).await
}

/// Offers of one account
pub async fn offers_index(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: Query,
) -> Result<HttpResponse, ApiError> {
    respond(&state, &req, query, OffersAction::default()).await
}

/// Health check endpoint
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    match db::health_check(state.history.pool()).await {
        Ok(()) => HttpResponse::Ok().json(json!({
            "status": "healthy",
            "service": "history-server",
            "version": env!("CARGO_PKG_VERSION"),
        })),
        Err(err) => {
            error!(error = %err, "Health check failed");
            HttpResponse::ServiceUnavailable().json(json!({ "status": "unhealthy" }))
        }
    }
}

/// Prometheus metrics in text format
pub async fn metrics(state: web::Data<AppState>) -> HttpResponse {
    match state.metrics.render() {
        Ok(body) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(body),
        Err(err) => {
            error!(error = %err, "Failed to encode metrics");
            HttpResponse::InternalServerError().finish()
        }
    }
}

/// Configure routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/metrics", web::get().to(metrics))
        .route("/transactions", web::get().to(transactions_index))
        .route("/transactions/{tx_id}", web::get().to(transactions_show))
        .route("/transactions/{tx_id}/operations", web::get().to(operations_index))
        .route("/transactions/{tx_id}/payments", web::get().to(payments_index))
        .route("/operations", web::get().to(operations_index))
        .route("/payments", web::get().to(payments_index))
        .route("/accounts/{account_id}/transactions", web::get().to(transactions_index))
        .route("/accounts/{account_id}/operations", web::get().to(operations_index))
        .route("/accounts/{account_id}/payments", web::get().to(payments_index))
        .route("/accounts/{account_id}/offers", web::get().to(offers_index))
        .route("/ledgers/{ledger_id}/transactions", web::get().to(transactions_index))
        .route("/ledgers/{ledger_id}/operations", web::get().to(operations_index))
        .route("/ledgers/{ledger_id}/payments", web::get().to(payments_index));
}
