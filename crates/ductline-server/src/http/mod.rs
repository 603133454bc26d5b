//! HTTP surface (axum). JSON bodies are camelCase and wrapped in
//! [`error::Envelope`].

pub mod admin;
pub mod error;
pub mod payments;
pub mod session;
pub mod waitlist;

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use ductline_core::Config;
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::auth::TokenVerifier;
use crate::payments::CheckoutService;
use crate::waitlist::WaitlistService;

/// Shared application state, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub waitlist: WaitlistService,
    pub checkout: CheckoutService,
    pub verifier: Arc<TokenVerifier>,
    pub config: Arc<Config>,
}

/// `GET /health`. Answers 503 when the database does not respond.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let (status, label) = match state.waitlist.db().ping().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(e) => {
            warn!(error = %e, "Health check: database unavailable");
            (StatusCode::SERVICE_UNAVAILABLE, "degraded")
        }
    };
    (
        status,
        Json(json!({ "status": label, "version": env!("CARGO_PKG_VERSION") })),
    )
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/waitlist/join", post(waitlist::join))
        .route("/waitlist/bump", post(waitlist::bump))
        .route("/waitlist/activity", get(waitlist::activity))
        .route("/waitlist/me", get(waitlist::my_rank))
        .route("/waitlist/{id}/rank", get(waitlist::rank))
        .route("/payments/create", post(payments::create))
        .route("/payments/capture", get(payments::capture))
        .route("/payments/cancel", get(payments::cancel))
        .route("/payments/mine", get(payments::mine))
        .route("/admin/waitlist", get(admin::waitlist))
        .route("/admin/stats", get(admin::stats))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
