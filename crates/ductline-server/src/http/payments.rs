//! `/payments` handlers: checkout creation and processor callbacks.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::response::Redirect;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::AppState;
use super::error::{ApiError, Envelope};
use super::session::{MaybeSession, Session};
use super::waitlist::invalid_body;
use crate::payments::{CaptureResult, CheckoutRequest};
use crate::storage::Payment;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutBody {
    pub approval_url: String,
    pub payment_record_id: String,
}

/// Query string the processor appends to the return URL.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureQuery {
    #[serde(default)]
    pub payment_id: String,
    #[serde(default, alias = "PayerID")]
    pub payer_ref: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelQuery {
    #[serde(default)]
    pub payment_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSummary {
    pub id: String,
    pub amount: String,
    pub currency: String,
    pub status: String,
    pub description: String,
    pub positions_to_move: Option<i64>,
    pub created_at: i64,
}

impl From<Payment> for PaymentSummary {
    fn from(p: Payment) -> Self {
        Self {
            id: p.id,
            amount: crate::payments::money::format_cents(p.amount_cents),
            currency: p.currency,
            status: p.status,
            description: p.description,
            positions_to_move: p.positions_to_move,
            created_at: p.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentsBody {
    pub payments: Vec<PaymentSummary>,
}

/// Append `key=value` to a URL that may already carry a query string.
fn with_query(url: &str, key: &str, value: impl std::fmt::Display) -> String {
    let sep = if url.contains('?') { '&' } else { '?' };
    format!("{url}{sep}{key}={value}")
}

/// `POST /payments/create`
///
/// Blank return/cancel URLs default to this server's callback endpoints.
pub async fn create(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    payload: Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<Json<Envelope<CheckoutBody>>, ApiError> {
    let Json(mut req) = payload.map_err(|e| invalid_body(&e))?;
    if let Some(claims) = session {
        req.account_id = Some(claims.sub);
    }

    let base = state.config.server.public_base_url.trim_end_matches('/');
    if req.return_url.trim().is_empty() {
        req.return_url = format!("{base}/payments/capture");
    }
    if req.cancel_url.trim().is_empty() {
        req.cancel_url = format!("{base}/payments/cancel");
    }

    let checkout = state.checkout.create_checkout(req).await?;
    Ok(Envelope::ok(
        "Redirect the customer to approve the payment",
        CheckoutBody {
            approval_url: checkout.approval_url,
            payment_record_id: checkout.payment_record_id,
        },
    ))
}

/// `GET /payments/capture?paymentId=&payerRef=`
///
/// Always redirects; the browser lands on the success or failure page.
pub async fn capture(
    State(state): State<AppState>,
    query: Result<Query<CaptureQuery>, QueryRejection>,
) -> Redirect {
    let server = &state.config.server;
    let Ok(Query(query)) = query else {
        return Redirect::to(&server.payment_failure_url);
    };

    let result = state.checkout.capture(&query.payment_id, &query.payer_ref).await;
    if let Ok(outcome) = &result {
        info!(outcome = outcome.label(), payment_id = %query.payment_id, "Capture callback handled");
    }
    match result {
        Ok(
            CaptureResult::Captured { position: Some(position) }
            | CaptureResult::AlreadyCaptured { position: Some(position) },
        ) => Redirect::to(&with_query(&server.payment_success_url, "position", position)),
        Ok(
            CaptureResult::Captured { position: None }
            | CaptureResult::AlreadyCaptured { position: None }
            | CaptureResult::BumpFailed,
        ) => Redirect::to(&server.payment_success_url),
        Ok(CaptureResult::Declined) => Redirect::to(&server.payment_failure_url),
        Err(e) => {
            warn!(error = %e, payment_id = %query.payment_id, "Capture callback failed");
            Redirect::to(&server.payment_failure_url)
        }
    }
}

/// `GET /payments/cancel?paymentId=`
pub async fn cancel(
    State(state): State<AppState>,
    query: Result<Query<CancelQuery>, QueryRejection>,
) -> Redirect {
    let cancel_url = &state.config.server.payment_cancel_url;
    if let Ok(Query(query)) = query {
        if let Err(e) = state.checkout.cancel(&query.payment_id).await {
            warn!(error = %e, payment_id = %query.payment_id, "Cancel callback failed");
        }
    }
    Redirect::to(cancel_url)
}

/// `GET /payments/mine`: the caller's payment history.
pub async fn mine(
    State(state): State<AppState>,
    Session(claims): Session,
) -> Result<Json<Envelope<PaymentsBody>>, ApiError> {
    let payments = state
        .checkout
        .db()
        .list_payments_for_account(&claims.sub)
        .await
        .map_err(crate::error::ServiceError::from)?
        .into_iter()
        .map(PaymentSummary::from)
        .collect::<Vec<_>>();
    Ok(Envelope::ok(
        format!("{} payments", payments.len()),
        PaymentsBody { payments },
    ))
}
