//! Checkout lifecycle: create, capture, cancel, and paid bumps.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{error, info, instrument, warn};

use super::gateway::{CheckoutOrder, PaymentGateway};
use super::money;
use crate::error::ServiceError;
use crate::storage::{NewPayment, Payment, PaymentStatus, ServerDatabase};
use crate::waitlist::{BumpRequest, WaitlistService};

const PAYMENT_METHOD: &str = "paypal";
const DEFAULT_DESCRIPTION: &str = "Fast Track";
const MAX_DESCRIPTION_LEN: usize = 127;

/// Body of `POST /payments/create`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub account_id: Option<String>,
    /// Decimal currency units.
    pub amount: Decimal,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub return_url: String,
    #[serde(default)]
    pub cancel_url: String,
    pub entry_id: Option<String>,
    pub positions_to_move: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkout {
    pub payment_record_id: String,
    pub approval_url: String,
}

/// How a capture callback ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureResult {
    /// Funds captured now; `position` is set when a bump ran.
    Captured { position: Option<i64> },
    /// The payment was already completed by an earlier callback.
    AlreadyCaptured { position: Option<i64> },
    /// The processor did not capture, or the record is no longer pending.
    Declined,
    /// Funds were captured but the bump could not be applied.
    BumpFailed,
}

impl CaptureResult {
    /// Short outcome name for logs and counters.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Captured { .. } => "captured",
            Self::AlreadyCaptured { .. } => "already_captured",
            Self::Declined => "declined",
            Self::BumpFailed => "bump_failed",
        }
    }
}

/// Body of `POST /waitlist/bump`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaidBumpRequest {
    #[serde(default)]
    pub entry_id: String,
    #[serde(default)]
    pub positions_to_move: i64,
    #[serde(default)]
    pub payment_reference: String,
    /// Decimal currency units, informational; the recorded amount wins.
    pub amount_paid: Option<Decimal>,
}

#[derive(Clone)]
pub struct CheckoutService {
    db: ServerDatabase,
    gateway: Arc<dyn PaymentGateway>,
    waitlist: WaitlistService,
    currency: String,
}

fn required<'a>(value: &'a str, what: &str) -> Result<&'a str, ServiceError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ServiceError::validation(format!("{what} is required")));
    }
    Ok(value)
}

impl CheckoutService {
    pub fn new(
        db: ServerDatabase,
        gateway: Arc<dyn PaymentGateway>,
        waitlist: WaitlistService,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            db,
            gateway,
            waitlist,
            currency: currency.into(),
        }
    }

    /// Open a pending payment and ask the processor for an approval URL.
    #[instrument(skip(self, req), fields(entry_id = ?req.entry_id))]
    pub async fn create_checkout(&self, req: CheckoutRequest) -> Result<Checkout, ServiceError> {
        let amount_cents = money::to_cents(req.amount)
            .ok_or_else(|| ServiceError::validation("Amount must be greater than zero"))?;
        let return_url = required(&req.return_url, "Return URL")?;
        let cancel_url = required(&req.cancel_url, "Cancel URL")?;

        let description = match req.description.trim() {
            "" => DEFAULT_DESCRIPTION,
            d => d,
        };
        if description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(ServiceError::validation(format!(
                "Description must be at most {MAX_DESCRIPTION_LEN} characters"
            )));
        }

        let entry_id = req
            .entry_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty());
        match (entry_id, req.positions_to_move) {
            (None, None) => {}
            (Some(id), Some(n)) if n > 0 => {
                self.db.get_entry(id).await?;
            }
            (Some(_), Some(_)) => {
                return Err(ServiceError::validation(
                    "Positions to move must be a positive number",
                ));
            }
            _ => {
                return Err(ServiceError::validation(
                    "A Fast Track purchase needs both an entry and a number of positions",
                ));
            }
        }

        let record_id = uuid::Uuid::new_v4().to_string();
        let account_id = req
            .account_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty());
        self.db
            .create_payment(&NewPayment {
                id: &record_id,
                account_id,
                amount_cents,
                currency: &self.currency,
                method: PAYMENT_METHOD,
                description,
                entry_id,
                positions_to_move: entry_id.and(req.positions_to_move),
            })
            .await?;

        let order = CheckoutOrder {
            amount_cents,
            currency: &self.currency,
            description,
            return_url,
            cancel_url,
        };
        let created = match self.gateway.create_payment(&order).await {
            Ok(created) => created,
            Err(e) => {
                error!(error = %e, payment_record_id = %record_id, "Payment creation failed");
                self.mark(&record_id, PaymentStatus::Failed).await;
                return Err(e.into());
            }
        };

        self.db
            .set_payment_reference(&record_id, &created.payment_id)
            .await?;

        info!(
            payment_record_id = %record_id,
            payment_id = %created.payment_id,
            amount_cents,
            "Checkout created"
        );
        Ok(Checkout {
            payment_record_id: record_id,
            approval_url: created.approval_url,
        })
    }

    /// Capture an approved payment and apply its bump, if it carries one.
    ///
    /// Safe to call repeatedly for the same payment: only the first caller
    /// moves the record out of `pending`, and the bump is keyed by the
    /// processor's payment id.
    #[instrument(skip(self, payer_ref))]
    pub async fn capture(
        &self,
        payment_id: &str,
        payer_ref: &str,
    ) -> Result<CaptureResult, ServiceError> {
        let result = self.capture_inner(payment_id, payer_ref).await;
        #[cfg(feature = "metrics")]
        if let Ok(outcome) = &result {
            ductline_core::metrics::record_capture(outcome.label());
        }
        result
    }

    async fn capture_inner(
        &self,
        payment_id: &str,
        payer_ref: &str,
    ) -> Result<CaptureResult, ServiceError> {
        let payment_id = required(payment_id, "Payment ID")?;
        let payer_ref = required(payer_ref, "Payer ID")?;
        let payment = self.db.get_payment_by_reference(payment_id).await?;

        match payment.status() {
            Some(PaymentStatus::Pending) => {}
            Some(PaymentStatus::Completed) => {
                info!(payment_record_id = %payment.id, "Payment already captured");
                let position = self.bump_for(&payment).await.ok().flatten();
                return Ok(CaptureResult::AlreadyCaptured { position });
            }
            status => {
                warn!(payment_record_id = %payment.id, ?status, "Capture for a closed payment");
                return Ok(CaptureResult::Declined);
            }
        }

        match self.gateway.capture_payment(payment_id, payer_ref).await {
            Ok(outcome) if outcome.completed => {}
            Ok(outcome) => {
                warn!(payment_record_id = %payment.id, state = %outcome.state, "Payment not captured");
                self.mark(&payment.id, PaymentStatus::Failed).await;
                return Ok(CaptureResult::Declined);
            }
            Err(e) => {
                // Outcome unknown: stay pending for a retry or a concurrent
                // callback to settle.
                error!(
                    reconciliation = true,
                    error = %e,
                    payment_record_id = %payment.id,
                    payment_id,
                    "Payment capture could not be confirmed"
                );
                return Ok(CaptureResult::Declined);
            }
        }

        let won = self
            .db
            .transition_payment(&payment.id, PaymentStatus::Pending, PaymentStatus::Completed)
            .await?;
        if !won {
            return self.settle_lost_transition(&payment).await;
        }
        info!(payment_record_id = %payment.id, amount_cents = payment.amount_cents, "Payment captured");

        match self.bump_for(&payment).await {
            Ok(position) => Ok(CaptureResult::Captured { position }),
            Err(_) => Ok(CaptureResult::BumpFailed),
        }
    }

    /// The processor confirmed a capture but the record had already left
    /// `pending`. A `completed` record means another callback won; a
    /// `failed` or `cancelled` one contradicts the processor and is forced
    /// to `completed`.
    async fn settle_lost_transition(
        &self,
        payment: &Payment,
    ) -> Result<CaptureResult, ServiceError> {
        let current = self.db.get_payment(&payment.id).await?;
        match current.status() {
            Some(PaymentStatus::Completed) => {}
            Some(from @ (PaymentStatus::Failed | PaymentStatus::Cancelled)) => {
                let forced = self
                    .db
                    .transition_payment(&payment.id, from, PaymentStatus::Completed)
                    .await?;
                error!(
                    reconciliation = true,
                    payment_record_id = %payment.id,
                    payment_id = ?payment.payment_id,
                    recorded_status = %from,
                    forced,
                    "Processor captured a payment recorded as closed"
                );
            }
            status => {
                error!(
                    reconciliation = true,
                    payment_record_id = %payment.id,
                    ?status,
                    "Captured payment has an unexpected status"
                );
            }
        }
        let position = self.bump_for(&current).await.ok().flatten();
        Ok(CaptureResult::AlreadyCaptured { position })
    }

    /// Mark a pending payment cancelled. Returns whether anything changed.
    #[instrument(skip(self))]
    pub async fn cancel(&self, payment_id: &str) -> Result<bool, ServiceError> {
        let payment_id = required(payment_id, "Payment ID")?;
        let payment = self.db.get_payment_by_reference(payment_id).await?;
        let cancelled = self
            .db
            .transition_payment(&payment.id, PaymentStatus::Pending, PaymentStatus::Cancelled)
            .await?;
        info!(payment_record_id = %payment.id, cancelled, "Checkout cancelled");
        Ok(cancelled)
    }

    /// Apply a bump for a payment the caller claims was captured.
    ///
    /// The payment must exist, be `completed`, and, if it was bought for a
    /// specific bump, match that entry and move.
    #[instrument(skip(self, req), fields(entry_id = %req.entry_id))]
    pub async fn apply_paid_bump(&self, req: PaidBumpRequest) -> Result<i64, ServiceError> {
        let reference = required(&req.payment_reference, "Payment reference")?;
        let payment = match self.db.get_payment_by_reference(reference).await {
            Ok(payment) => payment,
            Err(crate::storage::DatabaseError::NotFound(_)) => {
                return Err(ServiceError::validation("Payment could not be verified"));
            }
            Err(e) => return Err(e.into()),
        };
        if payment.status() != Some(PaymentStatus::Completed) {
            return Err(ServiceError::validation("Payment has not been completed"));
        }
        if let Some((entry_id, n)) = payment.bump_intent() {
            if entry_id != req.entry_id.trim() || n != req.positions_to_move {
                return Err(ServiceError::validation(
                    "Payment does not match this Fast Track purchase",
                ));
            }
        }
        if let Some(amount) = req.amount_paid {
            if money::to_cents(amount) != Some(payment.amount_cents) {
                warn!(payment_record_id = %payment.id, "Bump amount differs from recorded payment");
            }
        }

        let bumped = self
            .waitlist
            .bump(BumpRequest {
                entry_id: req.entry_id.trim().to_string(),
                positions_to_move: req.positions_to_move,
                payment_reference: reference.to_string(),
                amount_paid_cents: payment.amount_cents,
            })
            .await?;
        Ok(bumped.new_position)
    }

    /// Run the bump a completed payment paid for.
    ///
    /// `Ok(None)` when the payment carries no bump. Failures are logged for
    /// manual reconciliation since the funds are already captured.
    async fn bump_for(&self, payment: &Payment) -> Result<Option<i64>, ServiceError> {
        let Some((entry_id, positions)) = payment.bump_intent() else {
            return Ok(None);
        };
        let Some(payment_id) = payment.payment_id.as_deref() else {
            return Ok(None);
        };

        let result = self
            .waitlist
            .bump(BumpRequest {
                entry_id: entry_id.to_string(),
                positions_to_move: positions,
                payment_reference: payment_id.to_string(),
                amount_paid_cents: payment.amount_cents,
            })
            .await;

        match result {
            Ok(bumped) => Ok(Some(bumped.new_position)),
            Err(e) => {
                error!(
                    reconciliation = true,
                    error = %e,
                    payment_record_id = %payment.id,
                    payment_id,
                    entry_id,
                    positions,
                    "Bump failed after payment capture"
                );
                Err(e)
            }
        }
    }

    /// Best-effort status change out of `pending`.
    async fn mark(&self, record_id: &str, to: PaymentStatus) {
        if let Err(e) = self
            .db
            .transition_payment(record_id, PaymentStatus::Pending, to)
            .await
        {
            warn!(error = %e, payment_record_id = %record_id, status = %to, "Payment status update failed");
        }
    }

    pub const fn db(&self) -> &ServerDatabase {
        &self.db
    }
}
