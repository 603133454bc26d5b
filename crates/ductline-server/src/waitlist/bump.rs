//! Paid Fast Track bumps.

use tracing::{info, instrument};

use super::WaitlistService;
use crate::error::ServiceError;
use crate::storage::{BumpOutcome, BumpParams, DatabaseError};

#[derive(Debug, Clone)]
pub struct BumpRequest {
    pub entry_id: String,
    pub positions_to_move: i64,
    /// Processor reference of the captured payment; the idempotency key.
    pub payment_reference: String,
    pub amount_paid_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bumped {
    pub previous_position: i64,
    pub new_position: i64,
    /// The payment had already been applied; nothing changed on this call.
    pub already_applied: bool,
}

fn validate(req: &BumpRequest) -> Result<(), ServiceError> {
    if req.entry_id.trim().is_empty() {
        return Err(ServiceError::validation("Waitlist entry is required"));
    }
    if req.positions_to_move <= 0 {
        return Err(ServiceError::validation(
            "Positions to move must be a positive number",
        ));
    }
    if req.payment_reference.trim().is_empty() {
        return Err(ServiceError::validation("Payment reference is required"));
    }
    if req.amount_paid_cents < 0 {
        return Err(ServiceError::validation("Amount paid cannot be negative"));
    }
    Ok(())
}

impl WaitlistService {
    /// Move an entry `positions_to_move` places forward, capped at the front.
    ///
    /// The caller must already hold a captured payment. Replaying the same
    /// `payment_reference` is a successful no-op.
    #[instrument(skip(self, req), fields(entry_id = %req.entry_id, positions = req.positions_to_move))]
    pub async fn bump(&self, req: BumpRequest) -> Result<Bumped, ServiceError> {
        validate(&req)?;

        let bump_id = uuid::Uuid::new_v4().to_string();
        let params = BumpParams {
            bump_id: &bump_id,
            entry_id: &req.entry_id,
            positions_to_move: req.positions_to_move,
            payment_id: &req.payment_reference,
            amount_paid_cents: req.amount_paid_cents,
        };

        let outcome = match self.db.apply_bump(&params).await {
            Ok(outcome) => outcome,
            Err(DatabaseError::Conflict(detail)) => {
                // The ledger's unique payment_id caught a concurrent replay.
                let bump = self
                    .db
                    .get_bump_by_payment_id(&req.payment_reference)
                    .await?
                    .ok_or(ServiceError::Upstream(detail))?;
                let position = self.db.get_entry(&bump.entry_id).await?.position;
                BumpOutcome::AlreadyApplied { bump, position }
            }
            Err(e) => return Err(e.into()),
        };

        match outcome {
            BumpOutcome::Applied(bump) => {
                info!(
                    from = bump.from_position,
                    to = bump.to_position,
                    payment_id = %bump.payment_id,
                    "Waitlist entry bumped"
                );
                #[cfg(feature = "metrics")]
                ductline_core::metrics::record_bump(bump.positions_moved.unsigned_abs());
                Ok(Bumped {
                    previous_position: bump.from_position,
                    new_position: bump.to_position,
                    already_applied: false,
                })
            }
            BumpOutcome::AlreadyApplied { bump, position } => {
                if bump.entry_id != req.entry_id {
                    return Err(ServiceError::validation(
                        "This payment has already been used for another registration",
                    ));
                }
                info!(payment_id = %bump.payment_id, position, "Bump already applied");
                Ok(Bumped {
                    previous_position: bump.from_position,
                    new_position: position,
                    already_applied: true,
                })
            }
        }
    }
}
