//! Payment record queries.

use ductline_core::db::unix_timestamp;

use super::db::{DatabaseError, ServerDatabase};
use super::models::{Payment, PaymentStatus};

/// Parameters for opening a payment record.
pub struct NewPayment<'a> {
    pub id: &'a str,
    pub account_id: Option<&'a str>,
    pub amount_cents: i64,
    pub currency: &'a str,
    pub method: &'a str,
    pub description: &'a str,
    pub entry_id: Option<&'a str>,
    pub positions_to_move: Option<i64>,
}

impl ServerDatabase {
    /// Create a payment record in `pending` state.
    pub async fn create_payment(&self, params: &NewPayment<'_>) -> Result<Payment, DatabaseError> {
        let now = unix_timestamp();

        sqlx::query(
            "INSERT INTO payments (id, account_id, amount_cents, currency, status, method, description, entry_id, positions_to_move, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(params.id)
        .bind(params.account_id)
        .bind(params.amount_cents)
        .bind(params.currency)
        .bind(PaymentStatus::Pending.as_str())
        .bind(params.method)
        .bind(params.description)
        .bind(params.entry_id)
        .bind(params.positions_to_move)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?;

        self.get_payment(params.id).await
    }

    /// Get a payment record by its local ID.
    pub async fn get_payment(&self, id: &str) -> Result<Payment, DatabaseError> {
        sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Payment {id}")))
    }

    /// Get a payment record by the processor's reference.
    pub async fn get_payment_by_reference(
        &self,
        payment_id: &str,
    ) -> Result<Payment, DatabaseError> {
        sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE payment_id = ?")
            .bind(payment_id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Payment with reference {payment_id}")))
    }

    /// Attach the processor's reference to a payment record.
    pub async fn set_payment_reference(
        &self,
        id: &str,
        payment_id: &str,
    ) -> Result<(), DatabaseError> {
        let result = sqlx::query("UPDATE payments SET payment_id = ?, updated_at = ? WHERE id = ?")
            .bind(payment_id)
            .bind(unix_timestamp())
            .bind(id)
            .execute(self.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("Payment {id}")));
        }
        Ok(())
    }

    /// Move a payment from `from` to `to`.
    ///
    /// Returns `false` when the record was not in `from`, so only one of
    /// several racing callers wins a transition.
    pub async fn transition_payment(
        &self,
        id: &str,
        from: PaymentStatus,
        to: PaymentStatus,
    ) -> Result<bool, DatabaseError> {
        let result =
            sqlx::query("UPDATE payments SET status = ?, updated_at = ? WHERE id = ? AND status = ?")
                .bind(to.as_str())
                .bind(unix_timestamp())
                .bind(id)
                .bind(from.as_str())
                .execute(self.pool())
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Payment records for an account, newest first.
    pub async fn list_payments_for_account(
        &self,
        account_id: &str,
    ) -> Result<Vec<Payment>, DatabaseError> {
        let payments = sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE account_id = ? ORDER BY created_at DESC, rowid DESC",
        )
        .bind(account_id)
        .fetch_all(self.pool())
        .await?;
        Ok(payments)
    }

    /// Count and total (cents) of payments in a given status.
    pub async fn payment_totals(&self, status: PaymentStatus) -> Result<(i64, i64), DatabaseError> {
        let row: (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(amount_cents), 0) FROM payments WHERE status = ?",
        )
        .bind(status.as_str())
        .fetch_one(self.pool())
        .await?;
        Ok(row)
    }
}
