//! Waitlist, ledger, mailing-list and counter queries.

use ductline_core::db::unix_timestamp;
use sqlx::Acquire;
use tracing::warn;

use super::db::{DatabaseError, ServerDatabase};
use super::models::{
    BumpActivity, MailingListContact, WaitlistBump, WaitlistEntry, WaitlistStats,
};
use crate::ranking::{self, FreeSlots};

/// Parameters for registering a waitlist entry.
pub struct NewEntry<'a> {
    pub id: &'a str,
    pub account_id: Option<&'a str>,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub email: &'a str,
    pub phone: Option<&'a str>,
    pub address: Option<&'a str>,
}

/// Parameters for a paid bump.
pub struct BumpParams<'a> {
    pub bump_id: &'a str,
    pub entry_id: &'a str,
    pub positions_to_move: i64,
    pub payment_id: &'a str,
    pub amount_paid_cents: i64,
}

/// Result of [`ServerDatabase::apply_bump`].
#[derive(Debug, Clone)]
pub enum BumpOutcome {
    /// The move and its ledger row were committed.
    Applied(WaitlistBump),
    /// A ledger row for this payment already existed; nothing was written.
    AlreadyApplied { bump: WaitlistBump, position: i64 },
}

const INSERT_ENTRY_SQL: &str = "INSERT INTO waitlist \
     (id, account_id, first_name, last_name, email, phone, address, position, created_at, updated_at) \
     SELECT ?, ?, ?, ?, ?, ?, ?, COALESCE(MAX(position) + 1, ?), ?, ? FROM waitlist \
     RETURNING *";

/// Lowest free position in `[target, current)`. A free slot there is either
/// the target itself or directly behind an occupied one.
const FREE_BEHIND_SQL: &str = "SELECT MIN(c) FROM ( \
       SELECT ? AS c \
       UNION ALL \
       SELECT position + 1 FROM waitlist WHERE position >= ? AND position < ? \
     ) AS candidates \
     WHERE c < ? AND NOT EXISTS (SELECT 1 FROM waitlist w WHERE w.position = c)";

/// Highest free position in `[1, target)`. A free slot there is either
/// `target - 1` or directly ahead of an occupied one.
const FREE_AHEAD_SQL: &str = "SELECT MAX(c) FROM ( \
       SELECT ? - 1 AS c \
       UNION ALL \
       SELECT position - 1 FROM waitlist WHERE position < ? \
     ) AS candidates \
     WHERE c >= 1 AND NOT EXISTS (SELECT 1 FROM waitlist w WHERE w.position = c)";

impl ServerDatabase {
    // =========================================================================
    // Waitlist entries
    // =========================================================================

    /// Insert an entry at `max(position) + 1`, or `baseline` on an empty list.
    ///
    /// The position is computed by the same statement that inserts the row,
    /// inside a write transaction, so concurrent inserts never read the same
    /// maximum. The signup counter is bumped behind a savepoint; if that
    /// fails it is rolled back on its own and the entry still commits.
    pub async fn insert_entry(
        &self,
        entry: &NewEntry<'_>,
        baseline: i64,
    ) -> Result<WaitlistEntry, DatabaseError> {
        let now = unix_timestamp();
        let mut tx = self.pool().begin().await?;

        let inserted = sqlx::query_as::<_, WaitlistEntry>(INSERT_ENTRY_SQL)
            .bind(entry.id)
            .bind(entry.account_id)
            .bind(entry.first_name)
            .bind(entry.last_name)
            .bind(entry.email)
            .bind(entry.phone)
            .bind(entry.address)
            .bind(baseline)
            .bind(now)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;

        let counter: Result<(), sqlx::Error> = async {
            let mut sp = tx.begin().await?;
            sqlx::query(
                "INSERT INTO waitlist_stats (id, total_signups, updated_at) VALUES (1, 1, ?) \
                 ON CONFLICT(id) DO UPDATE SET total_signups = total_signups + 1, \
                 updated_at = excluded.updated_at",
            )
            .bind(now)
            .execute(&mut *sp)
            .await?;
            sp.commit().await
        }
        .await;
        if let Err(e) = counter {
            warn!(error = %e, entry_id = %inserted.id, "Signup counter update failed");
        }

        tx.commit().await?;

        Ok(inserted)
    }

    /// Get an entry by ID.
    pub async fn get_entry(&self, id: &str) -> Result<WaitlistEntry, DatabaseError> {
        sqlx::query_as::<_, WaitlistEntry>("SELECT * FROM waitlist WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Waitlist entry {id}")))
    }

    /// Find an entry by its (normalized) email.
    pub async fn find_entry_by_email(
        &self,
        email: &str,
    ) -> Result<Option<WaitlistEntry>, DatabaseError> {
        let entry = sqlx::query_as::<_, WaitlistEntry>("SELECT * FROM waitlist WHERE email = ?")
            .bind(email)
            .fetch_optional(self.pool())
            .await?;
        Ok(entry)
    }

    /// Find the entry linked to an account.
    pub async fn find_entry_by_account(
        &self,
        account_id: &str,
    ) -> Result<Option<WaitlistEntry>, DatabaseError> {
        let entry = sqlx::query_as::<_, WaitlistEntry>(
            "SELECT * FROM waitlist WHERE account_id = ? ORDER BY position LIMIT 1",
        )
        .bind(account_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(entry)
    }

    /// List entries in rank order.
    pub async fn list_entries(
        &self,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<WaitlistEntry>, DatabaseError> {
        let entries = sqlx::query_as::<_, WaitlistEntry>(
            "SELECT * FROM waitlist ORDER BY position ASC LIMIT ? OFFSET ?",
        )
        .bind(i64::from(limit))
        .bind(i64::from(offset))
        .fetch_all(self.pool())
        .await?;
        Ok(entries)
    }

    /// Count all entries.
    pub async fn count_entries(&self) -> Result<i64, DatabaseError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM waitlist")
            .fetch_one(self.pool())
            .await?;
        Ok(row.0)
    }

    /// Count entries strictly ahead of `position`.
    pub async fn count_ahead(&self, position: i64) -> Result<i64, DatabaseError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM waitlist WHERE position < ?")
            .bind(position)
            .fetch_one(self.pool())
            .await?;
        Ok(row.0)
    }

    // =========================================================================
    // Bumps
    // =========================================================================

    /// Move an entry forward and append its ledger row, atomically.
    ///
    /// Idempotent on `payment_id`: a second call with the same payment
    /// returns [`BumpOutcome::AlreadyApplied`] without writing. The first
    /// statement is a write on the entry row so the transaction holds the
    /// write lock before it reads the current position.
    pub async fn apply_bump(&self, params: &BumpParams<'_>) -> Result<BumpOutcome, DatabaseError> {
        let now = unix_timestamp();
        let mut tx = self.pool().begin().await?;

        let locked = sqlx::query("UPDATE waitlist SET position = position WHERE id = ?")
            .bind(params.entry_id)
            .execute(&mut *tx)
            .await?;
        if locked.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!(
                "Waitlist entry {}",
                params.entry_id
            )));
        }

        let current: i64 = sqlx::query_scalar("SELECT position FROM waitlist WHERE id = ?")
            .bind(params.entry_id)
            .fetch_one(&mut *tx)
            .await?;

        let existing = sqlx::query_as::<_, WaitlistBump>(
            "SELECT * FROM waitlist_bumps WHERE payment_id = ?",
        )
        .bind(params.payment_id)
        .fetch_optional(&mut *tx)
        .await?;
        if let Some(bump) = existing {
            tx.commit().await?;
            return Ok(BumpOutcome::AlreadyApplied {
                bump,
                position: current,
            });
        }

        let target = ranking::target_position(current, params.positions_to_move);
        let free = if target < current {
            FreeSlots {
                behind: sqlx::query_scalar(FREE_BEHIND_SQL)
                    .bind(target)
                    .bind(target)
                    .bind(current)
                    .bind(current)
                    .fetch_one(&mut *tx)
                    .await?,
                ahead: sqlx::query_scalar(FREE_AHEAD_SQL)
                    .bind(target)
                    .bind(target)
                    .fetch_one(&mut *tx)
                    .await?,
            }
        } else {
            FreeSlots::default()
        };
        let new_position = ranking::resolve_position(current, target, free);

        sqlx::query("UPDATE waitlist SET position = ?, updated_at = ? WHERE id = ?")
            .bind(new_position)
            .bind(now)
            .bind(params.entry_id)
            .execute(&mut *tx)
            .await?;

        let bump = sqlx::query_as::<_, WaitlistBump>(
            "INSERT INTO waitlist_bumps \
             (id, entry_id, positions_moved, from_position, to_position, amount_paid_cents, payment_id, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING *",
        )
        .bind(params.bump_id)
        .bind(params.entry_id)
        .bind(params.positions_to_move)
        .bind(current)
        .bind(new_position)
        .bind(params.amount_paid_cents)
        .bind(params.payment_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(BumpOutcome::Applied(bump))
    }

    /// Get the ledger row recorded for a payment.
    pub async fn get_bump_by_payment_id(
        &self,
        payment_id: &str,
    ) -> Result<Option<WaitlistBump>, DatabaseError> {
        let bump = sqlx::query_as::<_, WaitlistBump>(
            "SELECT * FROM waitlist_bumps WHERE payment_id = ?",
        )
        .bind(payment_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(bump)
    }

    /// Ledger rows for one entry, newest first.
    pub async fn list_bumps_for_entry(
        &self,
        entry_id: &str,
        limit: u32,
    ) -> Result<Vec<WaitlistBump>, DatabaseError> {
        let bumps = sqlx::query_as::<_, WaitlistBump>(
            "SELECT * FROM waitlist_bumps WHERE entry_id = ? \
             ORDER BY created_at DESC, rowid DESC LIMIT ?",
        )
        .bind(entry_id)
        .bind(i64::from(limit))
        .fetch_all(self.pool())
        .await?;
        Ok(bumps)
    }

    /// Most recent bumps across the whole list, newest first.
    pub async fn recent_activity(&self, limit: u32) -> Result<Vec<BumpActivity>, DatabaseError> {
        let rows = sqlx::query_as::<_, BumpActivity>(
            "SELECT w.first_name, w.last_name, b.positions_moved, b.created_at \
             FROM waitlist_bumps b JOIN waitlist w ON w.id = b.entry_id \
             ORDER BY b.created_at DESC, b.rowid DESC LIMIT ?",
        )
        .bind(i64::from(limit))
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    /// Number of ledger rows.
    pub async fn count_bumps(&self) -> Result<i64, DatabaseError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM waitlist_bumps")
            .fetch_one(self.pool())
            .await?;
        Ok(row.0)
    }

    // =========================================================================
    // Mailing list and counters
    // =========================================================================

    /// Insert or refresh a mailing-list contact, keyed by email.
    pub async fn upsert_mailing_contact(
        &self,
        email: &str,
        first_name: &str,
        last_name: &str,
        source: &str,
    ) -> Result<(), DatabaseError> {
        let now = unix_timestamp();
        sqlx::query(
            "INSERT INTO mailing_list (email, first_name, last_name, source, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?) \
             ON CONFLICT(email) DO UPDATE SET first_name = excluded.first_name, \
             last_name = excluded.last_name, updated_at = excluded.updated_at",
        )
        .bind(email)
        .bind(first_name)
        .bind(last_name)
        .bind(source)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Look up a mailing-list contact by email.
    pub async fn get_mailing_contact(
        &self,
        email: &str,
    ) -> Result<Option<MailingListContact>, DatabaseError> {
        let contact =
            sqlx::query_as::<_, MailingListContact>("SELECT * FROM mailing_list WHERE email = ?")
                .bind(email)
                .fetch_optional(self.pool())
                .await?;
        Ok(contact)
    }

    /// Count mailing-list contacts.
    pub async fn count_mailing_contacts(&self) -> Result<i64, DatabaseError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM mailing_list")
            .fetch_one(self.pool())
            .await?;
        Ok(row.0)
    }

    /// Read the aggregate signup counter (zero before the first signup).
    pub async fn get_stats(&self) -> Result<WaitlistStats, DatabaseError> {
        let stats = sqlx::query_as::<_, WaitlistStats>(
            "SELECT total_signups, updated_at FROM waitlist_stats WHERE id = 1",
        )
        .fetch_optional(self.pool())
        .await?;
        Ok(stats.unwrap_or_default())
    }
}
