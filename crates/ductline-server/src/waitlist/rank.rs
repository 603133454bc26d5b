//! Read-only rank and activity views.

use serde::Serialize;

use super::WaitlistService;
use crate::error::ServiceError;
use crate::storage::{BumpActivity, WaitlistBump, WaitlistEntry};

/// How many of an entry's own bumps a rank view includes.
const RANK_BUMP_HISTORY: u32 = 5;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rank {
    pub entry_id: String,
    pub position: i64,
    pub people_ahead: i64,
    pub total_entries: i64,
    pub recent_bumps: Vec<BumpSummary>,
}

/// One of the entry's own ledger rows, without processor references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BumpSummary {
    pub positions_moved: i64,
    pub from_position: i64,
    pub to_position: i64,
    pub created_at: i64,
}

impl From<WaitlistBump> for BumpSummary {
    fn from(bump: WaitlistBump) -> Self {
        Self {
            positions_moved: bump.positions_moved,
            from_position: bump.from_position,
            to_position: bump.to_position,
            created_at: bump.created_at,
        }
    }
}

/// A public ledger line. Names are reduced to first name and last initial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub display_name: String,
    pub positions_moved: i64,
    pub created_at: i64,
}

impl From<BumpActivity> for Activity {
    fn from(row: BumpActivity) -> Self {
        let display_name = match row.last_name.chars().next() {
            Some(initial) => format!("{} {}.", row.first_name, initial.to_uppercase()),
            None => row.first_name,
        };
        Self {
            display_name,
            positions_moved: row.positions_moved,
            created_at: row.created_at,
        }
    }
}

impl WaitlistService {
    /// Current rank of an entry.
    pub async fn rank(&self, entry_id: &str) -> Result<Rank, ServiceError> {
        let entry = self.db.get_entry(entry_id).await?;
        self.rank_of(entry).await
    }

    /// Rank of the entry linked to an account, if it has one.
    pub async fn rank_for_account(&self, account_id: &str) -> Result<Rank, ServiceError> {
        let entry = self
            .db
            .find_entry_by_account(account_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Waitlist entry for account {account_id}")))?;
        self.rank_of(entry).await
    }

    async fn rank_of(&self, entry: WaitlistEntry) -> Result<Rank, ServiceError> {
        let people_ahead = self.db.count_ahead(entry.position).await?.max(0);
        let total_entries = self.db.count_entries().await?;
        let recent_bumps = self
            .db
            .list_bumps_for_entry(&entry.id, RANK_BUMP_HISTORY)
            .await?
            .into_iter()
            .map(BumpSummary::from)
            .collect();

        Ok(Rank {
            entry_id: entry.id,
            position: entry.position,
            people_ahead,
            total_entries,
            recent_bumps,
        })
    }

    /// Latest bumps across the list. `limit` defaults to the configured
    /// activity size and is clamped to the configured maximum.
    pub async fn recent_activity(&self, limit: Option<u32>) -> Result<Vec<Activity>, ServiceError> {
        let limit = limit
            .unwrap_or(self.config.activity_limit)
            .clamp(1, self.config.max_activity_limit.max(1));
        let rows = self.db.recent_activity(limit).await?;
        Ok(rows.into_iter().map(Activity::from).collect())
    }
}
