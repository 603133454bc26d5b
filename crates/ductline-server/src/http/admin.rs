//! `/admin` handlers. Every route requires an [`AdminSession`].

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::AppState;
use super::error::{ApiError, Envelope};
use super::session::AdminSession;
use super::waitlist::invalid_query;
use crate::error::ServiceError;
use crate::storage::{PaymentStatus, WaitlistEntry};

const DEFAULT_PAGE_SIZE: u32 = 100;
const MAX_PAGE_SIZE: u32 = 500;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminEntry {
    pub id: String,
    pub position: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub account_id: Option<String>,
    pub created_at: i64,
}

impl From<WaitlistEntry> for AdminEntry {
    fn from(e: WaitlistEntry) -> Self {
        Self {
            id: e.id,
            position: e.position,
            first_name: e.first_name,
            last_name: e.last_name,
            email: e.email,
            phone: e.phone,
            address: e.address,
            account_id: e.account_id,
            created_at: e.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EntriesBody {
    pub entries: Vec<AdminEntry>,
    pub total: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsBody {
    pub total_entries: i64,
    pub total_signups: i64,
    pub mailing_list_size: i64,
    pub total_bumps: i64,
    pub completed_payments: i64,
    pub revenue_cents: i64,
    pub pending_payments: i64,
}

/// `GET /admin/waitlist?limit=&offset=`
pub async fn waitlist(
    State(state): State<AppState>,
    AdminSession(claims): AdminSession,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<Envelope<EntriesBody>>, ApiError> {
    let Query(page) = query.map_err(|e| invalid_query(&e))?;
    let limit = page.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = page.offset.unwrap_or(0);

    let db = state.waitlist.db();
    let entries = db
        .list_entries(limit, offset)
        .await
        .map_err(ServiceError::from)?;
    let total = db.count_entries().await.map_err(ServiceError::from)?;
    info!(admin = %claims.sub, limit, offset, "Admin listed waitlist");

    Ok(Envelope::ok(
        format!("{} of {total} entries", entries.len()),
        EntriesBody {
            entries: entries.into_iter().map(AdminEntry::from).collect(),
            total,
        },
    ))
}

/// `GET /admin/stats`
pub async fn stats(
    State(state): State<AppState>,
    AdminSession(_): AdminSession,
) -> Result<Json<Envelope<StatsBody>>, ApiError> {
    let db = state.waitlist.db();
    let body = async {
        let (completed_payments, revenue_cents) =
            db.payment_totals(PaymentStatus::Completed).await?;
        let (pending_payments, _) = db.payment_totals(PaymentStatus::Pending).await?;
        Ok::<_, crate::storage::DatabaseError>(StatsBody {
            total_entries: db.count_entries().await?,
            total_signups: db.get_stats().await?.total_signups,
            mailing_list_size: db.count_mailing_contacts().await?,
            total_bumps: db.count_bumps().await?,
            completed_payments,
            revenue_cents,
            pending_payments,
        })
    }
    .await
    .map_err(ServiceError::from)?;

    Ok(Envelope::ok("Waitlist statistics", body))
}
