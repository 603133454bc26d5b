//! `/waitlist` handlers.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};

use super::AppState;
use super::error::{ApiError, Envelope};
use super::session::{MaybeSession, Session};
use crate::payments::PaidBumpRequest;
use crate::waitlist::{Activity, JoinRequest, Rank};

#[derive(Debug, Serialize)]
pub struct JoinBody {
    pub id: String,
    pub position: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BumpBody {
    pub new_position: i64,
}

#[derive(Debug, Serialize)]
pub struct ActivityBody {
    pub activity: Vec<Activity>,
}

#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    pub limit: Option<u32>,
}

pub(super) fn invalid_body(e: &JsonRejection) -> ApiError {
    ApiError::BadRequest(format!("Invalid request body: {}", e.body_text()))
}

pub(super) fn invalid_query(e: &QueryRejection) -> ApiError {
    ApiError::BadRequest(format!("Invalid query: {}", e.body_text()))
}

/// `POST /waitlist/join`
///
/// A signed-in caller's account is linked from the token, not the body.
pub async fn join(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    payload: Result<Json<JoinRequest>, JsonRejection>,
) -> Result<Json<Envelope<JoinBody>>, ApiError> {
    let Json(mut req) = payload.map_err(|e| invalid_body(&e))?;
    if let Some(claims) = session {
        req.account_id = Some(claims.sub);
    }

    let joined = state.waitlist.join(req).await?;
    Ok(Envelope::ok(
        format!("You're on the waitlist at position #{}", joined.position),
        JoinBody {
            id: joined.id,
            position: joined.position,
        },
    ))
}

/// `POST /waitlist/bump`
pub async fn bump(
    State(state): State<AppState>,
    payload: Result<Json<PaidBumpRequest>, JsonRejection>,
) -> Result<Json<Envelope<BumpBody>>, ApiError> {
    let Json(req) = payload.map_err(|e| invalid_body(&e))?;
    let new_position = state.checkout.apply_paid_bump(req).await?;
    Ok(Envelope::ok(
        format!("You've moved up to position #{new_position}"),
        BumpBody { new_position },
    ))
}

/// `GET /waitlist/{id}/rank`
pub async fn rank(
    State(state): State<AppState>,
    Path(entry_id): Path<String>,
) -> Result<Json<Envelope<Rank>>, ApiError> {
    let rank = state.waitlist.rank(&entry_id).await?;
    Ok(Envelope::ok(format!("Position #{}", rank.position), rank))
}

/// `GET /waitlist/me`: rank of the caller's linked entry.
pub async fn my_rank(
    State(state): State<AppState>,
    Session(claims): Session,
) -> Result<Json<Envelope<Rank>>, ApiError> {
    let rank = state.waitlist.rank_for_account(&claims.sub).await?;
    Ok(Envelope::ok(format!("Position #{}", rank.position), rank))
}

/// `GET /waitlist/activity?limit=`
pub async fn activity(
    State(state): State<AppState>,
    query: Result<Query<ActivityQuery>, QueryRejection>,
) -> Result<Json<Envelope<ActivityBody>>, ApiError> {
    let Query(query) = query.map_err(|e| invalid_query(&e))?;
    let activity = state.waitlist.recent_activity(query.limit).await?;
    Ok(Envelope::ok(
        format!("{} recent Fast Track moves", activity.len()),
        ActivityBody { activity },
    ))
}
