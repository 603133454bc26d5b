//! Registering a new waitlist entry.

use serde::Deserialize;
use tracing::{info, instrument, warn};

use super::WaitlistService;
use crate::error::ServiceError;
use crate::storage::{DatabaseError, NewEntry};

const MAX_NAME_LEN: usize = 100;
const MAX_EMAIL_LEN: usize = 254;
const MAILING_LIST_SOURCE: &str = "waitlist";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    pub account_id: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Joined {
    pub id: String,
    pub position: i64,
}

struct ValidJoin {
    first_name: String,
    last_name: String,
    email: String,
    phone: Option<String>,
    address: Option<String>,
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(String::from)
}

/// Lowercased, trimmed email, or `None` if it is not shaped like `local@domain.tld`.
pub(crate) fn normalize_email(raw: &str) -> Option<String> {
    let email = raw.trim().to_ascii_lowercase();
    if email.len() > MAX_EMAIL_LEN || email.chars().any(char::is_whitespace) {
        return None;
    }
    let (local, domain) = email.split_once('@')?;
    if local.is_empty() || domain.contains('@') {
        return None;
    }
    let (host, tld) = domain.rsplit_once('.')?;
    if host.is_empty() || tld.is_empty() {
        return None;
    }
    Some(email)
}

fn validate(req: &JoinRequest) -> Result<ValidJoin, ServiceError> {
    let first_name = req.first_name.trim();
    let last_name = req.last_name.trim();
    if first_name.is_empty() || last_name.is_empty() || req.email.trim().is_empty() {
        return Err(ServiceError::validation(
            "First name, last name, and email are required",
        ));
    }
    if first_name.chars().count() > MAX_NAME_LEN || last_name.chars().count() > MAX_NAME_LEN {
        return Err(ServiceError::validation(format!(
            "Names must be at most {MAX_NAME_LEN} characters"
        )));
    }
    let email = normalize_email(&req.email)
        .ok_or_else(|| ServiceError::validation("Please enter a valid email address"))?;

    Ok(ValidJoin {
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        email,
        phone: non_blank(req.phone.as_deref()),
        address: non_blank(req.address.as_deref()),
    })
}

impl WaitlistService {
    /// Register a new entry at the back of the line.
    ///
    /// An email that is already registered yields
    /// [`ServiceError::DuplicateEntry`] with the existing position. The
    /// mailing-list mirror is best-effort and never fails the join.
    #[instrument(skip(self, req), fields(linked = req.account_id.is_some()))]
    pub async fn join(&self, req: JoinRequest) -> Result<Joined, ServiceError> {
        let input = validate(&req)?;

        if let Some(existing) = self.db.find_entry_by_email(&input.email).await? {
            info!(entry_id = %existing.id, position = existing.position, "Duplicate waitlist signup");
            return Err(ServiceError::DuplicateEntry {
                position: existing.position,
            });
        }

        let id = uuid::Uuid::new_v4().to_string();
        let account_id = non_blank(req.account_id.as_deref());
        let new_entry = NewEntry {
            id: &id,
            account_id: account_id.as_deref(),
            first_name: &input.first_name,
            last_name: &input.last_name,
            email: &input.email,
            phone: input.phone.as_deref(),
            address: input.address.as_deref(),
        };

        let entry = match self
            .db
            .insert_entry(&new_entry, self.config.baseline_position)
            .await
        {
            Ok(entry) => entry,
            Err(DatabaseError::Conflict(detail)) => {
                // Lost a race with a concurrent signup for the same email.
                let existing = self
                    .db
                    .find_entry_by_email(&input.email)
                    .await?
                    .ok_or(ServiceError::Upstream(detail))?;
                return Err(ServiceError::DuplicateEntry {
                    position: existing.position,
                });
            }
            Err(e) => return Err(e.into()),
        };

        if let Err(e) = self
            .db
            .upsert_mailing_contact(
                &input.email,
                &input.first_name,
                &input.last_name,
                MAILING_LIST_SOURCE,
            )
            .await
        {
            warn!(error = %e, entry_id = %entry.id, "Mailing list mirror failed");
        }

        info!(entry_id = %entry.id, position = entry.position, "Waitlist entry created");
        #[cfg(feature = "metrics")]
        ductline_core::metrics::record_join();

        Ok(Joined {
            id: entry.id,
            position: entry.position,
        })
    }
}
