//! Waitlist workflows: join, paid bump, and rank reads.
//!
//! [`WaitlistService`] is the only writer of `waitlist.position`.

mod bump;
mod join;
mod rank;

#[cfg(test)]
mod tests;

use ductline_core::config::WaitlistConfig;

use crate::storage::ServerDatabase;

pub use bump::{BumpRequest, Bumped};
pub use join::{JoinRequest, Joined};
pub use rank::{Activity, BumpSummary, Rank};

/// Entry point for waitlist operations. Cheap to clone.
#[derive(Clone)]
pub struct WaitlistService {
    db: ServerDatabase,
    config: WaitlistConfig,
}

impl WaitlistService {
    pub const fn new(db: ServerDatabase, config: WaitlistConfig) -> Self {
        Self { db, config }
    }

    pub const fn db(&self) -> &ServerDatabase {
        &self.db
    }
}
