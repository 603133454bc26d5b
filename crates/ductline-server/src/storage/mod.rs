//! SQLite storage for the Ductline server.
//!
//! Provides persistence for waitlist entries, the bump ledger, payments,
//! the mailing list, and the aggregate signup counter.

mod db;
mod models;
mod queries_payments;
mod queries_waitlist;

#[cfg(test)]
mod tests;

pub use db::{DatabaseError, ServerDatabase};
pub use models::*;
pub use queries_payments::NewPayment;
pub use queries_waitlist::{BumpOutcome, BumpParams, NewEntry};
