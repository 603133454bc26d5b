//! Ductline server: waitlist ranking with paid Fast Track bumps.

pub mod auth;
pub mod error;
pub mod http;
pub mod payments;
pub mod ranking;
pub mod storage;
pub mod waitlist;
