//! Session-token verification for Ductline.
//!
//! Tokens are issued by the hosted identity provider and signed with the
//! project's shared secret; this module only verifies them.

pub mod claims;
pub mod verifier;

use thiserror::Error;

pub use claims::Claims;
pub use verifier::TokenVerifier;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing bearer token")]
    MissingToken,

    #[error("Invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error("Admin access required")]
    NotAdmin,
}
