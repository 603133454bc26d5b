//! Claims carried by identity-provider session tokens.

use serde::{Deserialize, Serialize};

/// Session token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (account ID).
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Expiration (unix timestamp).
    pub exp: i64,
}

impl Claims {
    pub fn has_admin_role(&self) -> bool {
        self.role.as_deref() == Some("admin")
    }

    /// Email, lowercased for comparison.
    pub fn normalized_email(&self) -> Option<String> {
        self.email.as_deref().map(|e| e.trim().to_ascii_lowercase())
    }
}
