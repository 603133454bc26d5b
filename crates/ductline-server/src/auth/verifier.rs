//! HS256 session-token validation.

use std::collections::HashSet;

use ductline_core::config::AuthConfig;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};

use super::AuthError;
use super::claims::Claims;

/// Validates session tokens and decides admin access.
#[derive(Clone)]
pub struct TokenVerifier {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    admin_emails: HashSet<String>,
}

impl TokenVerifier {
    pub fn new(secret: &[u8], admin_emails: &[String]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Provider tokens carry an audience we do not pin.
        validation.validate_aud = false;

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            admin_emails: admin_emails
                .iter()
                .map(|e| e.trim().to_ascii_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.jwt_secret.as_bytes(), &config.admin_emails)
    }

    /// Validate a token and return its claims.
    pub fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        Ok(data.claims)
    }

    /// Admin when the token says so or the email is on the configured list.
    pub fn is_admin(&self, claims: &Claims) -> bool {
        claims.has_admin_role()
            || claims
                .normalized_email()
                .is_some_and(|email| self.admin_emails.contains(&email))
    }

    /// Validate a token and require admin access.
    pub fn authorize_admin(&self, token: &str) -> Result<Claims, AuthError> {
        let claims = self.validate(token)?;
        if self.is_admin(&claims) {
            Ok(claims)
        } else {
            Err(AuthError::NotAdmin)
        }
    }

    /// Sign a token with the shared secret. Used by local tooling and tests;
    /// production tokens come from the identity provider.
    pub fn issue(
        &self,
        sub: &str,
        email: Option<&str>,
        role: Option<&str>,
        ttl_secs: i64,
    ) -> Result<String, AuthError> {
        let now = now_secs();
        let claims = Claims {
            sub: sub.to_string(),
            email: email.map(String::from),
            role: role.map(String::from),
            iat: now,
            exp: now + ttl_secs,
        };
        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.encoding_key,
        )?)
    }
}

fn now_secs() -> i64 {
    #[allow(clippy::cast_possible_wrap)]
    let secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64;
    secs
}
