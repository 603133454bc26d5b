//! Configuration resolution for Ductline.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (~/.config/ductline/settings.json)
//! 3. Explicit config file (`--config`)
//! 4. Environment variables
//! 5. CLI arguments (highest priority, applied by the binary)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Complete Ductline configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub waitlist: WaitlistConfig,
    #[serde(default)]
    pub payments: PaymentsConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub database_path: Option<PathBuf>,
    /// Externally visible base URL, used to build processor callback URLs.
    pub public_base_url: String,
    /// Where the browser lands after a captured payment.
    pub payment_success_url: String,
    /// Where the browser lands after a failed capture.
    pub payment_failure_url: String,
    /// Where the browser lands after the payer cancels checkout.
    pub payment_cancel_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            database_path: None,
            public_base_url: "http://localhost:8080".to_string(),
            payment_success_url: "/fast-track/success".to_string(),
            payment_failure_url: "/fast-track/failed".to_string(),
            payment_cancel_url: "/fast-track/cancelled".to_string(),
        }
    }
}

/// Waitlist ranking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitlistConfig {
    /// Position handed to the first registrant of an empty waitlist.
    pub baseline_position: i64,
    /// Default number of ledger rows shown as recent activity.
    pub activity_limit: u32,
    /// Upper bound a caller may request for recent activity.
    pub max_activity_limit: u32,
}

impl Default for WaitlistConfig {
    fn default() -> Self {
        Self {
            baseline_position: 1344,
            activity_limit: 10,
            max_activity_limit: 50,
        }
    }
}

/// Payment processor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentsConfig {
    /// REST API base URL of the processor.
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    /// ISO 4217 currency code used for every checkout.
    pub currency: String,
    /// Timeout for a single processor request (seconds).
    pub request_timeout_secs: u64,
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api-m.sandbox.paypal.com".to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            currency: "USD".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Session-token configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Shared secret the identity provider signs session tokens with.
    pub jwt_secret: String,
    /// Accounts granted the admin dashboard regardless of token role.
    pub admin_emails: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "dev-secret-change-me".to_string(),
            admin_emails: Vec::new(),
        }
    }
}

impl Config {
    /// Reject settings the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.waitlist.baseline_position < 1 {
            return Err(Error::Config(
                "waitlist.baseline_position must be at least 1".into(),
            ));
        }
        if self.waitlist.activity_limit == 0 || self.waitlist.max_activity_limit == 0 {
            return Err(Error::Config("waitlist activity limits must be positive".into()));
        }
        if self.payments.currency.len() != 3
            || !self.payments.currency.chars().all(|c| c.is_ascii_uppercase())
        {
            return Err(Error::Config(format!(
                "payments.currency must be an ISO 4217 code, got {:?}",
                self.payments.currency
            )));
        }
        if self.auth.jwt_secret.is_empty() {
            return Err(Error::Config("auth.jwt_secret must not be empty".into()));
        }
        Ok(())
    }
}

/// Load configuration with hierarchical resolution.
pub fn load_config(config_file: Option<&Path>) -> Result<Config> {
    let mut config = Config::default();

    // Load global config
    if let Some(global_path) = global_config_path() {
        if global_path.exists() {
            let global = load_config_file(&global_path)?;
            merge_config(&mut config, global);
        }
    }

    // Load explicit config
    if let Some(path) = config_file {
        let explicit = load_config_file(path)?;
        merge_config(&mut config, explicit);
    }

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config.validate()?;

    Ok(config)
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    config_dir().map(|p| p.join("settings.json"))
}

/// Get the default database path for the server.
pub fn database_path() -> Option<PathBuf> {
    config_dir().map(|p| p.join("ductline.db"))
}

fn config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .ok()
            .map(|h| PathBuf::from(h).join(".ductline"))
    }
    #[cfg(target_os = "macos")]
    {
        std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join("Library/Application Support/ductline"))
    }
    #[cfg(target_os = "linux")]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| std::env::var("HOME").ok().map(|h| PathBuf::from(h).join(".config")))
            .map(|p| p.join("ductline"))
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    {
        None
    }
}

fn load_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| Error::ConfigParse {
        path: path.to_path_buf(),
        source,
    })
}

fn merge_config(base: &mut Config, overlay: Config) {
    if overlay.server.database_path.is_some() {
        base.server.database_path = overlay.server.database_path;
    }
    base.server.listen_addr = overlay.server.listen_addr;
    base.server.public_base_url = overlay.server.public_base_url;
    base.server.payment_success_url = overlay.server.payment_success_url;
    base.server.payment_failure_url = overlay.server.payment_failure_url;
    base.server.payment_cancel_url = overlay.server.payment_cancel_url;

    base.waitlist = overlay.waitlist;

    // Keep credentials from a lower layer when the overlay leaves them blank.
    let PaymentsConfig {
        base_url,
        client_id,
        client_secret,
        currency,
        request_timeout_secs,
    } = overlay.payments;
    base.payments.base_url = base_url;
    if !client_id.is_empty() {
        base.payments.client_id = client_id;
    }
    if !client_secret.is_empty() {
        base.payments.client_secret = client_secret;
    }
    base.payments.currency = currency;
    base.payments.request_timeout_secs = request_timeout_secs;

    base.auth.jwt_secret = overlay.auth.jwt_secret;
    base.auth.admin_emails.extend(overlay.auth.admin_emails);
    base.auth.admin_emails.sort();
    base.auth.admin_emails.dedup();
}

/// Apply `DUCTLINE_*` overrides. `lookup` resolves a variable name.
pub fn apply_env_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(val) = lookup("DUCTLINE_LISTEN_ADDR") {
        config.server.listen_addr = val;
    }
    if let Some(val) = lookup("DUCTLINE_DATABASE_PATH") {
        config.server.database_path = Some(PathBuf::from(val));
    }
    if let Some(val) = lookup("DUCTLINE_PUBLIC_BASE_URL") {
        config.server.public_base_url = val;
    }
    if let Some(val) = lookup("DUCTLINE_BASELINE_POSITION") {
        if let Ok(n) = val.parse() {
            config.waitlist.baseline_position = n;
        }
    }
    if let Some(val) = lookup("DUCTLINE_PAYPAL_BASE_URL") {
        config.payments.base_url = val;
    }
    if let Some(val) = lookup("DUCTLINE_PAYPAL_CLIENT_ID") {
        config.payments.client_id = val;
    }
    if let Some(val) = lookup("DUCTLINE_PAYPAL_CLIENT_SECRET") {
        config.payments.client_secret = val;
    }
    if let Some(val) = lookup("DUCTLINE_JWT_SECRET") {
        config.auth.jwt_secret = val;
    }
    if let Some(val) = lookup("DUCTLINE_ADMIN_EMAILS") {
        config.auth.admin_emails = val
            .split(',')
            .map(|e| e.trim().to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
    }
}
