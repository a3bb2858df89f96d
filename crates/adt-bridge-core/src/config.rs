// crates/adt-bridge-core/src/config.rs
// ============================================================================
// Module: Connection Configuration
// Description: Immutable per-instance connection record for one SAP system.
// Purpose: Carry endpoint, credentials, and the embedded safety policy.
// Dependencies: serde, url
// ============================================================================

//! ## Overview
//! A [`Config`] is built once and never mutated afterwards. Builder methods
//! consume and return the value so construction reads as a chain; the
//! password is redacted from debug output.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::policy::SafetyPolicy;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default request timeout for repository operations.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Dedicated timeout ceiling for debugger long-poll requests.
pub const DEBUG_LISTENER_TIMEOUT: Duration = Duration::from_secs(300);

/// Default logon language sent as `sap-language`.
pub const DEFAULT_LANGUAGE: &str = "EN";

// ============================================================================
// SECTION: Config
// ============================================================================

/// Immutable connection configuration for one SAP system.
///
/// # Invariants
/// - `base_url` has no trailing slash.
/// - `cookies` seed the transport jar before the first request.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    /// Base URL of the SAP system (scheme, host, port).
    pub base_url: String,
    /// Logon user.
    pub username: String,
    /// Logon password or empty when cookies carry the session.
    pub password: String,
    /// SAP client code sent as `sap-client` (empty means server default).
    #[serde(default)]
    pub sap_client: String,
    /// Logon language sent as `sap-language`.
    #[serde(default = "default_language")]
    pub language: String,
    /// Accept invalid TLS certificates (test systems only).
    #[serde(default)]
    pub accept_invalid_certs: bool,
    /// Cookie overrides seeded into the transport jar.
    #[serde(default)]
    pub cookies: BTreeMap<String, String>,
    /// Request timeout for repository operations.
    #[serde(default = "default_timeout", with = "duration_secs")]
    pub timeout: Duration,
    /// Embedded safety policy consulted before every operation.
    #[serde(default)]
    pub safety: SafetyPolicy,
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

const fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

/// Serde adapter storing durations as whole seconds.
mod duration_secs {
    use std::time::Duration;

    use serde::Deserialize;
    use serde::Deserializer;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

impl Config {
    /// Creates a configuration with defaults for client, language, and policy.
    #[must_use]
    pub fn new(base_url: &str, username: &str, password: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            username: username.to_string(),
            password: password.to_string(),
            sap_client: String::new(),
            language: default_language(),
            accept_invalid_certs: false,
            cookies: BTreeMap::new(),
            timeout: DEFAULT_TIMEOUT,
            safety: SafetyPolicy::default(),
        }
    }

    /// Sets the SAP client code.
    #[must_use]
    pub fn with_sap_client(mut self, client: &str) -> Self {
        self.sap_client = client.to_string();
        self
    }

    /// Sets the logon language.
    #[must_use]
    pub fn with_language(mut self, language: &str) -> Self {
        self.language = language.to_ascii_uppercase();
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Accepts invalid TLS certificates (test systems only).
    #[must_use]
    pub const fn with_accept_invalid_certs(mut self) -> Self {
        self.accept_invalid_certs = true;
        self
    }

    /// Seeds cookie overrides into the transport jar.
    #[must_use]
    pub fn with_cookies<I, K, V>(mut self, cookies: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.cookies =
            cookies.into_iter().map(|(key, value)| (key.into(), value.into())).collect();
        self
    }

    /// Embeds the safety policy.
    #[must_use]
    pub fn with_safety(mut self, safety: SafetyPolicy) -> Self {
        self.safety = safety;
        self
    }

    /// Validates the base URL shape.
    ///
    /// # Errors
    ///
    /// Returns the parse failure message when the base URL is not an
    /// absolute `http`/`https` URL.
    pub fn validate(&self) -> Result<(), String> {
        let url = Url::parse(&self.base_url).map_err(|err| err.to_string())?;
        match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(format!("unsupported base url scheme: {scheme}")),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("sap_client", &self.sap_client)
            .field("language", &self.language)
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .field("cookies", &self.cookies.keys().collect::<Vec<_>>())
            .field("timeout", &self.timeout)
            .field("safety", &self.safety)
            .finish()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions favor direct unwrap/expect for clarity."
    )]

    use super::*;
    use crate::policy::SafetyMode;

    /// Tests that the base URL is stored without a trailing slash.
    #[test]
    fn base_url_drops_trailing_slash() {
        let config = Config::new("https://sap.example.com:44300/", "user", "pass");
        assert_eq!(config.base_url, "https://sap.example.com:44300");
    }

    /// Tests builder chaining for client and language.
    #[test]
    fn builders_chain() {
        let config = Config::new("https://sap.example.com", "user", "pass")
            .with_sap_client("100")
            .with_language("de")
            .with_safety(SafetyPolicy::new(SafetyMode::DevOnly));
        assert_eq!(config.sap_client, "100");
        assert_eq!(config.language, "DE");
        assert_eq!(config.safety.mode, SafetyMode::DevOnly);
    }

    /// Tests that validation rejects non-http schemes.
    #[test]
    fn validate_rejects_non_http_schemes() {
        let config = Config::new("ftp://sap.example.com", "user", "pass");
        assert!(config.validate().is_err());
        let config = Config::new("https://sap.example.com", "user", "pass");
        assert!(config.validate().is_ok());
    }

    /// Tests that debug output never contains the password.
    #[test]
    fn debug_redacts_password() {
        let config = Config::new("https://sap.example.com", "user", "hunter2");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
    }
}
