//! Credential handling for LLM providers.
//!
//! API keys are wrapped in [`SecretString`] as soon as they are read, so they
//! cannot appear in `Debug`/`Display` output or in error messages.
//!
//! ## Usage
//!
//! ```ignore
//! use crate::providers::secrets::ApiCredential;
//!
//! // Config first, then the first environment variable that is set
//! let cred = ApiCredential::from_config_or_env(
//!     &config,
//!     "api_key",
//!     &["HUGGINGFACE_API_KEY", "HF_TOKEN"],
//!     "HuggingFace API key",
//! )?;
//!
//! // Explicit exposure at the point of use
//! request.bearer_auth(cred.expose());
//! ```

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value as JsonValue;
use std::fmt;

use super::ProviderError;

/// Where a credential was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Loaded from configuration file/JSON
    Config,
    /// Loaded from environment variable
    Environment,
    /// Provided programmatically
    Programmatic,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Config => write!(f, "config"),
            CredentialSource::Environment => write!(f, "environment"),
            CredentialSource::Programmatic => write!(f, "programmatic"),
        }
    }
}

/// A securely-stored API credential.
///
/// `Debug` and `Display` show `[REDACTED]`; the value is only reachable
/// through [`ApiCredential::expose`].
pub struct ApiCredential {
    value: SecretString,
    source: CredentialSource,
    name: &'static str,
}

impl ApiCredential {
    pub fn new(value: impl Into<String>, source: CredentialSource, name: &'static str) -> Self {
        Self {
            value: SecretString::from(value.into()),
            source,
            name,
        }
    }

    /// Load from the first of `env_vars` that is set and non-empty.
    pub fn from_env(env_vars: &[&str], name: &'static str) -> Result<Self, ProviderError> {
        first_env(env_vars)
            .map(|v| Self::new(v, CredentialSource::Environment, name))
            .ok_or_else(|| {
                ProviderError::NotConfigured(format!(
                    "{} not set: configure {} environment variable",
                    name,
                    env_vars.join(" or ")
                ))
            })
    }

    /// Load from JSON config, falling back to environment variables.
    pub fn from_config_or_env(
        config: &JsonValue,
        config_key: &str,
        env_vars: &[&str],
        name: &'static str,
    ) -> Result<Self, ProviderError> {
        if let Some(value) = config[config_key].as_str() {
            return Ok(Self::new(value, CredentialSource::Config, name));
        }

        if let Some(value) = first_env(env_vars) {
            return Ok(Self::new(value, CredentialSource::Environment, name));
        }

        Err(ProviderError::NotConfigured(format!(
            "{} required: set '{}' in config or {} environment variable",
            name,
            config_key,
            env_vars.join(" or ")
        )))
    }

    /// Check if a credential is available (without loading it).
    pub fn is_available(config: &JsonValue, config_key: &str, env_vars: &[&str]) -> bool {
        config[config_key].as_str().is_some() || first_env(env_vars).is_some()
    }

    /// Expose the credential value. Call only where it is sent.
    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.value.expose_secret().is_empty()
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

fn first_env(env_vars: &[&str]) -> Option<String> {
    env_vars
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|v| !v.is_empty())
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("value", &"[REDACTED]")
            .field("source", &self.source)
            .field("name", &self.name)
            .finish()
    }
}

impl fmt::Display for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} from {} [REDACTED]", self.name, self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_redacted_in_debug() {
        let cred = ApiCredential::new("gsk-secret-123", CredentialSource::Programmatic, "Groq API key");
        let debug = format!("{:?}", cred);
        assert!(!debug.contains("gsk-secret-123"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_credential_redacted_in_display() {
        let cred = ApiCredential::new("gsk-secret-123", CredentialSource::Config, "Groq API key");
        let display = cred.to_string();
        assert!(!display.contains("gsk-secret-123"));
        assert_eq!(display, "Groq API key from config [REDACTED]");
    }

    #[test]
    fn test_credential_expose() {
        let cred = ApiCredential::new("value", CredentialSource::Programmatic, "key");
        assert_eq!(cred.expose(), "value");
        assert!(!cred.is_empty());
        assert!(ApiCredential::new("", CredentialSource::Programmatic, "key").is_empty());
    }

    #[test]
    fn test_from_config_or_env_prefers_config() {
        std::env::set_var("TMF921_TEST_KEY_PRIORITY", "env-key");
        let config = serde_json::json!({"api_key": "config-key"});
        let cred =
            ApiCredential::from_config_or_env(&config, "api_key", &["TMF921_TEST_KEY_PRIORITY"], "key")
                .unwrap();
        assert_eq!(cred.expose(), "config-key");
        assert_eq!(cred.source(), CredentialSource::Config);
        std::env::remove_var("TMF921_TEST_KEY_PRIORITY");
    }

    #[test]
    fn test_env_fallback_chain() {
        std::env::remove_var("TMF921_TEST_PRIMARY_UNSET");
        std::env::set_var("TMF921_TEST_SECONDARY", "hf-token");
        let cred = ApiCredential::from_config_or_env(
            &serde_json::json!({}),
            "api_key",
            &["TMF921_TEST_PRIMARY_UNSET", "TMF921_TEST_SECONDARY"],
            "HuggingFace API key",
        )
        .unwrap();
        assert_eq!(cred.expose(), "hf-token");
        assert_eq!(cred.source(), CredentialSource::Environment);
        std::env::remove_var("TMF921_TEST_SECONDARY");
    }

    #[test]
    fn test_missing_credential_names_all_variables() {
        let result = ApiCredential::from_env(&["TMF921_TEST_NOPE_A", "TMF921_TEST_NOPE_B"], "key");
        match result {
            Err(ProviderError::NotConfigured(message)) => {
                assert!(message.contains("TMF921_TEST_NOPE_A or TMF921_TEST_NOPE_B"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_is_available() {
        let config = serde_json::json!({"api_key": "x"});
        assert!(ApiCredential::is_available(&config, "api_key", &[]));
        assert!(!ApiCredential::is_available(&serde_json::json!({}), "api_key", &["TMF921_TEST_NOPE_C"]));
    }
}
