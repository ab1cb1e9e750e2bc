//! Process configuration for the payment provider, the hosted backend and the
//! application server.

use crate::error::{PaymentError, Result};

pub const PRODUCTION_PROVIDER_URL: &str = "https://www.tropipay.com";
pub const DEVELOPMENT_PROVIDER_URL: &str = "https://tropipay-dev.herokuapp.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServerMode {
    Production,
    #[default]
    Development,
}

impl ServerMode {
    /// `production` (any case) selects production; every other environment
    /// name runs against the provider's development sandbox.
    pub fn from_env_name(name: &str) -> Self {
        if name.trim().eq_ignore_ascii_case("production") {
            ServerMode::Production
        } else {
            ServerMode::Development
        }
    }

    pub fn base_url(&self) -> &'static str {
        match self {
            ServerMode::Production => PRODUCTION_PROVIDER_URL,
            ServerMode::Development => DEVELOPMENT_PROVIDER_URL,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProviderConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub mode: ServerMode,
    /// Overrides the mode's base URL.
    pub base_url: Option<String>,
}

impl ProviderConfig {
    /// Both credentials, or a configuration error naming what is missing.
    pub fn credentials(&self) -> Result<(&str, &str)> {
        let client_id = non_empty(&self.client_id);
        let client_secret = non_empty(&self.client_secret);
        match (client_id, client_secret) {
            (Some(id), Some(secret)) => Ok((id, secret)),
            _ => Err(PaymentError::Configuration(
                "missing payment provider credentials (TROPIPAY_CLIENT_ID, TROPIPAY_CLIENT_SECRET)"
                    .to_string(),
            )),
        }
    }

    pub fn api_base(&self) -> &str {
        non_empty(&self.base_url).unwrap_or_else(|| self.mode.base_url())
    }
}

/// Location and public key of the hosted backend.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendConfig {
    pub url: String,
    pub anon_key: String,
}

impl BackendConfig {
    /// `None` when neither value is set; half a configuration is an error.
    pub fn from_parts(url: Option<String>, anon_key: Option<String>) -> Result<Option<Self>> {
        let url = url.filter(|u| !u.trim().is_empty());
        let anon_key = anon_key.filter(|k| !k.trim().is_empty());
        match (url, anon_key) {
            (Some(url), Some(anon_key)) => Ok(Some(Self {
                url: url.trim_end_matches('/').to_string(),
                anon_key,
            })),
            (None, None) => Ok(None),
            _ => Err(PaymentError::Configuration(
                "SUPABASE_URL and SUPABASE_ANON_KEY must be set together".to_string(),
            )),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
