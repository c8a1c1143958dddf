//! Provider configuration.
//!
//! The engine sends the provider block as JSON through `Configure`. Any
//! attribute left unset falls back to the matching `ARM_*` environment
//! variable, then to a built-in default.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;

use crate::schema::{Attribute, AttributeFlags, AttributeType, Diagnostic, Schema};

/// Default Resource Manager endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://management.azure.com";

/// Default Azure AD authority for client-credentials tokens.
pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

/// API version of `Microsoft.AnalysisServices` used for all requests.
pub const DEFAULT_API_VERSION: &str = "2017-08-01";

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Raw provider configuration as declared.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Subscription that owns managed resources.
    pub subscription_id: Option<String>,
    /// Pre-acquired bearer token.
    pub access_token: Option<String>,
    /// Azure AD tenant for client-credentials auth.
    pub tenant_id: Option<String>,
    /// Service principal application id.
    pub client_id: Option<String>,
    /// Service principal secret.
    pub client_secret: Option<String>,
    /// Resource Manager endpoint.
    pub endpoint: Option<String>,
    /// Azure AD authority.
    pub authority: Option<String>,
    /// `api-version` query parameter.
    pub api_version: Option<String>,
    /// Seconds between polls of long-running operations.
    pub poll_interval_secs: Option<u64>,
    /// Per-operation deadlines, in seconds.
    pub timeouts: Option<TimeoutsConfig>,
}

/// Per-operation deadlines as declared.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct TimeoutsConfig {
    /// Create deadline.
    pub create: Option<u64>,
    /// Read deadline.
    pub read: Option<u64>,
    /// Update deadline.
    pub update: Option<u64>,
    /// Delete deadline.
    pub delete: Option<u64>,
}

/// Deadlines applied to resource operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct Timeouts {
    pub create: Duration,
    pub read: Duration,
    pub update: Duration,
    pub delete: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            create: Duration::from_secs(30 * 60),
            read: Duration::from_secs(5 * 60),
            update: Duration::from_secs(30 * 60),
            delete: Duration::from_secs(30 * 60),
        }
    }
}

impl Timeouts {
    fn from_config(config: TimeoutsConfig) -> Self {
        let defaults = Self::default();
        Self {
            create: config.create.map(Duration::from_secs).unwrap_or(defaults.create),
            read: config.read.map(Duration::from_secs).unwrap_or(defaults.read),
            update: config.update.map(Duration::from_secs).unwrap_or(defaults.update),
            delete: config.delete.map(Duration::from_secs).unwrap_or(defaults.delete),
        }
    }
}

/// How requests are authenticated.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// A bearer token supplied by the caller.
    AccessToken(String),
    /// OAuth2 client-credentials grant for a service principal.
    #[allow(missing_docs)]
    ClientSecret {
        tenant_id: String,
        client_id: String,
        client_secret: String,
    },
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AccessToken(_) => f.write_str("AccessToken(<redacted>)"),
            Self::ClientSecret {
                tenant_id,
                client_id,
                ..
            } => f
                .debug_struct("ClientSecret")
                .field("tenant_id", tenant_id)
                .field("client_id", client_id)
                .field("client_secret", &"<redacted>")
                .finish(),
        }
    }
}

/// Fully resolved configuration used to build the ARM client.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct ResolvedConfig {
    pub subscription_id: String,
    pub credentials: Credentials,
    pub endpoint: String,
    pub authority: String,
    pub api_version: String,
    pub poll_interval: Duration,
    pub timeouts: Timeouts,
}

impl ProviderConfig {
    /// Decode the configuration sent by the engine. `null` means "all unset".
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value)
    }

    /// Resolve against the process environment.
    pub fn resolve(self) -> Result<ResolvedConfig, Vec<Diagnostic>> {
        self.resolve_with(|key| std::env::var(key).ok())
    }

    /// Resolve using `env` for environment fallbacks.
    pub fn resolve_with<F>(self, env: F) -> Result<ResolvedConfig, Vec<Diagnostic>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |value: Option<String>, key: &str| {
            value
                .filter(|v| !v.is_empty())
                .or_else(|| env(key).filter(|v| !v.is_empty()))
        };

        let mut diagnostics = Vec::new();

        let subscription_id = pick(self.subscription_id, "ARM_SUBSCRIPTION_ID");
        if subscription_id.is_none() {
            diagnostics.push(
                Diagnostic::error("Missing subscription_id")
                    .with_detail("Set subscription_id or the ARM_SUBSCRIPTION_ID environment variable")
                    .with_attribute("subscription_id"),
            );
        }

        let access_token = pick(self.access_token, "ARM_ACCESS_TOKEN");
        let tenant_id = pick(self.tenant_id, "ARM_TENANT_ID");
        let client_id = pick(self.client_id, "ARM_CLIENT_ID");
        let client_secret = pick(self.client_secret, "ARM_CLIENT_SECRET");

        let credentials = match (access_token, tenant_id, client_id, client_secret) {
            (Some(token), _, _, _) => Some(Credentials::AccessToken(token)),
            (None, Some(tenant_id), Some(client_id), Some(client_secret)) => {
                Some(Credentials::ClientSecret {
                    tenant_id,
                    client_id,
                    client_secret,
                })
            }
            (None, tenant_id, client_id, client_secret) => {
                let missing: Vec<&str> = [
                    ("tenant_id", tenant_id.is_none()),
                    ("client_id", client_id.is_none()),
                    ("client_secret", client_secret.is_none()),
                ]
                .iter()
                .filter(|(_, absent)| *absent)
                .map(|(name, _)| *name)
                .collect();
                diagnostics.push(
                    Diagnostic::error("Missing credentials")
                        .with_detail(format!(
                            "Set access_token, or tenant_id, client_id and client_secret (missing: {})",
                            missing.join(", ")
                        )),
                );
                None
            }
        };

        if self.poll_interval_secs == Some(0) {
            diagnostics.push(
                Diagnostic::error("poll_interval_secs must be greater than zero")
                    .with_attribute("poll_interval_secs"),
            );
        }

        match (subscription_id, credentials) {
            (Some(subscription_id), Some(credentials)) if diagnostics.is_empty() => {
                Ok(ResolvedConfig {
                    subscription_id,
                    credentials,
                    endpoint: pick(self.endpoint, "ARM_ENDPOINT")
                        .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
                        .trim_end_matches('/')
                        .to_string(),
                    authority: self
                        .authority
                        .unwrap_or_else(|| DEFAULT_AUTHORITY.to_string())
                        .trim_end_matches('/')
                        .to_string(),
                    api_version: self
                        .api_version
                        .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
                    poll_interval: self
                        .poll_interval_secs
                        .map(Duration::from_secs)
                        .unwrap_or(DEFAULT_POLL_INTERVAL),
                    timeouts: Timeouts::from_config(self.timeouts.unwrap_or_default()),
                })
            }
            _ => Err(diagnostics),
        }
    }
}

/// Schema of the provider block.
pub fn provider_config_schema() -> Schema {
    Schema::v0()
        .with_attribute(
            "subscription_id",
            Attribute::optional_string()
                .with_description("Subscription id. Falls back to ARM_SUBSCRIPTION_ID."),
        )
        .with_attribute(
            "access_token",
            Attribute::optional_string()
                .sensitive()
                .with_description("Bearer token. Falls back to ARM_ACCESS_TOKEN."),
        )
        .with_attribute(
            "tenant_id",
            Attribute::optional_string().with_description("Falls back to ARM_TENANT_ID."),
        )
        .with_attribute(
            "client_id",
            Attribute::optional_string().with_description("Falls back to ARM_CLIENT_ID."),
        )
        .with_attribute(
            "client_secret",
            Attribute::optional_string()
                .sensitive()
                .with_description("Falls back to ARM_CLIENT_SECRET."),
        )
        .with_attribute(
            "endpoint",
            Attribute::optional_string()
                .with_description("Resource Manager endpoint. Falls back to ARM_ENDPOINT."),
        )
        .with_attribute(
            "authority",
            Attribute::optional_string().with_default(serde_json::json!(DEFAULT_AUTHORITY)),
        )
        .with_attribute(
            "api_version",
            Attribute::optional_string().with_default(serde_json::json!(DEFAULT_API_VERSION)),
        )
        .with_attribute(
            "poll_interval_secs",
            Attribute::optional_int64().with_default(serde_json::json!(10)),
        )
        .with_attribute(
            "timeouts",
            Attribute::new(
                AttributeType::map(AttributeType::Int64),
                AttributeFlags::optional(),
            )
            .with_description("Deadlines in seconds keyed by create, read, update, delete."),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_resolve_with_access_token() {
        let config = ProviderConfig::from_value(json!({
            "subscription_id": "sub",
            "access_token": "token",
            "timeouts": {"read": 60}
        }))
        .unwrap();

        let resolved = config.resolve_with(env(&[])).unwrap();
        assert_eq!(resolved.subscription_id, "sub");
        assert_eq!(resolved.credentials, Credentials::AccessToken("token".into()));
        assert_eq!(resolved.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(resolved.api_version, DEFAULT_API_VERSION);
        assert_eq!(resolved.timeouts.read, Duration::from_secs(60));
        assert_eq!(resolved.timeouts.create, Timeouts::default().create);
    }

    #[test]
    fn test_null_attributes_use_defaults() {
        let resolved = ProviderConfig::from_value(json!({
            "subscription_id": "sub",
            "access_token": "token",
            "endpoint": null,
            "poll_interval_secs": null,
            "timeouts": null
        }))
        .unwrap()
        .resolve_with(env(&[]))
        .unwrap();

        assert_eq!(resolved.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(resolved.poll_interval, DEFAULT_POLL_INTERVAL);
        assert_eq!(resolved.timeouts, Timeouts::default());
    }

    #[test]
    fn test_endpoint_schema_leaves_env_fallback_open() {
        let schema = provider_config_schema();
        let endpoint = schema.attribute("endpoint").unwrap();
        assert!(endpoint.default.is_none());
    }

    #[test]
    fn test_resolve_falls_back_to_env() {
        let resolved = ProviderConfig::from_value(serde_json::Value::Null)
            .unwrap()
            .resolve_with(env(&[
                ("ARM_SUBSCRIPTION_ID", "env-sub"),
                ("ARM_TENANT_ID", "tenant"),
                ("ARM_CLIENT_ID", "client"),
                ("ARM_CLIENT_SECRET", "secret"),
                ("ARM_ENDPOINT", "https://management.usgovcloudapi.net/"),
            ]))
            .unwrap();

        assert_eq!(resolved.subscription_id, "env-sub");
        assert!(matches!(resolved.credentials, Credentials::ClientSecret { .. }));
        assert_eq!(resolved.endpoint, "https://management.usgovcloudapi.net");
    }

    #[test]
    fn test_declared_value_wins_over_env() {
        let resolved = ProviderConfig::from_value(json!({
            "subscription_id": "declared",
            "access_token": "token"
        }))
        .unwrap()
        .resolve_with(env(&[("ARM_SUBSCRIPTION_ID", "env-sub")]))
        .unwrap();

        assert_eq!(resolved.subscription_id, "declared");
    }

    #[test]
    fn test_missing_values_produce_diagnostics() {
        let diagnostics = ProviderConfig::from_value(json!({"client_id": "client"}))
            .unwrap()
            .resolve_with(env(&[]))
            .unwrap_err();

        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("subscription_id"));
        let detail = diagnostics[1].detail.as_deref().unwrap_or_default();
        assert!(detail.ends_with("(missing: tenant_id, client_secret)"));
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let diagnostics = ProviderConfig::from_value(json!({
            "subscription_id": "sub",
            "access_token": "token",
            "poll_interval_secs": 0
        }))
        .unwrap()
        .resolve_with(env(&[]))
        .unwrap_err();

        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn test_credentials_debug_is_redacted() {
        let creds = Credentials::ClientSecret {
            tenant_id: "tenant".into(),
            client_id: "client".into(),
            client_secret: "hunter2".into(),
        };
        let rendered = format!("{:?}", creds);
        assert!(rendered.contains("client"));
        assert!(!rendered.contains("hunter2"));

        let rendered = format!("{:?}", Credentials::AccessToken("secret-token".into()));
        assert!(!rendered.contains("secret-token"));
    }
}
