//! Bearer tokens for Resource Manager requests.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::debug;

use super::client::ClientError;
use crate::config::Credentials;

/// Tokens are refreshed this long before they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(120);

/// Fallback lifetime when the token response omits `expires_in`.
const DEFAULT_LIFETIME: Duration = Duration::from_secs(3600);

struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Supplies bearer tokens, caching client-credentials tokens until
/// shortly before they expire.
pub(crate) struct TokenSource {
    credentials: Credentials,
    authority: String,
    resource: String,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenSource {
    pub(crate) fn new(credentials: Credentials, authority: String, resource: String) -> Self {
        Self {
            credentials,
            authority,
            resource,
            cached: Mutex::new(None),
        }
    }

    /// Return a valid token, fetching a new one if needed. Blocking.
    pub(crate) fn token(&self, agent: &ureq::Agent) -> Result<String, ClientError> {
        let (tenant_id, client_id, client_secret) = match &self.credentials {
            Credentials::AccessToken(token) => return Ok(token.clone()),
            Credentials::ClientSecret {
                tenant_id,
                client_id,
                client_secret,
            } => (tenant_id, client_id, client_secret),
        };

        let mut cached = self.cached.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(token) = cached.as_ref() {
            if Instant::now() + EXPIRY_MARGIN < token.expires_at {
                return Ok(token.token.clone());
            }
        }

        debug!(tenant_id = %tenant_id, client_id = %client_id, "Requesting access token");
        let url = format!("{}/{}/oauth2/token", self.authority, tenant_id);
        let mut response = agent
            .post(&url)
            .send_form([
                ("grant_type", "client_credentials"),
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
                ("resource", self.resource.as_str()),
            ])
            .map_err(|e| ClientError::Auth(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| ClientError::Auth(e.to_string()))?;
        if !(200..300).contains(&status) {
            return Err(ClientError::Auth(format!(
                "token endpoint returned HTTP {}: {}",
                status, body
            )));
        }

        let (token, lifetime) = parse_token_response(&body)?;
        *cached = Some(CachedToken {
            token: token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Ok(token)
    }
}

/// Extract `access_token` and its lifetime. Azure AD v1 encodes
/// `expires_in` as a string.
fn parse_token_response(body: &str) -> Result<(String, Duration), ClientError> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| ClientError::Auth(format!("invalid token response: {}", e)))?;

    let token = value
        .get("access_token")
        .and_then(Value::as_str)
        .ok_or_else(|| ClientError::Auth("token response has no access_token".to_string()))?
        .to_string();

    let lifetime = match value.get("expires_in") {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    }
    .map(Duration::from_secs)
    .unwrap_or(DEFAULT_LIFETIME);

    Ok((token, lifetime))
}
