// Tenant access token acquisition.

use super::transport::{ApiRequest, Transport};
use super::Envelope;
use crate::config::Credentials;
use crate::error::{FeishuError, Result};
use serde_json::json;
use std::cell::RefCell;
use std::time::{Duration, Instant};
use tracing::{debug, info};

pub const TOKEN_PATH: &str = "/open-apis/auth/v3/tenant_access_token/internal";

// Refresh a cached token this long before the server says it expires.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Exchange app credentials for a tenant access token.
pub fn fetch_tenant_token<T: Transport>(transport: &T, creds: &Credentials) -> Result<(String, u64)> {
    let request = ApiRequest::post(TOKEN_PATH).json(json!({
        "app_id": creds.app_id,
        "app_secret": creds.app_secret,
    }));
    let response = transport.execute(&request)?;
    let envelope = Envelope::parse(&response)?;
    envelope.check().map_err(|e| match e {
        FeishuError::Api { code, msg } => FeishuError::Auth { code, msg },
        other => other,
    })?;
    let token = envelope
        .tenant_access_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| FeishuError::Decode("token response without tenant_access_token".into()))?;
    Ok((token, envelope.expire.unwrap_or(0)))
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Hands out bearer tokens. Without caching every call fetches a fresh
/// token; with caching a token is reused until shortly before it expires.
pub struct TokenProvider {
    credentials: Credentials,
    cache_enabled: bool,
    cached: RefCell<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn new(credentials: Credentials, cache_enabled: bool) -> Self {
        TokenProvider {
            credentials,
            cache_enabled,
            cached: RefCell::new(None),
        }
    }

    pub fn token<T: Transport>(&self, transport: &T) -> Result<String> {
        if self.cache_enabled {
            if let Some(cached) = self.cached.borrow().as_ref() {
                if Instant::now() < cached.expires_at {
                    debug!("reusing cached tenant token");
                    return Ok(cached.token.clone());
                }
            }
        }

        let (token, expire) = fetch_tenant_token(transport, &self.credentials)?;
        if self.cache_enabled {
            let ttl = Duration::from_secs(expire).saturating_sub(EXPIRY_MARGIN);
            info!("cached tenant token for {}s", ttl.as_secs());
            *self.cached.borrow_mut() = Some(CachedToken {
                token: token.clone(),
                expires_at: Instant::now() + ttl,
            });
        }
        Ok(token)
    }

    /// Drop any cached token.
    pub fn invalidate(&self) {
        self.cached.borrow_mut().take();
    }
}
