// API client module: a small blocking client for the Feishu open platform.
// Every call is token fetch -> request -> envelope check; the resource
// specific calls live in the `docx`, `drive` and `wiki` submodules as extra
// `impl` blocks on `FeishuClient`.

pub mod auth;
pub mod docx;
pub mod drive;
#[cfg(test)]
pub mod fake;
pub mod transport;
pub mod wiki;

use crate::config::{Config, Credentials};
use crate::error::{FeishuError, Result};
use auth::TokenProvider;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};
use transport::{ApiRequest, ApiResponse, HttpTransport, Transport};

/// The `{code, msg, data}` envelope every endpoint answers with. The token
/// endpoint puts its payload at the top level instead of under `data`.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub tenant_access_token: Option<String>,
    #[serde(default)]
    pub expire: Option<u64>,
}

impl Envelope {
    /// Parse a raw response. `204 No Content` and empty bodies count as a
    /// successful envelope with no data.
    pub fn parse(response: &ApiResponse) -> Result<Envelope> {
        if response.status == 204 || response.body.trim().is_empty() {
            if response.status >= 400 {
                return Err(FeishuError::Decode(format!(
                    "HTTP {} with empty body",
                    response.status
                )));
            }
            return Ok(Envelope {
                code: 0,
                msg: String::new(),
                data: Value::Null,
                tenant_access_token: None,
                expire: None,
            });
        }
        serde_json::from_str(&response.body).map_err(|e| {
            FeishuError::Decode(format!("HTTP {}: {} ({})", response.status, e, snippet(&response.body)))
        })
    }

    pub fn check(&self) -> Result<()> {
        if self.code != 0 {
            warn!("api returned code {}: {}", self.code, self.msg);
            return Err(FeishuError::Api {
                code: self.code,
                msg: self.msg.clone(),
            });
        }
        Ok(())
    }
}

fn snippet(body: &str) -> String {
    body.chars().take(120).collect()
}

// Codes the platform answers with when the bearer token itself is bad.
const TOKEN_REJECTED: [i64; 3] = [99991663, 99991668, 99991677];

/// Client for the open platform, generic over the transport so tests can
/// swap in the in-memory fake.
pub struct FeishuClient<T: Transport = HttpTransport> {
    transport: T,
    tokens: TokenProvider,
    default_folder_token: Option<String>,
}

impl FeishuClient<HttpTransport> {
    /// Build a client from configuration. Fails when credentials are missing.
    pub fn from_config(config: &Config) -> Result<Self> {
        let credentials = config.credentials()?;
        let settings = config.client_settings()?;
        let transport = HttpTransport::new(&settings)?;
        Ok(FeishuClient::new(transport, credentials, settings.cache_token)
            .with_default_folder(config.default_folder_token()))
    }
}

impl<T: Transport> FeishuClient<T> {
    pub fn new(transport: T, credentials: Credentials, cache_token: bool) -> Self {
        FeishuClient {
            transport,
            tokens: TokenProvider::new(credentials, cache_token),
            default_folder_token: None,
        }
    }

    pub fn with_default_folder(mut self, folder_token: Option<String>) -> Self {
        self.default_folder_token = folder_token;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub(crate) fn default_folder_token(&self) -> Option<&str> {
        self.default_folder_token.as_deref()
    }

    /// Authenticated call returning the envelope's `data`. A failed token
    /// fetch returns before the request itself is sent. A rejected token is
    /// dropped from the cache so the next call fetches a new one.
    pub fn call(&self, request: ApiRequest) -> Result<Value> {
        let token = self.tokens.token(&self.transport)?;
        let request = request.bearer(&token);
        let response = self.transport.execute(&request)?;
        let envelope = Envelope::parse(&response)?;
        if TOKEN_REJECTED.contains(&envelope.code) {
            info!("access token rejected, dropping cached token");
            self.tokens.invalidate();
        }
        envelope.check()?;
        Ok(envelope.data)
    }
}

/// Reads a required string field out of a response object.
pub(crate) fn str_field(value: &Value, key: &str) -> Result<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| FeishuError::Decode(format!("response missing '{}'", key)))
}

pub(crate) fn opt_str(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}
