// Transport: the single HTTP round trip every API call goes through. It is
// a trait so the clients can run against the in-memory fake in tests.

use crate::config::ClientSettings;
use crate::error::{FeishuError, Result};
use reqwest::blocking::{multipart, Client, RequestBuilder};
use reqwest::header::{HeaderValue, AUTHORIZATION};
use serde_json::Value;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

/// A file plus text fields sent as multipart/form-data.
#[derive(Debug, Clone, PartialEq)]
pub struct MultipartUpload {
    pub fields: Vec<(String, String)>,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Multipart(MultipartUpload),
}

/// One request against the open platform, relative to the base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub bearer: Option<String>,
    pub body: RequestBody,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        ApiRequest {
            method,
            path: path.into(),
            query: Vec::new(),
            bearer: None,
            body: RequestBody::Empty,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::Patch, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn multipart(mut self, upload: MultipartUpload) -> Self {
        self.body = RequestBody::Multipart(upload);
        self
    }

    pub fn bearer(mut self, token: &str) -> Self {
        self.bearer = Some(token.to_string());
        self
    }

    /// Query value by key, if present.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn json_body(&self) -> Option<&Value> {
        match &self.body {
            RequestBody::Json(v) => Some(v),
            _ => None,
        }
    }
}

/// Raw status and body text. Envelope parsing happens one layer up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

pub trait Transport {
    fn execute(&self, request: &ApiRequest) -> Result<ApiResponse>;
}

/// Blocking reqwest transport with a request timeout and optional retry of
/// network failures.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
    max_retries: u32,
    retry_backoff: Duration,
}

impl HttpTransport {
    pub fn new(settings: &ClientSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(HttpTransport {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            max_retries: settings.max_retries,
            retry_backoff: Duration::from_millis(settings.retry_backoff_ms),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build(&self, request: &ApiRequest) -> Result<RequestBuilder> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut req = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Patch => self.client.patch(&url),
            Method::Delete => self.client.delete(&url),
        };
        if !request.query.is_empty() {
            req = req.query(&request.query);
        }
        if let Some(token) = &request.bearer {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| FeishuError::Invalid(format!("bad bearer token: {}", e)))?;
            req = req.header(AUTHORIZATION, value);
        }
        req = match &request.body {
            RequestBody::Empty => req,
            RequestBody::Json(body) => req.json(body),
            RequestBody::Multipart(upload) => {
                let mut form = multipart::Form::new();
                for (name, value) in &upload.fields {
                    form = form.text(name.clone(), value.clone());
                }
                let part = multipart::Part::bytes(upload.bytes.clone())
                    .file_name(upload.file_name.clone());
                req.multipart(form.part("file", part))
            }
        };
        Ok(req)
    }

    fn send_once(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let res = self.build(request)?.send()?;
        let status = res.status().as_u16();
        let body = res.text()?;
        Ok(ApiResponse { status, body })
    }
}

impl Transport for HttpTransport {
    fn execute(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let mut attempt = 0;
        loop {
            debug!("{} {}", request.method.as_str(), request.path);
            match self.send_once(request) {
                Err(FeishuError::Transport(e)) if attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        "{} {} failed ({}), retry {}/{}",
                        request.method.as_str(),
                        request.path,
                        e,
                        attempt,
                        self.max_retries
                    );
                    thread::sleep(self.retry_backoff * attempt);
                }
                other => return other,
            }
        }
    }
}
