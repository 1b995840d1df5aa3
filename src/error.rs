use thiserror::Error;

/// Every way a call against the open platform can fail.
///
/// The CLI collapses all of these into a single "operation failed" message;
/// the variants exist so library callers can tell them apart.
#[derive(Error, Debug)]
pub enum FeishuError {
    #[error("network request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to obtain tenant access token ({code}): {msg}")]
    Auth { code: i64, msg: String },

    #[error("api error {code}: {msg}")]
    Api { code: i64, msg: String },

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid request: {0}")]
    Invalid(String),
}

impl From<serde_json::Error> for FeishuError {
    fn from(err: serde_json::Error) -> Self {
        FeishuError::Decode(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FeishuError>;
