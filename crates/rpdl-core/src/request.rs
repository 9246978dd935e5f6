//! Fetch request parameters supplied by the orchestrator.
//!
//! A `FetchRequest` is validated once at construction and never changes
//! afterwards; the session only ever reads it.

use thiserror::Error;

/// Rejected request parameters. Raised before any sandbox or network work.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("unsupported URL scheme {0:?} (expected http or https)")]
    UnsupportedScheme(String),
    #[error("user agent must not be empty")]
    EmptyUserAgent,
    #[error("maximum size must be greater than zero")]
    ZeroMaxSize,
}

/// One anonymous GET to perform inside the sandbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    url: String,
    user_agent: String,
    max_size: u64,
}

impl FetchRequest {
    /// Validates and builds a request.
    ///
    /// Only `http` and `https` URLs are accepted; `max_size` is a hard byte
    /// ceiling and must be positive.
    pub fn new(
        url: impl Into<String>,
        user_agent: impl Into<String>,
        max_size: u64,
    ) -> Result<Self, RequestError> {
        let url = url.into();
        let user_agent = user_agent.into();

        let parsed = url::Url::parse(&url).map_err(|e| RequestError::InvalidUrl {
            url: url.clone(),
            reason: e.to_string(),
        })?;
        match parsed.scheme() {
            "http" | "https" => {}
            other => return Err(RequestError::UnsupportedScheme(other.to_string())),
        }
        if user_agent.trim().is_empty() {
            return Err(RequestError::EmptyUserAgent);
        }
        if max_size == 0 {
            return Err(RequestError::ZeroMaxSize);
        }

        Ok(Self {
            url,
            user_agent,
            max_size,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Hard ceiling on the payload size in bytes.
    pub fn max_size(&self) -> u64 {
        self.max_size
    }
}
