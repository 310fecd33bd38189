//! Error types for runner registration

use std::fmt;
use std::path::PathBuf;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Where a connection attempt was headed when it failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectTarget {
    /// The configured HTTP proxy, as `host:port`
    Proxy(String),
    /// The API endpoint itself, as `host:port`
    Direct(String),
}

impl ConnectTarget {
    pub fn address(&self) -> &str {
        match self {
            ConnectTarget::Proxy(addr) | ConnectTarget::Direct(addr) => addr,
        }
    }

    pub fn is_proxy(&self) -> bool {
        matches!(self, ConnectTarget::Proxy(_))
    }
}

impl fmt::Display for ConnectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectTarget::Proxy(addr) => write!(f, "proxy {}", addr),
            ConnectTarget::Direct(addr) => f.write_str(addr),
        }
    }
}

/// A non-2xx answer from the GitLab API.
///
/// Keeps the raw response pieces so callers can tell "already gone" apart
/// from real failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: u16,
    pub reason: String,
    pub body: String,
}

impl ApiError {
    pub fn new(status: u16, reason: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason.into(),
            body: body.into(),
        }
    }

    /// True when the runner most likely no longer exists server-side.
    ///
    /// GitLab answers `DELETE /runners` with 403 for a token it does not know.
    pub fn is_gone(&self) -> bool {
        matches!(self.status, 403 | 404 | 410)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.reason.is_empty() {
            write!(f, "HTTP {}", self.status)
        } else {
            write!(f, "{} {}", self.status, self.reason)
        }
    }
}

impl std::error::Error for ApiError {}

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("Invalid endpoint URL '{url}': {reason}")]
    InvalidEndpoint { url: String, reason: String },

    #[error("Invalid proxy URL '{url}': {reason}")]
    InvalidProxy { url: String, reason: String },

    #[error("Timeout connecting to {target} when trying to register/unregister gitlab runner")]
    ConnectTimeout {
        target: ConnectTarget,
        #[source]
        source: BoxError,
    },

    #[error("TLS error talking to {address}: {message}")]
    Tls { address: String, message: String },

    #[error("Unable to use CA file {}: {reason}", .path.display())]
    TlsConfig { path: PathBuf, reason: String },

    #[error("GitLab API error: {0}")]
    Api(#[from] ApiError),

    #[error("Unexpected response from GitLab: {0}")]
    Decode(String),

    #[error("HTTP transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: BoxError,
    },

    #[error("Invalid runner name '{0}'")]
    InvalidRunnerName(String),

    #[error("Gitlab runner failed to register: {0}")]
    RegistrationFailed(ApiError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RunnerError {
    /// Stable machine-readable code, used for JSON error output.
    pub fn code(&self) -> &'static str {
        match self {
            RunnerError::InvalidEndpoint { .. } => "invalid_endpoint",
            RunnerError::InvalidProxy { .. } => "invalid_proxy",
            RunnerError::ConnectTimeout { .. } => "connect_timeout",
            RunnerError::Tls { .. } => "tls_error",
            RunnerError::TlsConfig { .. } => "tls_config_error",
            RunnerError::Api(_) => "api_error",
            RunnerError::Decode(_) => "decode_error",
            RunnerError::Transport { .. } => "transport_error",
            RunnerError::InvalidRunnerName(_) => "invalid_runner_name",
            RunnerError::RegistrationFailed(_) => "registration_failed",
            RunnerError::Io(_) => "io_error",
            RunnerError::ConfigParse(_) => "config_parse_error",
            RunnerError::Serialization(_) => "serialization_error",
        }
    }

    /// The API error carried by this error, if any.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            RunnerError::Api(err) | RunnerError::RegistrationFailed(err) => Some(err),
            _ => None,
        }
    }
}
