//! JSON-over-HTTP(S) request executor for the GitLab API
//!
//! Every call builds its own transport (proxy, TLS trust) and drops it on
//! return, so no connection outlives a single request.

use glrunner_core::{ApiError, Config, ConnectTarget, RequestOptions, RunnerError};
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Method, Url};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const JSON_MIME: &str = "application/json";

/// Per-call transport settings: proxy routing, TLS trust and timeouts.
#[derive(Debug, Clone)]
pub struct TransportOptions {
    /// HTTP proxy URL; `None` means a direct connection.
    pub proxy: Option<String>,
    /// PEM bundle used as the only trusted roots for `https` endpoints.
    pub ca_file: Option<PathBuf>,
    /// Disable TLS peer verification. Takes precedence over `ca_file`.
    pub insecure: bool,
    pub connect_timeout: Duration,
    pub timeout: Duration,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            proxy: None,
            ca_file: None,
            insecure: false,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl TransportOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            proxy: config.transport.proxy.clone(),
            ca_file: config.transport.ca_file.clone(),
            insecure: config.transport.ssl_insecure,
            connect_timeout: config.connect_timeout(),
            timeout: config.timeout(),
        }
    }

    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    pub fn with_ca_file(mut self, ca_file: impl Into<PathBuf>) -> Self {
        self.ca_file = Some(ca_file.into());
        self
    }

    pub fn insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The configured CA file, if one was given and it is missing on disk.
    pub fn missing_ca_file(&self) -> Option<&Path> {
        self.ca_file.as_deref().filter(|path| !path.exists())
    }
}

/// Unvalidated response: status plus raw body text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub reason: String,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn a non-2xx response into an `ApiError`.
    pub fn validate(self) -> Result<Self, RunnerError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ApiError::new(self.status, self.reason, self.body).into())
        }
    }
}

/// Proxy host and port taken from a proxy URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyAddress {
    pub host: String,
    pub port: u16,
}

impl ProxyAddress {
    pub fn parse(proxy: &str) -> Result<Self, RunnerError> {
        let invalid = |reason: String| RunnerError::InvalidProxy {
            url: proxy.to_string(),
            reason,
        };

        let parsed = Url::parse(proxy).map_err(|e| invalid(e.to_string()))?;
        let host = match parsed.host_str() {
            Some(host) if !host.is_empty() => host.to_string(),
            _ => return Err(invalid("missing host".to_string())),
        };
        let port = parsed
            .port_or_known_default()
            .ok_or_else(|| invalid("missing port".to_string()))?;

        Ok(Self { host, port })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn url(&self) -> String {
        format!("http://{}", self.address())
    }
}

/// Executes one JSON request per call against the GitLab API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    user_agent: String,
}

impl Default for ApiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ApiClient {
    pub fn new() -> Self {
        Self {
            user_agent: format!("glrunner/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// POST `body` and return the parsed JSON response.
    pub fn post(
        &self,
        url: &str,
        body: &RequestOptions,
        transport: &TransportOptions,
    ) -> Result<Value, RunnerError> {
        let response = self.request(Method::POST, url, body, transport)?.validate()?;
        serde_json::from_str(&response.body)
            .map_err(|e| RunnerError::Decode(format!("invalid JSON body: {}", e)))
    }

    /// DELETE with `body`. GitLab sends no body back, so success is `{}`.
    pub fn delete(
        &self,
        url: &str,
        body: &RequestOptions,
        transport: &TransportOptions,
    ) -> Result<Value, RunnerError> {
        self.request(Method::DELETE, url, body, transport)?.validate()?;
        Ok(Value::Object(Map::new()))
    }

    /// Send one request and return the response without judging its status.
    pub fn request(
        &self,
        method: Method,
        url: &str,
        body: &RequestOptions,
        transport: &TransportOptions,
    ) -> Result<RawResponse, RunnerError> {
        let endpoint = parse_endpoint(url)?;
        let proxy = transport
            .proxy
            .as_deref()
            .map(ProxyAddress::parse)
            .transpose()?;

        let endpoint_addr = host_port(&endpoint);
        let connect_target = match &proxy {
            Some(proxy) => ConnectTarget::Proxy(proxy.address()),
            None => ConnectTarget::Direct(endpoint_addr.clone()),
        };

        let client = self.build_client(&endpoint, proxy.as_ref(), transport)?;
        let payload = body.to_json()?;

        debug!(
            method = %method,
            url = %endpoint,
            via = %connect_target,
            "sending GitLab API request"
        );

        let response = client
            .request(method, endpoint)
            .header(ACCEPT, JSON_MIME)
            .header(CONTENT_TYPE, JSON_MIME)
            .body(payload)
            .send()
            .map_err(|e| classify_error(e, &connect_target, &endpoint_addr))?;

        let status = response.status();
        let reason = reason_phrase(&response);
        let body = response
            .text()
            .map_err(|e| classify_error(e, &connect_target, &endpoint_addr))?;

        debug!(status = status.as_u16(), "GitLab API response received");

        Ok(RawResponse {
            status: status.as_u16(),
            reason,
            body,
        })
    }

    fn build_client(
        &self,
        endpoint: &Url,
        proxy: Option<&ProxyAddress>,
        transport: &TransportOptions,
    ) -> Result<Client, RunnerError> {
        let mut builder = Client::builder()
            .use_rustls_tls()
            .user_agent(self.user_agent.as_str())
            .connect_timeout(transport.connect_timeout)
            .timeout(transport.timeout)
            .pool_max_idle_per_host(0);

        builder = match proxy {
            Some(proxy) => {
                let proxy = reqwest::Proxy::all(proxy.url()).map_err(|e| {
                    RunnerError::InvalidProxy {
                        url: proxy.url(),
                        reason: e.to_string(),
                    }
                })?;
                builder.proxy(proxy)
            }
            None => builder.no_proxy(),
        };

        if endpoint.scheme() == "https" {
            // Insecure mode wins; a CA file given alongside it is loaded but inert.
            builder = builder.danger_accept_invalid_certs(transport.insecure);
            if let Some(certs) = custom_roots(transport)? {
                builder = builder.tls_built_in_root_certs(false);
                for cert in certs {
                    builder = builder.add_root_certificate(cert);
                }
            }
        }

        builder.build().map_err(|e| RunnerError::Transport {
            message: e.to_string(),
            source: Box::new(e),
        })
    }
}

fn parse_endpoint(url: &str) -> Result<Url, RunnerError> {
    let invalid = |reason: String| RunnerError::InvalidEndpoint {
        url: url.to_string(),
        reason,
    };

    let parsed = Url::parse(url).map_err(|e| invalid(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(format!("unsupported scheme '{}'", other))),
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host".to_string()));
    }
    Ok(parsed)
}

fn host_port(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port_or_known_default() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

/// The server's own reason phrase, or the canonical one for the status.
///
/// hyper only records the phrase when it differs from the canonical text.
fn reason_phrase(response: &reqwest::blocking::Response) -> String {
    response
        .extensions()
        .get::<hyper::ext::ReasonPhrase>()
        .map(|phrase| String::from_utf8_lossy(phrase.as_bytes()).trim().to_string())
        .filter(|phrase| !phrase.is_empty())
        .or_else(|| response.status().canonical_reason().map(str::to_string))
        .unwrap_or_default()
}

/// Roots replacing the built-in trust store, when a CA file is configured.
fn custom_roots(
    transport: &TransportOptions,
) -> Result<Option<Vec<reqwest::Certificate>>, RunnerError> {
    transport
        .ca_file
        .as_deref()
        .filter(|path| !path.as_os_str().is_empty())
        .map(load_ca_file)
        .transpose()
}

fn load_ca_file(path: &Path) -> Result<Vec<reqwest::Certificate>, RunnerError> {
    let tls_config = |reason: String| RunnerError::TlsConfig {
        path: path.to_path_buf(),
        reason,
    };

    let pem = std::fs::read(path).map_err(|e| tls_config(e.to_string()))?;
    let certs = reqwest::Certificate::from_pem_bundle(&pem).map_err(|e| tls_config(e.to_string()))?;
    if certs.is_empty() {
        return Err(tls_config("no PEM certificates found".to_string()));
    }
    Ok(certs)
}

/// Sort a transport failure into connect / TLS / other.
///
/// TLS handshake failures surface as connect errors too, so they are told
/// apart by the `InvalidData` I/O error rustls reports them through.
fn classify_error(err: reqwest::Error, target: &ConnectTarget, endpoint_addr: &str) -> RunnerError {
    if err.is_connect() {
        if is_tls_failure(&err) {
            return RunnerError::Tls {
                address: endpoint_addr.to_string(),
                message: error_chain(&err),
            };
        }
        return RunnerError::ConnectTimeout {
            target: target.clone(),
            source: Box::new(err),
        };
    }

    RunnerError::Transport {
        message: error_chain(&err),
        source: Box::new(err),
    }
}

fn is_tls_failure(err: &reqwest::Error) -> bool {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = current {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::InvalidData {
                return true;
            }
        }
        let text = e.to_string();
        if text.contains("invalid peer certificate") || text.contains("certificate verify failed")
        {
            return true;
        }
        current = e.source();
    }
    false
}

fn error_chain(err: &reqwest::Error) -> String {
    let mut parts = vec![err.to_string()];
    let mut current = std::error::Error::source(err);
    while let Some(e) = current {
        let text = e.to_string();
        if parts.last() != Some(&text) {
            parts.push(text);
        }
        current = e.source();
    }
    parts.join(": ")
}
