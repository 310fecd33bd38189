//! Runner registration data model

use crate::RunnerError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Resource collection path appended to every GitLab base URL.
const RUNNERS_PATH: &str = "/api/v4/runners";

/// Build the runner-collection URL for a GitLab base address.
pub fn runners_url(endpoint: &str) -> String {
    format!("{}{}", endpoint.trim_end_matches('/'), RUNNERS_PATH)
}

/// Opaque runner authentication token.
///
/// The core never persists it; ownership belongs to whoever called `register`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunnerCredential(String);

impl RunnerCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for RunnerCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RunnerCredential(<redacted>)")
    }
}

impl From<String> for RunnerCredential {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl From<&str> for RunnerCredential {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}

/// JSON request body: an ordered map of option names to values.
///
/// Shared by register and unregister so both serialize the same way.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestOptions(Map<String, Value>);

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Body for `POST /runners`, carrying the registration token.
    pub fn registration(registration_token: impl Into<String>) -> Self {
        let token: String = registration_token.into();
        Self::new().with("token", token)
    }

    /// Body for `DELETE /runners`: exactly `{"token": <credential>}`.
    pub fn credential(credential: &RunnerCredential) -> Self {
        Self::new().with("token", credential.as_str())
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Merge extra attributes underneath the ones already set.
    ///
    /// Keys already present (notably `token`) are never overwritten.
    pub fn merge(mut self, extra: RequestOptions) -> Self {
        for (key, value) in extra.0 {
            self.0.entry(key).or_insert(value);
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_json(&self) -> Result<Vec<u8>, RunnerError> {
        Ok(serde_json::to_vec(&self.0)?)
    }
}

impl From<Map<String, Value>> for RequestOptions {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Runner created by `POST /api/v4/runners`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub token: RunnerCredential,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_expires_at: Option<String>,
}

impl Registration {
    /// Extract the registration from a successful response body.
    pub fn from_json(value: Value) -> Result<Self, RunnerError> {
        match value.get("token") {
            Some(Value::String(_)) => {}
            _ => {
                return Err(RunnerError::Decode(
                    "registration response has no runner token".to_string(),
                ))
            }
        }
        serde_json::from_value(value).map_err(|e| RunnerError::Decode(e.to_string()))
    }
}
