//! Runner lifecycle operations on `/api/v4/runners`

use crate::api_client::{ApiClient, TransportOptions};
use glrunner_core::{
    runners_url, ApiError, Registration, RequestOptions, RunnerCredential, RunnerError,
};
use serde_json::Value;
use tracing::info;

/// How an unregister attempt ended, for callers that want to pattern-match
/// rather than inspect error types.
#[derive(Debug)]
pub enum UnregisterOutcome {
    Success,
    /// The API answered with a status meaning the runner is already gone.
    RemoteNotFound(ApiError),
    OtherFailure(RunnerError),
}

impl UnregisterOutcome {
    pub fn from_result(result: Result<Value, RunnerError>) -> Self {
        match result {
            Ok(_) => UnregisterOutcome::Success,
            Err(RunnerError::Api(api)) if api.is_gone() => UnregisterOutcome::RemoteNotFound(api),
            Err(err) => UnregisterOutcome::OtherFailure(err),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, UnregisterOutcome::Success)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunnerService {
    api: ApiClient,
}

impl RunnerService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(api: ApiClient) -> Self {
        Self { api }
    }

    /// Exchange a registration token (inside `options`) for a runner token.
    pub fn register(
        &self,
        endpoint: &str,
        options: &RequestOptions,
        transport: &TransportOptions,
    ) -> Result<Registration, RunnerError> {
        let url = runners_url(endpoint);
        info!("Registering gitlab runner with {}", endpoint);
        let body = self.api.post(&url, options, transport)?;
        Registration::from_json(body)
    }

    /// Delete the runner identified by `credential`.
    ///
    /// Errors are returned as-is; deciding whether a failed delete matters is
    /// up to the caller.
    pub fn unregister(
        &self,
        endpoint: &str,
        credential: &RunnerCredential,
        transport: &TransportOptions,
    ) -> Result<Value, RunnerError> {
        let url = runners_url(endpoint);
        info!("Unregistering gitlab runner with {}", endpoint);
        self.api
            .delete(&url, &RequestOptions::credential(credential), transport)
    }

    pub fn try_unregister(
        &self,
        endpoint: &str,
        credential: &RunnerCredential,
        transport: &TransportOptions,
    ) -> UnregisterOutcome {
        UnregisterOutcome::from_result(self.unregister(endpoint, credential, transport))
    }
}
