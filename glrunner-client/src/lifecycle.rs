//! File-backed register/unregister flows
//!
//! Wraps `RunnerService` with the local bookkeeping around it: token files,
//! no-op mode, CA file pre-checks and the decision to downgrade failed
//! deletes to warnings.

use crate::api_client::TransportOptions;
use crate::runner::{RunnerService, UnregisterOutcome};
use glrunner_core::{Registration, RequestOptions, RunnerCredential, RunnerError, TokenStore};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Token handed back by `register_to_file` in no-op mode.
pub const NOOP_TOKEN: &str = "DUMMY-NOOP-TOKEN";

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RegisterOutcome {
    /// A token file was already present; nothing was sent.
    Existing {
        token: RunnerCredential,
        path: PathBuf,
    },
    Registered {
        registration: Registration,
        path: PathBuf,
    },
    Noop { token: RunnerCredential },
    /// The configured CA file does not exist yet.
    Skipped { message: String },
}

impl RegisterOutcome {
    pub fn token(&self) -> Option<&RunnerCredential> {
        match self {
            RegisterOutcome::Existing { token, .. } | RegisterOutcome::Noop { token } => Some(token),
            RegisterOutcome::Registered { registration, .. } => Some(&registration.token),
            RegisterOutcome::Skipped { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnregisterStatus {
    NoToken,
    Noop,
    SkippedMissingCaFile,
    Unregistered,
    AlreadyGone,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnregisterReport {
    pub runner_name: String,
    pub status: UnregisterStatus,
    pub message: String,
    pub token_file: PathBuf,
    pub token_removed: bool,
}

#[derive(Debug, Clone)]
pub struct Lifecycle {
    service: RunnerService,
    store: TokenStore,
    noop: bool,
}

impl Lifecycle {
    pub fn new(service: RunnerService, store: TokenStore) -> Self {
        Self {
            service,
            store,
            noop: false,
        }
    }

    pub fn noop(mut self, noop: bool) -> Self {
        self.noop = noop;
        self
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    /// Register `runner_name` unless a token for it is already on disk, and
    /// persist the new token.
    pub fn register_to_file(
        &self,
        url: &str,
        registration_token: &str,
        runner_name: &str,
        extra_options: RequestOptions,
        transport: &TransportOptions,
    ) -> glrunner_core::Result<RegisterOutcome> {
        let path = self.store.path_for(runner_name)?;

        if let Some(token) = self.store.read(runner_name)? {
            debug!("Using existing auth token for gitlab runner {}", runner_name);
            return Ok(RegisterOutcome::Existing { token, path });
        }

        if self.noop {
            debug!("Not registering gitlab runner {} when in noop mode", runner_name);
            return Ok(RegisterOutcome::Noop {
                token: RunnerCredential::new(NOOP_TOKEN),
            });
        }

        if let Some(ca_file) = transport.missing_ca_file() {
            warn!(
                ca_file = %ca_file.display(),
                "Unable to register gitlab runner at this time as the specified `ca_file` does not exist (yet). \
                 If it is being provisioned, the next run should complete the registration process."
            );
            return Ok(RegisterOutcome::Skipped {
                message: "Specified CA file doesn't exist, not attempting to create authtoken"
                    .to_string(),
            });
        }

        let options = RequestOptions::registration(registration_token).merge(extra_options);
        let registration = self
            .service
            .register(url, &options, transport)
            .map_err(|e| match e {
                RunnerError::Api(api) => RunnerError::RegistrationFailed(api),
                other => other,
            })?;

        let path = self.store.write(runner_name, &registration.token)?;
        info!(
            "Registered gitlab runner {} (token stored in {})",
            runner_name,
            path.display()
        );

        Ok(RegisterOutcome::Registered { registration, path })
    }

    /// Unregister the runner whose token is stored for `runner_name`, then
    /// forget the token.
    ///
    /// API errors are downgraded to warnings since the runner has usually
    /// been removed server-side already. Connection and configuration errors
    /// are returned and the token file is kept.
    pub fn unregister_from_file(
        &self,
        url: &str,
        runner_name: &str,
        transport: &TransportOptions,
    ) -> glrunner_core::Result<UnregisterReport> {
        let token_file = self.store.path_for(runner_name)?;
        let report = |status, message: String, token_removed| UnregisterReport {
            runner_name: runner_name.to_string(),
            status,
            message,
            token_file: token_file.clone(),
            token_removed,
        };

        let Some(token) = self.store.read(runner_name)? else {
            return Ok(report(
                UnregisterStatus::NoToken,
                format!("{} file doesn't exist", token_file.display()),
                false,
            ));
        };

        if self.noop {
            let message = format!(
                "Not unregistering gitlab runner {} when in noop mode",
                runner_name
            );
            debug!("{}", message);
            return Ok(report(UnregisterStatus::Noop, message, false));
        }

        if let Some(ca_file) = transport.missing_ca_file() {
            warn!(
                ca_file = %ca_file.display(),
                "Unable to unregister gitlab runner at this time as the specified `ca_file` does not exist. \
                 The runner config will be removed from this host only; please remove it from gitlab manually."
            );
            let removed = self.store.remove(runner_name)?;
            return Ok(report(
                UnregisterStatus::SkippedMissingCaFile,
                "Specified CA file doesn't exist, not attempting to remove authtoken".to_string(),
                removed,
            ));
        }

        let (status, message) = match self.service.try_unregister(url, &token, transport) {
            UnregisterOutcome::Success => {
                let message = format!("Successfully unregistered gitlab runner {}", runner_name);
                debug!("{}", message);
                (UnregisterStatus::Unregistered, message)
            }
            UnregisterOutcome::RemoteNotFound(api) => {
                let message = format!(
                    "Error whilst unregistering gitlab runner {}: {}",
                    runner_name, api
                );
                warn!("{}", message);
                (UnregisterStatus::AlreadyGone, message)
            }
            UnregisterOutcome::OtherFailure(RunnerError::Api(api)) => {
                let message = format!(
                    "Error whilst unregistering gitlab runner {}: {}",
                    runner_name, api
                );
                warn!("{}", message);
                (UnregisterStatus::Failed, message)
            }
            UnregisterOutcome::OtherFailure(err) => return Err(err),
        };

        let removed = self.store.remove(runner_name)?;
        Ok(report(status, message, removed))
    }
}
