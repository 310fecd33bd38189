//! glrunner Core - GitLab runner registration primitives
//!
//! Shared types for the registration client and CLI: the error taxonomy,
//! the runner request/response model, token file storage and configuration.

pub mod config;
pub mod error;
pub mod runner;
pub mod token_store;

pub use config::Config;
pub use error::{ApiError, ConnectTarget, RunnerError};
pub use runner::{runners_url, Registration, RequestOptions, RunnerCredential};
pub use token_store::TokenStore;

/// Result type alias for runner operations
pub type Result<T> = std::result::Result<T, RunnerError>;
