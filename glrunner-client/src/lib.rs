//! glrunner Client - GitLab runner registration over HTTP
//!
//! `ApiClient` performs single JSON requests with proxy and TLS handling,
//! `RunnerService` maps register/unregister onto `/api/v4/runners`, and
//! `Lifecycle` adds the token-file bookkeeping used by the CLI.

pub mod api_client;
pub mod lifecycle;
pub mod runner;

pub use api_client::{ApiClient, ProxyAddress, RawResponse, TransportOptions};
pub use lifecycle::{Lifecycle, RegisterOutcome, UnregisterReport, UnregisterStatus, NOOP_TOKEN};
pub use runner::{RunnerService, UnregisterOutcome};
