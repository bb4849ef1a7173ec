//! Abstractio cloud utilities
//!
//! Shared building blocks for provisioning clusters on managed cloud
//! services:
//!
//! - [`ReadinessPoller`]: bounded, cancellable polling of asynchronously
//!   provisioned resources
//! - [`normalize`]: turns the key-value store's attribute-typed records into
//!   [`ClusterRecord`]s, with [`encode_env`] / [`decode_env`] for the
//!   environment variable field
//! - [`CommonOperations`]: cluster orchestration over injected collaborators
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │               abstractio-cloud                   │
//! │  ┌──────────────┐  ┌──────────────┐            │
//! │  │   Poller     │  │   Records    │            │
//! │  └──────────────┘  └──────────────┘            │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │  trait RecordStore / MessageSink / ...    │   │
//! │  └──────────────────────────────────────────┘   │
//! └───────┬─────────────────┬───────────────────────┘
//!         │                 │
//! ┌───────▼───────┐ ┌───────▼───────┐
//! │      aws      │ │      gcp      │
//! │   adapters    │ │    clients    │
//! └───────────────┘ └───────────────┘
//! ```

pub mod config;
pub mod error;
pub mod operations;
pub mod poller;
pub mod provider;
pub mod record;

// Re-exports
pub use config::OperationsConfig;
pub use error::{CloudError, Result};
pub use operations::{CommonOperations, service_account_parameter};
pub use poller::{
    Backoff, FetchErrorPolicy, PollConfig, PollOutcome, Predicates, RETRIES_EXHAUSTED, Readiness,
    ReadinessPoller, StatusClassifier,
};
pub use provider::{FieldUpdates, MessageSink, RecordQuery, RecordStore, SecretSource};
pub use record::{
    AttributeValue, ClusterRecord, ClusterStatus, ProviderRecord, decode_env, encode_env,
    normalize,
};

// Callers need the same token type the poller checks.
pub use tokio_util::sync::CancellationToken;
