//! Abstractio GCP clients
//!
//! Thin REST clients for Cloud Run (Knative serving v1) and Compute Engine,
//! plus the status classifiers used to wait on them with
//! [`abstractio_cloud::ReadinessPoller`].
//!
//! Clients take an already-minted OAuth2 access token.
//!
//! ```no_run
//! use abstractio_cloud::{CancellationToken, OperationsConfig};
//! use abstractio_cloud_gcp::ComputeEngine;
//!
//! # async fn example(token: String) -> abstractio_cloud_gcp::Result<()> {
//! let config = OperationsConfig::from_env()?;
//! let compute = ComputeEngine::new(token);
//!
//! compute.reserve_static_ip("my-project", "egress-1", "europe-west1").await?;
//! let (ip, self_link) = compute
//!     .wait_for_static_ip(
//!         "my-project",
//!         "egress-1",
//!         "europe-west1",
//!         &config.static_address_poller()?,
//!         &CancellationToken::new(),
//!     )
//!     .await?;
//! # let _ = (ip, self_link);
//! # Ok(())
//! # }
//! ```

mod client;
pub mod cloud_run;
pub mod compute_engine;
pub mod error;

pub use cloud_run::{CloudRun, CloudRunReadiness, Condition, Service, ServiceStatus};
pub use compute_engine::{Address, AddressReadiness, CLUSTER_NETWORK, ComputeEngine};
pub use error::{GcpError, Result};
