//! AWS adapters for Abstractio
//!
//! Implements the `abstractio-cloud` collaborator traits on the AWS SDK:
//!
//! - [`DynamoDb`]: [`RecordStore`](abstractio_cloud::RecordStore)
//! - [`Sqs`] / [`Sns`]: [`MessageSink`](abstractio_cloud::MessageSink)
//! - [`Ssm`]: [`SecretSource`](abstractio_cloud::SecretSource)
//!
//! Credentials and region come from the standard AWS environment; load an
//! [`aws_config::SdkConfig`] once and share it between adapters.
//!
//! # Example
//!
//! ```ignore
//! let sdk = aws_config::load_from_env().await;
//! let ops = CommonOperations::new(
//!     OperationsConfig::from_env()?,
//!     Arc::new(DynamoDb::new(&sdk)),
//!     Arc::new(Sqs::new(&sdk)),
//!     Arc::new(Sns::new(&sdk)),
//!     Arc::new(Ssm::new(&sdk)),
//! )?;
//! ```

pub mod dynamodb;
pub mod sns;
pub mod sqs;
pub mod ssm;

pub use dynamodb::DynamoDb;
pub use sns::Sns;
pub use sqs::Sqs;
pub use ssm::Ssm;

/// Load the shared SDK configuration from the environment
pub async fn load_sdk_config() -> aws_config::SdkConfig {
    aws_config::load_from_env().await
}
