//! SNS topic sink

use abstractio_cloud::{CloudError, MessageSink, Result};
use async_trait::async_trait;
use aws_sdk_sns::Client;
use aws_sdk_sns::error::DisplayErrorContext;

/// Publishes JSON payloads to SNS topics; the destination is the topic ARN
#[derive(Debug, Clone)]
pub struct Sns {
    client: Client,
}

impl Sns {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MessageSink for Sns {
    async fn send(&self, topic_arn: &str, payload: &serde_json::Value) -> Result<String> {
        let message = serde_json::to_string(payload)?;
        let output = self
            .client
            .publish()
            .topic_arn(topic_arn)
            .message(message)
            .send()
            .await
            .map_err(|e| {
                let message = DisplayErrorContext(&e).to_string();
                tracing::error!(topic_arn, error = %message, "Error while publishing message to SNS");
                CloudError::Delivery(message)
            })?;

        output.message_id().map(str::to_string).ok_or_else(|| {
            tracing::error!(topic_arn, "SNS accepted the message without an id");
            CloudError::Delivery(format!("no message id returned by {topic_arn}"))
        })
    }
}
