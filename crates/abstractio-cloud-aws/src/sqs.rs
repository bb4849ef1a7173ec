//! SQS queue sink

use abstractio_cloud::{CloudError, MessageSink, Result};
use async_trait::async_trait;
use aws_sdk_sqs::Client;
use aws_sdk_sqs::error::DisplayErrorContext;

/// Sends JSON payloads to SQS queues; the destination is the queue URL
#[derive(Debug, Clone)]
pub struct Sqs {
    client: Client,
}

impl Sqs {
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
impl MessageSink for Sqs {
    async fn send(&self, queue_url: &str, payload: &serde_json::Value) -> Result<String> {
        let body = serde_json::to_string(payload)?;
        let output = self
            .client
            .send_message()
            .queue_url(queue_url)
            .message_body(body)
            .send()
            .await
            .map_err(|e| {
                let message = DisplayErrorContext(&e).to_string();
                tracing::error!(queue_url, error = %message, "Error while sending message to SQS");
                CloudError::Delivery(message)
            })?;

        output.message_id().map(str::to_string).ok_or_else(|| {
            tracing::error!(queue_url, "SQS accepted the message without an id");
            CloudError::Delivery(format!("no message id returned by {queue_url}"))
        })
    }
}
