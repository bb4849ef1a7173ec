//! Cluster orchestration helpers
//!
//! Reads and updates cluster records, tracks a deployment to completion and
//! forwards follow-up messages. Every collaborator is passed in at
//! construction time.

use crate::config::OperationsConfig;
use crate::error::{CloudError, Result};
use crate::poller::{PollOutcome, ReadinessPoller, StatusClassifier, describe};
use crate::provider::{FieldUpdates, MessageSink, RecordQuery, RecordStore, SecretSource};
use crate::record::{AttributeValue, ClusterRecord, ClusterStatus, ProviderRecord, normalize};
use std::fmt::{Debug, Display};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const CLUSTER_KEY: &str = "id";

pub struct CommonOperations {
    config: OperationsConfig,
    deployment_poller: ReadinessPoller,
    store: Arc<dyn RecordStore>,
    queue: Arc<dyn MessageSink>,
    topic: Arc<dyn MessageSink>,
    secrets: Arc<dyn SecretSource>,
}

impl CommonOperations {
    pub fn new(
        config: OperationsConfig,
        store: Arc<dyn RecordStore>,
        queue: Arc<dyn MessageSink>,
        topic: Arc<dyn MessageSink>,
        secrets: Arc<dyn SecretSource>,
    ) -> Result<Self> {
        let deployment_poller = config.cloud_run_poller()?;
        Ok(Self {
            config,
            deployment_poller,
            store,
            queue,
            topic,
            secrets,
        })
    }

    pub fn config(&self) -> &OperationsConfig {
        &self.config
    }

    fn cluster_key(cluster_id: &str) -> ProviderRecord {
        ProviderRecord::from([(CLUSTER_KEY.to_string(), AttributeValue::s(cluster_id))])
    }

    /// Load and normalize a cluster record
    pub async fn get_cluster(&self, cluster_id: &str) -> Result<ClusterRecord> {
        tracing::info!(cluster_id, "Getting cluster");
        let item = self
            .store
            .get_record(&self.config.clusters_table, &Self::cluster_key(cluster_id))
            .await?;

        match item {
            Some(raw) => normalize(&raw),
            None => {
                tracing::warn!(cluster_id, "No cluster found with the given id");
                Err(CloudError::ClusterNotFound(cluster_id.to_string()))
            }
        }
    }

    /// Update named fields of an existing cluster, returning the new values
    pub async fn update_cluster(
        &self,
        cluster_id: &str,
        updates: FieldUpdates,
    ) -> Result<ProviderRecord> {
        if updates.is_empty() {
            return Err(CloudError::InvalidConfig(
                "cluster update without any field".to_string(),
            ));
        }
        let updates = updates.require_existing(CLUSTER_KEY);
        tracing::debug!(cluster_id, expression = %updates.update_expression(), "Updating cluster");

        match self
            .store
            .update_record(
                &self.config.clusters_table,
                &Self::cluster_key(cluster_id),
                &updates,
            )
            .await
        {
            // only the existence guard can fail when no expectation was set
            Err(CloudError::ConditionFailed(_)) if !updates.has_expectations() => {
                Err(CloudError::ClusterNotFound(cluster_id.to_string()))
            }
            other => other,
        }
    }

    /// Poll a deployment and record its result on the cluster
    ///
    /// `Ready` stores the endpoint (and `static_ip` when given) with status
    /// `COMPLETED`; a terminal failure or exhausted transport retries store
    /// `FAILED` with an error message; cancellation writes nothing. A ready
    /// status without an endpoint is stored as `FAILED` and returned as an
    /// error.
    pub async fn complete_deployment<S, E, F, Fut, C, U>(
        &self,
        cluster_id: &str,
        fetch: F,
        classifier: &C,
        endpoint_of: U,
        static_ip: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<PollOutcome<S, E>>
    where
        S: Debug,
        E: Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<S, E>>,
        C: StatusClassifier<S> + ?Sized,
        U: Fn(&S) -> Option<String>,
    {
        tracing::info!(cluster_id, "Waiting for deployment to become ready");
        let outcome = self.deployment_poller.poll(fetch, classifier, cancel).await;

        let updates = match &outcome {
            PollOutcome::Ready(status) => {
                let Some(endpoint) = endpoint_of(status) else {
                    let reason = "ready without an endpoint";
                    tracing::error!(cluster_id, last_status = ?status, "Deployment ready without an endpoint");
                    self.update_cluster(
                        cluster_id,
                        FieldUpdates::new()
                            .set("status", ClusterStatus::Failed)
                            .set("error_message", format!("deployment failed: {reason}")),
                    )
                    .await?;
                    return Err(CloudError::TerminalFailure {
                        resource: cluster_id.to_string(),
                        reason: reason.to_string(),
                        last_status: format!("{status:?}"),
                    });
                };
                let mut updates = FieldUpdates::new()
                    .set("endpoint", endpoint)
                    .set("status", ClusterStatus::Completed);
                if let Some(ip) = static_ip {
                    updates = updates.set("ip_address", ip);
                }
                tracing::info!(cluster_id, "Deployment ready, updating cluster status");
                Some(updates)
            }
            PollOutcome::TerminalFailure {
                reason,
                last_status,
                ..
            } => {
                tracing::error!(
                    cluster_id,
                    %reason,
                    last_status = %describe(last_status.as_ref()),
                    "Deployment failed"
                );
                Some(
                    FieldUpdates::new()
                        .set("status", ClusterStatus::Failed)
                        .set("error_message", format!("deployment failed: {reason}")),
                )
            }
            PollOutcome::TransientError {
                error, attempts, ..
            } => {
                tracing::error!(cluster_id, %error, attempts, "Deployment status unreachable");
                Some(FieldUpdates::new().set("status", ClusterStatus::Failed).set(
                    "error_message",
                    format!("deployment status unavailable after {attempts} attempts: {error}"),
                ))
            }
            PollOutcome::Cancelled { attempts, .. } => {
                tracing::info!(cluster_id, attempts, "Deployment tracking cancelled");
                None
            }
        };

        if let Some(updates) = updates {
            self.update_cluster(cluster_id, updates).await?;
        }
        Ok(outcome)
    }

    /// Store a new cluster record, validating it first
    pub async fn create_cluster(&self, record: &ProviderRecord) -> Result<ClusterRecord> {
        let cluster = normalize(record)?;
        tracing::info!(cluster_id = %cluster.id, "Creating cluster");
        self.store
            .put_record(&self.config.clusters_table, record)
            .await?;
        Ok(cluster)
    }

    /// Raw records of every cluster, reduced to `attributes` (all when empty)
    pub async fn list_clusters(&self, attributes: &[String]) -> Result<Vec<ProviderRecord>> {
        tracing::info!(?attributes, "Listing clusters");
        let table = &self.config.clusters_table;
        let records = self.store.scan_records(table, attributes).await?;
        if records.is_empty() {
            tracing::warn!(table = %table, "No clusters found");
            return Err(CloudError::ListNotFound(format!("no clusters in {table}")));
        }
        Ok(records)
    }

    /// Clusters matching `query`, normalized
    pub async fn query_clusters(&self, query: &RecordQuery) -> Result<Vec<ClusterRecord>> {
        tracing::info!(index = ?query.index_name(), "Querying clusters");
        let table = &self.config.clusters_table;
        let records = self.store.query_records(table, query).await?;
        if records.is_empty() {
            tracing::warn!(table = %table, "No clusters match the query");
            return Err(CloudError::ListNotFound(format!(
                "no clusters in {table} match {}",
                query.key_condition_expression()
            )));
        }
        records.iter().map(normalize).collect()
    }

    /// Send a JSON message to a queue
    pub async fn send_message(
        &self,
        queue_url: &str,
        message_body: &serde_json::Value,
    ) -> Result<String> {
        tracing::info!(queue_url, "Sending message to queue");
        self.queue.send(queue_url, message_body).await
    }

    /// Publish a JSON message to a notification topic
    pub async fn publish_message(
        &self,
        topic_arn: &str,
        message_body: &serde_json::Value,
    ) -> Result<String> {
        tracing::info!(topic_arn, "Publishing message to topic");
        self.topic.send(topic_arn, message_body).await
    }

    /// Service account JSON of a GCP project
    pub async fn service_account(&self, project: &str) -> Result<String> {
        tracing::debug!(project, "Resolving service account");
        self.secrets
            .get_secret(&service_account_parameter(project))
            .await
    }
}

/// Parameter name holding the service account of `project`
pub fn service_account_parameter(project: &str) -> String {
    format!("/gcp/{project}/sa")
}
