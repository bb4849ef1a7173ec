//! Cloud Run (Knative serving v1) client

use crate::client::ApiClient;
use crate::error::Result;
use abstractio_cloud::{Readiness, StatusClassifier};
use serde::{Deserialize, Serialize};

const RUN_API: &str = "https://run.googleapis.com/v1";
const READY_CONDITION: &str = "Ready";
const INVOKER_ROLE: &str = "roles/run.invoker";

/// Regional Knative endpoint, e.g. `https://europe-west1-run.googleapis.com/apis/serving.knative.dev/v1`
pub fn regional_endpoint(region: &str) -> String {
    format!("https://{region}-run.googleapis.com/apis/serving.knative.dev/v1")
}

/// Cloud Run service as returned by the Knative API
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Service {
    #[serde(default)]
    pub metadata: ServiceMetadata,
    #[serde(default)]
    pub status: ServiceStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceMetadata {
    pub name: Option<String>,
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub url: Option<String>,
    pub observed_generation: Option<i64>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: String,
    /// "True", "False" or "Unknown"
    pub status: String,
    pub reason: Option<String>,
    pub message: Option<String>,
}

impl Service {
    pub fn condition(&self, condition_type: &str) -> Option<&Condition> {
        self.status
            .conditions
            .iter()
            .find(|c| c.condition_type == condition_type)
    }

    pub fn url(&self) -> Option<&str> {
        self.status.url.as_deref()
    }

    /// Owned URL, shaped for use as an endpoint extractor
    pub fn endpoint(&self) -> Option<String> {
        self.url().map(str::to_string)
    }
}

/// `Ready=True` is ready, `Ready=False` is a terminal failure
#[derive(Debug, Clone, Copy, Default)]
pub struct CloudRunReadiness;

impl StatusClassifier<Service> for CloudRunReadiness {
    fn classify(&self, service: &Service) -> Readiness {
        match service.condition(READY_CONDITION) {
            Some(c) if c.status == "True" => Readiness::Ready,
            Some(c) if c.status == "False" => Readiness::TerminalFailure(
                c.message
                    .clone()
                    .or_else(|| c.reason.clone())
                    .unwrap_or_else(|| "service reported Ready=False".to_string()),
            ),
            _ => Readiness::Pending,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ServiceList {
    #[serde(default)]
    items: Vec<Service>,
}

/// Cloud Run API client
#[derive(Debug, Clone)]
pub struct CloudRun {
    api: ApiClient,
}

impl CloudRun {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            api: ApiClient::new(access_token),
        }
    }

    /// Services of `project` in `region`
    pub async fn list_services(&self, project: &str, region: &str) -> Result<Vec<Service>> {
        tracing::info!(project, region, "Listing Cloud Run services");
        let url = format!("{}/namespaces/{project}/services", regional_endpoint(region));
        let list: ServiceList = self.api.get(&url).await?;
        Ok(list.items)
    }

    /// Fetch a service by its full name (`namespaces/{project}/services/{service}`)
    pub async fn get_service(&self, name: &str, region: &str) -> Result<Service> {
        tracing::debug!(name, region, "Getting Cloud Run service");
        let url = format!("{}/{name}", regional_endpoint(region));
        self.api.get(&url).await
    }

    pub async fn create_service(
        &self,
        project: &str,
        region: &str,
        body: &serde_json::Value,
    ) -> Result<Service> {
        tracing::info!(project, region, "Creating Cloud Run service");
        let url = format!("{}/namespaces/{project}/services", regional_endpoint(region));
        self.api.post(&url, body).await
    }

    pub async fn replace_service(
        &self,
        name: &str,
        region: &str,
        body: &serde_json::Value,
    ) -> Result<Service> {
        tracing::info!(name, region, "Replacing Cloud Run service");
        let url = format!("{}/{name}", regional_endpoint(region));
        self.api.put(&url, body).await
    }

    pub async fn delete_service(&self, name: &str, region: &str) -> Result<serde_json::Value> {
        tracing::info!(name, region, "Deleting Cloud Run service");
        let url = format!("{}/{name}", regional_endpoint(region));
        self.api.delete(&url).await
    }

    /// Grant `roles/run.invoker` to `allUsers`
    ///
    /// `resource` is `projects/{project}/locations/{region}/services/{service}`.
    pub async fn allow_unauthenticated(&self, resource: &str) -> Result<serde_json::Value> {
        tracing::info!(resource, "Allowing unauthenticated invocations");
        let url = format!("{RUN_API}/{resource}:setIamPolicy");
        self.api.post(&url, &public_invoker_policy()).await
    }
}

fn public_invoker_policy() -> serde_json::Value {
    serde_json::json!({
        "policy": {
            "bindings": [{
                "role": INVOKER_ROLE,
                "members": ["allUsers"]
            }]
        }
    })
}
