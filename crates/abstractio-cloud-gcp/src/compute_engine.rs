//! Compute Engine client: static addresses, Cloud NAT routers, VM instances

use crate::client::ApiClient;
use crate::error::{GcpError, Result};
use abstractio_cloud::{CancellationToken, Readiness, ReadinessPoller, StatusClassifier};
use serde::{Deserialize, Serialize};

const COMPUTE_API: &str = "https://compute.googleapis.com/compute/v1";

/// Network every cluster router is attached to
pub const CLUSTER_NETWORK: &str = "abstractio";

/// Regional static address
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub name: Option<String>,
    pub address: Option<String>,
    pub self_link: Option<String>,
    /// `RESERVING`, `RESERVED` or `IN_USE`
    pub status: Option<String>,
}

impl Address {
    /// `(address, self_link)` once both are allocated
    pub fn allocation(&self) -> Option<(&str, &str)> {
        Some((self.address.as_deref()?, self.self_link.as_deref()?))
    }
}

/// Ready once both the IP and its self link are populated
#[derive(Debug, Clone, Copy, Default)]
pub struct AddressReadiness;

impl StatusClassifier<Address> for AddressReadiness {
    fn classify(&self, address: &Address) -> Readiness {
        if address.allocation().is_some() {
            Readiness::Ready
        } else {
            Readiness::Pending
        }
    }
}

/// Compute Engine API client
#[derive(Debug, Clone)]
pub struct ComputeEngine {
    api: ApiClient,
}

impl ComputeEngine {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            api: ApiClient::new(access_token),
        }
    }

    pub async fn reserve_static_ip(
        &self,
        project: &str,
        name: &str,
        region: &str,
    ) -> Result<serde_json::Value> {
        tracing::info!(project, name, region, "Reserving static IP");
        self.api
            .post(
                &addresses_url(project, region),
                &serde_json::json!({ "name": name }),
            )
            .await
    }

    pub async fn get_static_ip(&self, project: &str, name: &str, region: &str) -> Result<Address> {
        tracing::debug!(project, name, region, "Getting static IP");
        self.api
            .get(&format!("{}/{name}", addresses_url(project, region)))
            .await
    }

    pub async fn delete_static_ip(
        &self,
        project: &str,
        region: &str,
        name: &str,
    ) -> Result<serde_json::Value> {
        tracing::info!(project, name, region, "Deleting static IP");
        self.api
            .delete(&format!("{}/{name}", addresses_url(project, region)))
            .await
    }

    /// Wait for a reserved address to be allocated, returning `(address, self_link)`
    pub async fn wait_for_static_ip(
        &self,
        project: &str,
        name: &str,
        region: &str,
        poller: &ReadinessPoller,
        cancel: &CancellationToken,
    ) -> Result<(String, String)> {
        tracing::info!(project, name, region, "Waiting for static IP allocation");

        let outcome = poller
            .poll(
                || self.get_static_ip(project, name, region),
                &AddressReadiness,
                cancel,
            )
            .await;
        let address = outcome.into_result(name)?;

        match (address.address, address.self_link) {
            (Some(ip), Some(self_link)) => {
                tracing::info!(name, ip = %ip, "Static IP allocated");
                Ok((ip, self_link))
            }
            _ => Err(GcpError::AddressUnavailable {
                name: name.to_string(),
                reason: "address or selfLink missing".to_string(),
            }),
        }
    }

    /// Cloud Router with a manual-IP NAT for one subnetwork of `network`
    pub async fn create_router_with_nat(
        &self,
        project: &str,
        name: &str,
        region: &str,
        static_ip: &str,
        subnetwork: &str,
        network: &str,
    ) -> Result<serde_json::Value> {
        tracing::info!(project, name, region, subnetwork, "Creating Cloud Router");
        let body = router_with_nat(project, name, region, static_ip, subnetwork, network);
        self.api.post(&routers_url(project, region), &body).await
    }

    pub async fn delete_router(
        &self,
        project: &str,
        region: &str,
        name: &str,
    ) -> Result<serde_json::Value> {
        tracing::info!(project, name, region, "Deleting Cloud Router");
        self.api
            .delete(&format!("{}/{name}", routers_url(project, region)))
            .await
    }

    pub async fn create_instance(
        &self,
        project: &str,
        zone: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        let name = body.get("name").and_then(|n| n.as_str()).unwrap_or_default();
        tracing::info!(project, zone, name, "Creating VM");
        self.api.post(&instances_url(project, zone), body).await
    }

    pub async fn delete_instance(
        &self,
        project: &str,
        zone: &str,
        name: &str,
    ) -> Result<serde_json::Value> {
        tracing::info!(project, zone, name, "Deleting VM");
        self.api
            .delete(&format!("{}/{name}", instances_url(project, zone)))
            .await
    }
}

fn addresses_url(project: &str, region: &str) -> String {
    format!("{COMPUTE_API}/projects/{project}/regions/{region}/addresses")
}

fn routers_url(project: &str, region: &str) -> String {
    format!("{COMPUTE_API}/projects/{project}/regions/{region}/routers")
}

fn instances_url(project: &str, zone: &str) -> String {
    format!("{COMPUTE_API}/projects/{project}/zones/{zone}/instances")
}

fn router_with_nat(
    project: &str,
    name: &str,
    region: &str,
    static_ip: &str,
    subnetwork: &str,
    network: &str,
) -> serde_json::Value {
    serde_json::json!({
        "name": name,
        "network": format!("https://www.googleapis.com/compute/v1/projects/{project}/global/networks/{network}"),
        "nats": [{
            "name": name,
            "natIpAllocateOption": "MANUAL_ONLY",
            "natIps": [static_ip],
            "sourceSubnetworkIpRangesToNat": "LIST_OF_SUBNETWORKS",
            "subnetworks": [{
                "name": format!("regions/{region}/subnetworks/{subnetwork}")
            }]
        }]
    })
}
