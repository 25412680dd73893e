use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment as K8sDeployment;
use k8s_openapi::api::core::v1::{Pod as K8sPod, Service as K8sService};
use kube::api::{ApiResource, DynamicObject, GroupVersionKind, ListParams};
use kube::{Api, Client};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::error::{HealthError, HealthResult};
use crate::types::{Deployment, DeploymentReplicas, Pod, Service};

/// Read access to the orchestrator objects the health core needs.
///
/// Implementations must be safe to call concurrently.
#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// Whether the cluster is an OpenShift-style platform that also serves
    /// DeploymentConfig workloads.
    async fn is_mesh_platform(&self) -> bool;

    async fn deployments(&self, namespace: &str) -> HealthResult<Vec<Deployment>>;

    async fn deployment(&self, namespace: &str, name: &str) -> HealthResult<Deployment>;

    /// Pods matching a label selector; an empty selector lists every pod.
    async fn pods(&self, namespace: &str, label_selector: &str) -> HealthResult<Vec<Pod>>;

    async fn services(&self, namespace: &str, label_selector: &str) -> HealthResult<Vec<Service>>;
}

/// `Orchestrator` backed by the Kubernetes API.
#[derive(Clone)]
pub struct KubeOrchestrator {
    client: Client,
}

impl KubeOrchestrator {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn deployment_config_api(&self, namespace: &str) -> Api<DynamicObject> {
        let gvk = GroupVersionKind::gvk("apps.openshift.io", "v1", "DeploymentConfig");
        let ar = ApiResource::from_gvk(&gvk);
        Api::namespaced_with(self.client.clone(), namespace, &ar)
    }
}

fn list_params(label_selector: &str) -> ListParams {
    let lp = ListParams::default();
    if label_selector.is_empty() {
        lp
    } else {
        lp.labels(label_selector)
    }
}

#[async_trait]
impl Orchestrator for KubeOrchestrator {
    async fn is_mesh_platform(&self) -> bool {
        use http::Request as HttpRequest;
        let req = match HttpRequest::builder()
            .method("GET")
            .uri("/apis/route.openshift.io")
            .body(Vec::new())
        {
            Ok(r) => r,
            Err(e) => {
                warn!("build platform probe request: {}", e);
                return false;
            }
        };
        match self.client.request::<serde_json::Value>(req).await {
            Ok(_) => true,
            Err(kube::Error::Api(resp)) if resp.code == 404 => false,
            Err(e) => {
                warn!("platform probe failed, assuming plain Kubernetes: {}", e);
                false
            }
        }
    }

    async fn deployments(&self, namespace: &str) -> HealthResult<Vec<Deployment>> {
        let api: Api<K8sDeployment> = Api::namespaced(self.client.clone(), namespace);
        let mut deployments: Vec<Deployment> = api
            .list(&ListParams::default())
            .await?
            .items
            .iter()
            .map(deployment_from_k8s)
            .collect();

        if self.is_mesh_platform().await {
            let configs = self.deployment_config_api(namespace).list(&ListParams::default()).await?;
            debug!("found {} deployment configs in {}", configs.items.len(), namespace);
            deployments.extend(configs.items.iter().map(deployment_from_dynamic));
        }
        Ok(deployments)
    }

    async fn deployment(&self, namespace: &str, name: &str) -> HealthResult<Deployment> {
        let api: Api<K8sDeployment> = Api::namespaced(self.client.clone(), namespace);
        let err = match api.get(name).await.map_err(HealthError::from) {
            Ok(d) => return Ok(deployment_from_k8s(&d)),
            Err(e) => e,
        };
        if err.is_not_found() && self.is_mesh_platform().await {
            let dc = self.deployment_config_api(namespace).get(name).await?;
            return Ok(deployment_from_dynamic(&dc));
        }
        Err(err)
    }

    async fn pods(&self, namespace: &str, label_selector: &str) -> HealthResult<Vec<Pod>> {
        let api: Api<K8sPod> = Api::namespaced(self.client.clone(), namespace);
        let pods = api.list(&list_params(label_selector)).await?;
        Ok(pods.items.iter().map(pod_from_k8s).collect())
    }

    async fn services(&self, namespace: &str, label_selector: &str) -> HealthResult<Vec<Service>> {
        let api: Api<K8sService> = Api::namespaced(self.client.clone(), namespace);
        let services = api.list(&list_params(label_selector)).await?;
        Ok(services.items.iter().map(service_from_k8s).collect())
    }
}

fn non_negative(v: Option<i32>) -> u32 {
    v.unwrap_or(0).max(0) as u32
}

pub fn deployment_from_k8s(d: &K8sDeployment) -> Deployment {
    let selector = d
        .spec
        .as_ref()
        .and_then(|s| s.selector.match_labels.clone())
        .unwrap_or_default();
    let status = d
        .status
        .as_ref()
        .map(|s| DeploymentReplicas {
            replicas: non_negative(s.replicas),
            available_replicas: non_negative(s.available_replicas),
            unavailable_replicas: non_negative(s.unavailable_replicas),
        })
        .unwrap_or_default();
    Deployment {
        name: d.metadata.name.clone().unwrap_or_default(),
        selector,
        status,
    }
}

pub fn deployment_from_dynamic(obj: &DynamicObject) -> Deployment {
    let selector: BTreeMap<String, String> = obj
        .data
        .pointer("/spec/selector")
        .and_then(|v| v.as_object())
        .map(|m| {
            m.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default();
    let count = |field: &str| {
        obj.data
            .pointer(&format!("/status/{}", field))
            .and_then(|v| v.as_i64())
            .unwrap_or(0)
            .clamp(0, u32::MAX as i64) as u32
    };
    Deployment {
        name: obj.metadata.name.clone().unwrap_or_default(),
        selector,
        status: DeploymentReplicas {
            replicas: count("replicas"),
            available_replicas: count("availableReplicas"),
            unavailable_replicas: count("unavailableReplicas"),
        },
    }
}

pub fn pod_from_k8s(p: &K8sPod) -> Pod {
    Pod {
        name: p.metadata.name.clone().unwrap_or_default(),
        labels: p.metadata.labels.clone().unwrap_or_default(),
        annotations: p.metadata.annotations.clone().unwrap_or_default(),
    }
}

pub fn service_from_k8s(s: &K8sService) -> Service {
    Service {
        name: s.metadata.name.clone().unwrap_or_default(),
        labels: s.metadata.labels.clone().unwrap_or_default(),
        selector: s
            .spec
            .as_ref()
            .and_then(|spec| spec.selector.clone())
            .unwrap_or_default(),
    }
}
