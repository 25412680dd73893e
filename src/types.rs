use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Sentinel ratio meaning "no traffic observed" or "not applicable".
pub const NO_DATA: f64 = -1.0;

#[derive(Debug, Clone)]
pub struct Config {
    pub namespaces: Vec<String>,
    pub prometheus_url: String,
    pub rate_interval: String,
    pub query_timeout_seconds: u64,
    pub health_kind: HealthKind,
    pub sidecar_annotation: String,
}

/// Which namespace view the binary reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthKind {
    App,
    Workload,
    Service,
}

/// Deployment as seen by the health core: identity, pod selector and replica counts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Deployment {
    pub name: String,
    pub selector: BTreeMap<String, String>,
    pub status: DeploymentReplicas,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeploymentReplicas {
    pub replicas: u32,
    pub available_replicas: u32,
    pub unavailable_replicas: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pod {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Service {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub selector: BTreeMap<String, String>,
}

/// One element of an instant vector returned by the metrics backend.
///
/// The value is kept as the raw string the backend sent; the rate parser
/// decides whether it is usable.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub labels: HashMap<String, String>,
    pub value: String,
    pub timestamp: f64,
}

pub type SampleVector = Vec<Sample>;

impl Sample {
    pub fn new(labels: &[(&str, &str)], value: f64) -> Self {
        Self {
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            value: value.to_string(),
            timestamp: 0.0,
        }
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(|s| s.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadStatus {
    pub name: String,
    pub desired_replicas: u32,
    pub available_replicas: u32,
    pub unavailable_replicas: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestHealth {
    pub inbound_error_ratio: f64,
    pub outbound_error_ratio: f64,
    pub error_ratio: f64,
}

impl RequestHealth {
    pub fn no_data() -> Self {
        Self {
            inbound_error_ratio: NO_DATA,
            outbound_error_ratio: NO_DATA,
            error_ratio: NO_DATA,
        }
    }

    pub fn has_data(&self) -> bool {
        self.error_ratio != NO_DATA
    }
}

impl Default for RequestHealth {
    fn default() -> Self {
        Self::no_data()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub requests: RequestHealth,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppHealth {
    pub workload_status: WorkloadStatus,
    pub requests: RequestHealth,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadHealth {
    pub workload_status: WorkloadStatus,
    pub requests: RequestHealth,
}

pub type NamespaceAppHealth = BTreeMap<String, AppHealth>;
pub type NamespaceWorkloadHealth = BTreeMap<String, WorkloadHealth>;
pub type NamespaceServiceHealth = BTreeMap<String, ServiceHealth>;

/// Health report for one namespace, tagged by the view it was computed for.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum NamespaceHealth {
    App {
        namespace: String,
        #[serde(rename = "queryTime")]
        query_time: DateTime<Utc>,
        entities: NamespaceAppHealth,
    },
    Workload {
        namespace: String,
        #[serde(rename = "queryTime")]
        query_time: DateTime<Utc>,
        entities: NamespaceWorkloadHealth,
    },
    Service {
        namespace: String,
        #[serde(rename = "queryTime")]
        query_time: DateTime<Utc>,
        entities: NamespaceServiceHealth,
    },
}

impl NamespaceHealth {
    pub fn namespace(&self) -> &str {
        match self {
            NamespaceHealth::App { namespace, .. }
            | NamespaceHealth::Workload { namespace, .. }
            | NamespaceHealth::Service { namespace, .. } => namespace,
        }
    }

    /// Request health of every entity, keyed by entity name.
    pub fn request_health(&self) -> Vec<(&str, &RequestHealth)> {
        match self {
            NamespaceHealth::App { entities, .. } => entities
                .iter()
                .map(|(k, v)| (k.as_str(), &v.requests))
                .collect(),
            NamespaceHealth::Workload { entities, .. } => entities
                .iter()
                .map(|(k, v)| (k.as_str(), &v.requests))
                .collect(),
            NamespaceHealth::Service { entities, .. } => entities
                .iter()
                .map(|(k, v)| (k.as_str(), &v.requests))
                .collect(),
        }
    }
}
