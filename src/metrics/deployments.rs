use std::collections::BTreeMap;

use crate::types::{Deployment, Pod, WorkloadStatus};

pub const APP_LABEL: &str = "app";

/// Replica counts of `deployment`, or zeros when the workload has no deployment.
pub fn workload_status(name: &str, deployment: Option<&Deployment>) -> WorkloadStatus {
    match deployment {
        Some(d) => WorkloadStatus {
            name: name.to_string(),
            desired_replicas: d.status.replicas,
            available_replicas: d.status.available_replicas,
            unavailable_replicas: d.status.unavailable_replicas,
        },
        None => WorkloadStatus {
            name: name.to_string(),
            ..Default::default()
        },
    }
}

/// Sum the replica counts of several deployments under one name.
pub fn sum_workload_status<'a, I>(name: &str, deployments: I) -> WorkloadStatus
where
    I: IntoIterator<Item = &'a Deployment>,
{
    deployments
        .into_iter()
        .fold(workload_status(name, None), |mut acc, d| {
            acc.desired_replicas += d.status.replicas;
            acc.available_replicas += d.status.available_replicas;
            acc.unavailable_replicas += d.status.unavailable_replicas;
            acc
        })
}

/// Equality-based selector match; an empty selector matches nothing.
pub fn selector_matches(
    selector: &BTreeMap<String, String>,
    labels: &BTreeMap<String, String>,
) -> bool {
    !selector.is_empty() && selector.iter().all(|(k, v)| labels.get(k) == Some(v))
}

/// Deployments whose selector pins `app=<app>`.
pub fn deployments_for_app<'a>(deployments: &'a [Deployment], app: &str) -> Vec<&'a Deployment> {
    deployments
        .iter()
        .filter(|d| d.selector.get(APP_LABEL).map(|v| v == app).unwrap_or(false))
        .collect()
}

/// Pods selected by `deployment`.
pub fn pods_for_deployment<'a>(deployment: &Deployment, pods: &'a [Pod]) -> Vec<&'a Pod> {
    pods.iter()
        .filter(|p| selector_matches(&deployment.selector, &p.labels))
        .collect()
}
