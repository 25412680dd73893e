#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use mesh_health::{
    Deployment, DeploymentReplicas, HealthError, HealthResult, MetricsSource, Orchestrator, Pod,
    Sample, SampleVector, Service, ISTIO_SIDECAR_ANNOTATION,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub fn query_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2017, 1, 15, 0, 0, 0).unwrap()
}

pub fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

pub fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

pub fn deployment(name: &str, selector: &[(&str, &str)], replicas: (u32, u32, u32)) -> Deployment {
    Deployment {
        name: name.to_string(),
        selector: labels(selector),
        status: DeploymentReplicas {
            replicas: replicas.0,
            available_replicas: replicas.1,
            unavailable_replicas: replicas.2,
        },
    }
}

pub fn pod(name: &str, pod_labels: &[(&str, &str)], meshed: bool) -> Pod {
    let annotations = if meshed {
        let status = r#"{"version":"1.0.0","containers":["istio-proxy"]}"#;
        labels(&[(ISTIO_SIDECAR_ANNOTATION, status)])
    } else {
        BTreeMap::new()
    };
    Pod {
        name: name.to_string(),
        labels: labels(pod_labels),
        annotations,
    }
}

pub fn service(name: &str, selector: &[(&str, &str)]) -> Service {
    Service {
        name: name.to_string(),
        labels: labels(selector),
        selector: labels(selector),
    }
}

pub fn reviews_deployments() -> Vec<Deployment> {
    vec![
        deployment("reviews-v1", &[("app", "reviews"), ("version", "v1")], (3, 2, 1)),
        deployment("reviews-v2", &[("app", "reviews"), ("version", "v2")], (2, 1, 1)),
    ]
}

pub fn reviews_pods(meshed: bool) -> Vec<Pod> {
    vec![
        pod("reviews-v1", &[("app", "reviews"), ("version", "v1")], meshed),
        pod("reviews-v2", &[("app", "reviews"), ("version", "v2")], meshed),
    ]
}

/// Inbound 500s from outside the mesh into httpbin (14 ok, 1.4 not found).
pub fn service_rates() -> SampleVector {
    vec![
        Sample::new(
            &[
                ("source_service", "unknown"),
                ("destination_service", "httpbin.tutorial.svc.cluster.local"),
                ("response_code", "200"),
            ],
            14.0,
        ),
        Sample::new(
            &[
                ("source_service", "unknown"),
                ("destination_service", "httpbin.tutorial.svc.cluster.local"),
                ("response_code", "404"),
            ],
            1.4,
        ),
    ]
}

/// Reviews receives 1.6 rps of 500s and sends 5 rps of 200s and 3.5 rps of 400s.
pub fn reviews_rates() -> SampleVector {
    vec![
        Sample::new(
            &[
                ("source_service", "unknown"),
                ("destination_service", "reviews.tutorial.svc.cluster.local"),
                ("response_code", "500"),
            ],
            1.6,
        ),
        Sample::new(
            &[
                ("source_service", "reviews.tutorial.svc.cluster.local"),
                ("destination_service", "httpbin.tutorial.svc.cluster.local"),
                ("response_code", "200"),
            ],
            5.0,
        ),
        Sample::new(
            &[
                ("source_service", "reviews.tutorial.svc.cluster.local"),
                ("destination_service", "httpbin.tutorial.svc.cluster.local"),
                ("response_code", "400"),
            ],
            3.5,
        ),
    ]
}

/// Same traffic as `reviews_rates` in the workload vocabulary.
pub fn reviews_v1_rates() -> SampleVector {
    vec![
        Sample::new(
            &[
                ("source_workload", "unknown"),
                ("destination_workload", "reviews-v1"),
                ("response_code", "500"),
            ],
            1.6,
        ),
        Sample::new(
            &[
                ("source_workload", "reviews-v1"),
                ("destination_workload", "httpbin-v1"),
                ("response_code", "200"),
            ],
            5.0,
        ),
        Sample::new(
            &[
                ("source_workload", "reviews-v1"),
                ("destination_workload", "httpbin-v1"),
                ("response_code", "400"),
            ],
            3.5,
        ),
    ]
}

pub fn reviews_orchestrator(meshed: bool) -> MockOrchestrator {
    MockOrchestrator {
        deployments: reviews_deployments(),
        pods: reviews_pods(meshed),
        ..Default::default()
    }
}

#[derive(Default)]
pub struct MockOrchestrator {
    pub mesh_platform: bool,
    pub deployments: Vec<Deployment>,
    pub pods: Vec<Pod>,
    pub services: Vec<Service>,
    pub fail_pods: bool,
    pub pod_selectors: Mutex<Vec<String>>,
    pub calls: AtomicUsize,
}

fn selector_accepts(selector: &str, pod_labels: &BTreeMap<String, String>) -> bool {
    selector
        .split(',')
        .filter(|s| !s.is_empty())
        .all(|term| match term.split_once('=') {
            Some((k, v)) => pod_labels.get(k).map(|x| x == v).unwrap_or(false),
            None => pod_labels.contains_key(term),
        })
}

#[async_trait]
impl Orchestrator for MockOrchestrator {
    async fn is_mesh_platform(&self) -> bool {
        self.mesh_platform
    }

    async fn deployments(&self, _namespace: &str) -> HealthResult<Vec<Deployment>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.deployments.clone())
    }

    async fn deployment(&self, _namespace: &str, name: &str) -> HealthResult<Deployment> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.deployments
            .iter()
            .find(|d| d.name == name)
            .cloned()
            .ok_or_else(|| HealthError::NotFound(format!("deployment {} not found", name)))
    }

    async fn pods(&self, _namespace: &str, label_selector: &str) -> HealthResult<Vec<Pod>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.pod_selectors.lock().unwrap().push(label_selector.to_string());
        if self.fail_pods {
            return Err(HealthError::upstream("orchestrator: connection refused"));
        }
        Ok(self
            .pods
            .iter()
            .filter(|p| selector_accepts(label_selector, &p.labels))
            .cloned()
            .collect())
    }

    async fn services(&self, _namespace: &str, label_selector: &str) -> HealthResult<Vec<Service>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .services
            .iter()
            .filter(|s| selector_accepts(label_selector, &s.labels))
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct MockMetrics {
    pub service_rates: SampleVector,
    pub app_rates: SampleVector,
    pub workload_rates: SampleVector,
    pub all_rates: SampleVector,
    pub fail: bool,
    pub hang: bool,
    pub service_calls: AtomicUsize,
    pub app_calls: AtomicUsize,
    pub workload_calls: AtomicUsize,
    pub all_calls: AtomicUsize,
}

impl MockMetrics {
    async fn respond(
        &self,
        counter: &AtomicUsize,
        samples: &SampleVector,
    ) -> HealthResult<SampleVector> {
        counter.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            std::future::pending::<()>().await;
        }
        if self.fail {
            return Err(HealthError::upstream("metrics backend returned 503 Service Unavailable"));
        }
        Ok(samples.clone())
    }

    pub fn total_calls(&self) -> usize {
        self.service_calls.load(Ordering::SeqCst)
            + self.app_calls.load(Ordering::SeqCst)
            + self.workload_calls.load(Ordering::SeqCst)
            + self.all_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetricsSource for MockMetrics {
    async fn service_request_rates(
        &self,
        _ns: &str,
        _service: &str,
        _interval: &str,
        _time: DateTime<Utc>,
    ) -> HealthResult<SampleVector> {
        self.respond(&self.service_calls, &self.service_rates).await
    }

    async fn app_request_rates(
        &self,
        _ns: &str,
        _app: &str,
        _interval: &str,
        _time: DateTime<Utc>,
    ) -> HealthResult<SampleVector> {
        self.respond(&self.app_calls, &self.app_rates).await
    }

    async fn workload_request_rates(
        &self,
        _ns: &str,
        _workload: &str,
        _interval: &str,
        _time: DateTime<Utc>,
    ) -> HealthResult<SampleVector> {
        self.respond(&self.workload_calls, &self.workload_rates).await
    }

    async fn all_request_rates(
        &self,
        _ns: &str,
        _interval: &str,
        _time: DateTime<Utc>,
    ) -> HealthResult<SampleVector> {
        self.respond(&self.all_calls, &self.all_rates).await
    }
}
