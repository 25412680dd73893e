use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, error};

use crate::error::{HealthError, HealthResult};
use crate::types::{Sample, SampleVector};

/// Request-rate queries against the metrics backend.
///
/// Every method returns the raw instant vector evaluated at `query_time`
/// over a `rate_interval` window. Implementations must be safe to call
/// concurrently.
#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn service_request_rates(
        &self,
        namespace: &str,
        service: &str,
        rate_interval: &str,
        query_time: DateTime<Utc>,
    ) -> HealthResult<SampleVector>;

    async fn app_request_rates(
        &self,
        namespace: &str,
        app: &str,
        rate_interval: &str,
        query_time: DateTime<Utc>,
    ) -> HealthResult<SampleVector>;

    async fn workload_request_rates(
        &self,
        namespace: &str,
        workload: &str,
        rate_interval: &str,
        query_time: DateTime<Utc>,
    ) -> HealthResult<SampleVector>;

    /// All traffic with either end in `namespace`.
    async fn all_request_rates(
        &self,
        namespace: &str,
        rate_interval: &str,
        query_time: DateTime<Utc>,
    ) -> HealthResult<SampleVector>;
}

const REQUESTS_METRIC: &str = "istio_requests_total";

fn escape(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"")
}

pub fn service_rates_query(namespace: &str, service: &str, rate_interval: &str) -> String {
    format!(
        "sum(rate({m}{{reporter=\"destination\",destination_service_name=\"{svc}\",destination_service_namespace=\"{ns}\"}}[{i}])) \
         by (source_workload,source_workload_namespace,destination_service,destination_service_namespace,response_code)",
        m = REQUESTS_METRIC,
        svc = escape(service),
        ns = escape(namespace),
        i = rate_interval,
    )
}

// Inbound (destination-reported) `or` outbound (source-reported) traffic of one
// entity. `or` keeps a self-traffic series once.
fn entity_rates_query(label: &str, namespace: &str, name: &str, rate_interval: &str) -> String {
    let by = format!(
        "by (source_{l},source_workload_namespace,destination_{l},destination_workload_namespace,response_code)",
        l = label
    );
    let side = |reporter: &str, dir: &str| {
        format!(
            "sum(rate({m}{{reporter=\"{r}\",{d}_{l}=\"{n}\",{d}_workload_namespace=\"{ns}\"}}[{i}])) {by}",
            m = REQUESTS_METRIC,
            r = reporter,
            d = dir,
            l = label,
            n = escape(name),
            ns = escape(namespace),
            i = rate_interval,
            by = by,
        )
    };
    format!("{} or {}", side("destination", "destination"), side("source", "source"))
}

pub fn app_rates_query(namespace: &str, app: &str, rate_interval: &str) -> String {
    entity_rates_query("app", namespace, app, rate_interval)
}

pub fn workload_rates_query(namespace: &str, workload: &str, rate_interval: &str) -> String {
    entity_rates_query("workload", namespace, workload, rate_interval)
}

pub fn all_rates_query(namespace: &str, rate_interval: &str) -> String {
    let by = "by (source_app,source_workload,source_workload_namespace,\
              destination_app,destination_workload,destination_workload_namespace,\
              destination_service,destination_service_namespace,response_code)";
    let side = |reporter: &str, dir: &str| {
        format!(
            "sum(rate({m}{{reporter=\"{r}\",{d}_workload_namespace=\"{ns}\"}}[{i}])) {by}",
            m = REQUESTS_METRIC,
            r = reporter,
            d = dir,
            ns = escape(namespace),
            i = rate_interval,
            by = by,
        )
    };
    format!("{} or {}", side("destination", "destination"), side("source", "source"))
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    status: String,
    #[serde(default)]
    data: Option<QueryData>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryData {
    #[serde(rename = "resultType")]
    result_type: String,
    result: Vec<VectorItem>,
}

#[derive(Debug, Deserialize)]
struct VectorItem {
    #[serde(default)]
    metric: HashMap<String, String>,
    value: (f64, String),
}

/// `MetricsSource` talking to a Prometheus-compatible HTTP API.
#[derive(Clone)]
pub struct PrometheusClient {
    http: reqwest::Client,
    base_url: String,
}

impl PrometheusClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    /// Evaluate an instant query at `time`.
    pub async fn query(&self, promql: &str, time: DateTime<Utc>) -> HealthResult<SampleVector> {
        let url = format!("{}/api/v1/query", self.base_url);
        let ts = time.to_rfc3339_opts(SecondsFormat::Secs, true);
        debug!("prometheus query at {}: {}", ts, promql);

        let res = self
            .http
            .get(&url)
            .query(&[("query", promql), ("time", ts.as_str())])
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            error!("Prometheus query failed: {} - {}", status, body);
            return Err(HealthError::upstream(format!("metrics backend returned {}", status)));
        }

        let body: QueryResponse = res.json().await?;
        decode_vector(body)
    }
}

fn decode_vector(body: QueryResponse) -> HealthResult<SampleVector> {
    if body.status != "success" {
        return Err(HealthError::upstream(format!(
            "metrics backend query failed: {}",
            body.error.unwrap_or_else(|| body.status.clone())
        )));
    }
    let data = body
        .data
        .ok_or_else(|| HealthError::upstream("metrics backend response has no data"))?;
    if data.result_type != "vector" {
        return Err(HealthError::upstream(format!(
            "expected vector result, got {}",
            data.result_type
        )));
    }
    Ok(data
        .result
        .into_iter()
        .map(|item| Sample {
            labels: item.metric,
            value: item.value.1,
            timestamp: item.value.0,
        })
        .collect())
}

#[async_trait]
impl MetricsSource for PrometheusClient {
    async fn service_request_rates(
        &self,
        namespace: &str,
        service: &str,
        rate_interval: &str,
        query_time: DateTime<Utc>,
    ) -> HealthResult<SampleVector> {
        self.query(&service_rates_query(namespace, service, rate_interval), query_time)
            .await
    }

    async fn app_request_rates(
        &self,
        namespace: &str,
        app: &str,
        rate_interval: &str,
        query_time: DateTime<Utc>,
    ) -> HealthResult<SampleVector> {
        self.query(&app_rates_query(namespace, app, rate_interval), query_time)
            .await
    }

    async fn workload_request_rates(
        &self,
        namespace: &str,
        workload: &str,
        rate_interval: &str,
        query_time: DateTime<Utc>,
    ) -> HealthResult<SampleVector> {
        self.query(&workload_rates_query(namespace, workload, rate_interval), query_time)
            .await
    }

    async fn all_request_rates(
        &self,
        namespace: &str,
        rate_interval: &str,
        query_time: DateTime<Utc>,
    ) -> HealthResult<SampleVector> {
        self.query(&all_rates_query(namespace, rate_interval), query_time)
            .await
    }
}
