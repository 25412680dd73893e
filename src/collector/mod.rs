use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::context::RequestContext;
use crate::error::{HealthError, HealthResult};
use crate::kubernetes::Orchestrator;
use crate::metrics::{
    any_has_sidecar, deployments_for_app, parse_rates, pods_for_deployment, selector_matches,
    sum_workload_status, workload_status, EntityRef, RateBundle, APP_LABEL,
    ISTIO_SIDECAR_ANNOTATION,
};
use crate::parsing::parse_rate_interval;
use crate::prometheus::MetricsSource;
use crate::report;
use crate::types::*;

/// Computes health reports by fanning out to the orchestrator and the
/// metrics backend.
///
/// Holds no mutable state, so one instance can serve concurrent requests.
/// The metrics backend is never queried for entities without a sidecar.
#[derive(Clone)]
pub struct HealthService {
    orchestrator: Arc<dyn Orchestrator>,
    metrics: Arc<dyn MetricsSource>,
    sidecar_annotation: String,
}

fn validate_name(what: &str, value: &str) -> HealthResult<()> {
    if value.trim().is_empty() {
        return Err(HealthError::validation(format!("{} must not be empty", what)));
    }
    Ok(())
}

fn validate_interval(rate_interval: &str) -> HealthResult<&str> {
    match parse_rate_interval(rate_interval) {
        Some(_) => Ok(rate_interval.trim()),
        None => Err(HealthError::validation(format!(
            "invalid rate interval {:?}, expected e.g. 30s, 1m or 2h",
            rate_interval
        ))),
    }
}

impl HealthService {
    pub fn new(orchestrator: Arc<dyn Orchestrator>, metrics: Arc<dyn MetricsSource>) -> Self {
        Self {
            orchestrator,
            metrics,
            sidecar_annotation: ISTIO_SIDECAR_ANNOTATION.to_string(),
        }
    }

    pub fn with_sidecar_annotation(mut self, annotation: impl Into<String>) -> Self {
        self.sidecar_annotation = annotation.into();
        self
    }

    pub async fn service_health(
        &self,
        ctx: &RequestContext,
        namespace: &str,
        service: &str,
        rate_interval: &str,
        query_time: DateTime<Utc>,
    ) -> HealthResult<ServiceHealth> {
        let interval = validate_interval(rate_interval)?;
        validate_name("namespace", namespace)?;
        validate_name("service", service)?;

        let samples = ctx
            .guard(
                "service request rates",
                self.metrics.service_request_rates(namespace, service, interval, query_time),
            )
            .await?;
        let rates = parse_rates(&samples, &EntityRef::service(namespace, service));
        Ok(report::service_health(Some(&rates)))
    }

    pub async fn app_health(
        &self,
        ctx: &RequestContext,
        namespace: &str,
        app: &str,
        rate_interval: &str,
        query_time: DateTime<Utc>,
    ) -> HealthResult<AppHealth> {
        let interval = validate_interval(rate_interval)?;
        validate_name("namespace", namespace)?;
        validate_name("app", app)?;

        let selector = format!("{}={}", APP_LABEL, app);
        let (deployments, pods) = tokio::try_join!(
            ctx.guard("list deployments", self.orchestrator.deployments(namespace)),
            ctx.guard("list pods", self.orchestrator.pods(namespace, &selector)),
        )?;

        let has_mesh = any_has_sidecar(&pods, &self.sidecar_annotation);
        let rates = if has_mesh {
            let samples = ctx
                .guard(
                    "app request rates",
                    self.metrics.app_request_rates(namespace, app, interval, query_time),
                )
                .await?;
            Some(parse_rates(&samples, &EntityRef::app(namespace, app)))
        } else {
            debug!("app {}/{} has no sidecar, skipping request rates", namespace, app);
            None
        };

        let status = sum_workload_status(app, deployments_for_app(&deployments, app));
        Ok(report::app_health(status, rates.as_ref(), has_mesh))
    }

    pub async fn workload_health(
        &self,
        ctx: &RequestContext,
        namespace: &str,
        workload: &str,
        rate_interval: &str,
        query_time: DateTime<Utc>,
    ) -> HealthResult<WorkloadHealth> {
        let interval = validate_interval(rate_interval)?;
        validate_name("namespace", namespace)?;
        validate_name("workload", workload)?;

        let (deployment, pods) = tokio::try_join!(
            ctx.guard("get deployment", self.orchestrator.deployment(namespace, workload)),
            ctx.guard("list pods", self.orchestrator.pods(namespace, "")),
        )?;

        let selected = pods_for_deployment(&deployment, &pods);
        let has_mesh = any_has_sidecar(selected, &self.sidecar_annotation);
        let rates = if has_mesh {
            let samples = ctx
                .guard(
                    "workload request rates",
                    self.metrics.workload_request_rates(namespace, workload, interval, query_time),
                )
                .await?;
            Some(parse_rates(&samples, &EntityRef::workload(namespace, workload)))
        } else {
            debug!("workload {}/{} has no sidecar, skipping request rates", namespace, workload);
            None
        };

        let status = workload_status(workload, Some(&deployment));
        Ok(report::workload_health(status, rates.as_ref(), has_mesh))
    }

    pub async fn namespace_app_health(
        &self,
        ctx: &RequestContext,
        namespace: &str,
        rate_interval: &str,
        query_time: DateTime<Utc>,
    ) -> HealthResult<NamespaceAppHealth> {
        let interval = validate_interval(rate_interval)?;
        validate_name("namespace", namespace)?;

        let platform = ctx
            .guard("platform probe", async {
                Ok::<_, HealthError>(self.orchestrator.is_mesh_platform().await)
            })
            .await?;
        // DeploymentConfig pods are not guaranteed to carry the app label
        let pod_selector = if platform { "" } else { APP_LABEL };

        let (deployments, pods, services) = tokio::try_join!(
            ctx.guard("list deployments", self.orchestrator.deployments(namespace)),
            ctx.guard("list pods", self.orchestrator.pods(namespace, pod_selector)),
            ctx.guard("list services", self.orchestrator.services(namespace, APP_LABEL)),
        )?;

        let mut apps: BTreeMap<String, Vec<&Pod>> = BTreeMap::new();
        for pod in &pods {
            if let Some(app) = pod.labels.get(APP_LABEL) {
                apps.entry(app.clone()).or_default().push(pod);
            }
        }
        for d in &deployments {
            if let Some(app) = d.selector.get(APP_LABEL) {
                apps.entry(app.clone()).or_default();
            }
        }
        for s in &services {
            for app in [s.labels.get(APP_LABEL), s.selector.get(APP_LABEL)].into_iter().flatten() {
                apps.entry(app.clone()).or_default();
            }
        }

        let meshed: BTreeMap<&str, bool> = apps
            .iter()
            .map(|(app, pods)| {
                let has_mesh = any_has_sidecar(pods.iter().copied(), &self.sidecar_annotation);
                (app.as_str(), has_mesh)
            })
            .collect();
        let samples = self
            .batched_rates(ctx, namespace, interval, query_time, meshed.values().any(|m| *m))
            .await?;

        Ok(meshed
            .into_iter()
            .map(|(app, has_mesh)| {
                let entity = EntityRef::app(namespace, app);
                let rates = rates_for(samples.as_deref(), has_mesh, &entity);
                let status = sum_workload_status(app, deployments_for_app(&deployments, app));
                (app.to_string(), report::app_health(status, rates.as_ref(), has_mesh))
            })
            .collect())
    }

    pub async fn namespace_workload_health(
        &self,
        ctx: &RequestContext,
        namespace: &str,
        rate_interval: &str,
        query_time: DateTime<Utc>,
    ) -> HealthResult<NamespaceWorkloadHealth> {
        let interval = validate_interval(rate_interval)?;
        validate_name("namespace", namespace)?;

        let (deployments, pods) = tokio::try_join!(
            ctx.guard("list deployments", self.orchestrator.deployments(namespace)),
            ctx.guard("list pods", self.orchestrator.pods(namespace, "")),
        )?;

        // (status, has_mesh) per workload; pods no deployment selects stand alone
        let mut workloads: BTreeMap<String, (WorkloadStatus, bool)> = BTreeMap::new();
        for d in &deployments {
            let selected = pods_for_deployment(d, &pods);
            let has_mesh = any_has_sidecar(selected, &self.sidecar_annotation);
            workloads.insert(d.name.clone(), (workload_status(&d.name, Some(d)), has_mesh));
        }
        for pod in &pods {
            let owned = deployments.iter().any(|d| selector_matches(&d.selector, &pod.labels));
            if !owned && !pod.name.is_empty() {
                let has_mesh = any_has_sidecar([pod], &self.sidecar_annotation);
                workloads
                    .entry(pod.name.clone())
                    .or_insert_with(|| (workload_status(&pod.name, None), has_mesh));
            }
        }

        let any_mesh = workloads.values().any(|(_, m)| *m);
        let samples = self
            .batched_rates(ctx, namespace, interval, query_time, any_mesh)
            .await?;

        Ok(workloads
            .into_iter()
            .map(|(name, (status, has_mesh))| {
                let entity = EntityRef::workload(namespace, &name);
                let rates = rates_for(samples.as_deref(), has_mesh, &entity);
                let health = report::workload_health(status, rates.as_ref(), has_mesh);
                (name, health)
            })
            .collect())
    }

    /// Health of every service in the namespace, with one batched rates query.
    pub async fn namespace_service_health(
        &self,
        ctx: &RequestContext,
        namespace: &str,
        rate_interval: &str,
        query_time: DateTime<Utc>,
    ) -> HealthResult<NamespaceServiceHealth> {
        let interval = validate_interval(rate_interval)?;
        validate_name("namespace", namespace)?;

        let (services, pods) = tokio::try_join!(
            ctx.guard("list services", self.orchestrator.services(namespace, "")),
            ctx.guard("list pods", self.orchestrator.pods(namespace, "")),
        )?;

        let meshed: BTreeMap<&str, bool> = services
            .iter()
            .filter(|s| !s.name.is_empty())
            .map(|s| {
                let backing = pods.iter().filter(|p| selector_matches(&s.selector, &p.labels));
                (s.name.as_str(), any_has_sidecar(backing, &self.sidecar_annotation))
            })
            .collect();
        let samples = self
            .batched_rates(ctx, namespace, interval, query_time, meshed.values().any(|m| *m))
            .await?;

        Ok(meshed
            .into_iter()
            .map(|(name, has_mesh)| {
                let entity = EntityRef::service(namespace, name);
                let rates = rates_for(samples.as_deref(), has_mesh, &entity);
                (name.to_string(), report::service_health(rates.as_ref()))
            })
            .collect())
    }

    /// Namespace view selected by `kind`.
    pub async fn namespace_health(
        &self,
        ctx: &RequestContext,
        kind: HealthKind,
        namespace: &str,
        rate_interval: &str,
        query_time: DateTime<Utc>,
    ) -> HealthResult<NamespaceHealth> {
        let namespace_owned = namespace.to_string();
        Ok(match kind {
            HealthKind::App => NamespaceHealth::App {
                entities: self
                    .namespace_app_health(ctx, namespace, rate_interval, query_time)
                    .await?,
                namespace: namespace_owned,
                query_time,
            },
            HealthKind::Workload => NamespaceHealth::Workload {
                entities: self
                    .namespace_workload_health(ctx, namespace, rate_interval, query_time)
                    .await?,
                namespace: namespace_owned,
                query_time,
            },
            HealthKind::Service => NamespaceHealth::Service {
                entities: self
                    .namespace_service_health(ctx, namespace, rate_interval, query_time)
                    .await?,
                namespace: namespace_owned,
                query_time,
            },
        })
    }

    // One namespace-wide rates query shared by every entity, only when some
    // entity is meshed.
    async fn batched_rates(
        &self,
        ctx: &RequestContext,
        namespace: &str,
        rate_interval: &str,
        query_time: DateTime<Utc>,
        any_mesh: bool,
    ) -> HealthResult<Option<SampleVector>> {
        if !any_mesh {
            debug!("no sidecar in namespace {}, skipping request rates", namespace);
            return Ok(None);
        }
        let samples = ctx
            .guard(
                "namespace request rates",
                self.metrics.all_request_rates(namespace, rate_interval, query_time),
            )
            .await?;
        Ok(Some(samples))
    }
}

fn rates_for(samples: Option<&[Sample]>, has_mesh: bool, entity: &EntityRef) -> Option<RateBundle> {
    match samples {
        Some(s) if has_mesh => Some(parse_rates(s, entity)),
        _ => None,
    }
}

