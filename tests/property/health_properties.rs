//! Property tests for ratio assembly, sidecar gating, metrics batching and
//! replica aggregation.

#[path = "../common/mod.rs"]
mod common;

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use proptest::prelude::*;

use common::*;
use mesh_health::report::request_health;
use mesh_health::{
    parse_rates, Deployment, EntityRef, HealthService, Pod, RequestContext, RequestHealth, Sample,
    NO_DATA,
};

static APPS: [&str; 4] = ["reviews", "productpage", "details", "unknown"];
static CODES: [&str; 6] = ["200", "302", "404", "500", "503", "UNAVAILABLE"];
static SIDECAR_OFF: [&str; 2] = ["", "false"];

fn block_on<F: Future>(fut: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
        .block_on(fut)
}

fn rate_strategy() -> impl Strategy<Value = f64> {
    prop_oneof![Just(0.0), 0.0_f64..1e-6, 0.0_f64..10.0, 0.0_f64..1e12]
}

// (source, destination, code, rate) drawn from a small name pool.
fn sample_strategy(sources: &'static [&'static str]) -> impl Strategy<Value = Sample> {
    (
        prop::sample::select(sources),
        prop::sample::select(&APPS[..]),
        prop::sample::select(&CODES[..]),
        rate_strategy(),
    )
        .prop_map(|(src, dst, code, rate)| {
            Sample::new(
                &[("source_app", src), ("destination_app", dst), ("response_code", code)],
                rate,
            )
        })
}

// A `sidecar` of None leaves the annotation off; Some carries a value that
// does not count as injected.
fn unmeshed_pod_strategy() -> impl Strategy<Value = Pod> {
    (
        0_usize..1000,
        prop::sample::select(&APPS[..]),
        prop::option::of(prop::sample::select(&SIDECAR_OFF[..])),
    )
        .prop_map(|(i, app, sidecar)| {
            let mut p = pod(&format!("{}-{}", app, i), &[("app", app)], false);
            if let Some(value) = sidecar {
                p.annotations
                    .insert(mesh_health::ISTIO_SIDECAR_ANNOTATION.to_string(), value.to_string());
            }
            p
        })
}

fn any_pod_strategy() -> impl Strategy<Value = Pod> {
    (0_usize..1000, prop::sample::select(&APPS[..]), any::<bool>())
        .prop_map(|(i, app, meshed)| pod(&format!("{}-{}", app, i), &[("app", app)], meshed))
}

fn deployment_strategy() -> impl Strategy<Value = Deployment> {
    (
        0_usize..1000,
        prop::sample::select(&APPS[..]),
        (0_u32..50, 0_u32..50, 0_u32..50),
    )
        .prop_map(|(i, app, replicas)| {
            deployment(&format!("{}-v{}", app, i), &[("app", app), ("version", "v1")], replicas)
        })
}

fn in_range(ratio: f64) -> bool {
    ratio == NO_DATA || (0.0..=1.0).contains(&ratio)
}

fn is_no_data(r: &RequestHealth) -> bool {
    r.inbound_error_ratio == NO_DATA
        && r.outbound_error_ratio == NO_DATA
        && r.error_ratio == NO_DATA
}

fn service_over(
    deployments: Vec<Deployment>,
    pods: Vec<Pod>,
) -> (HealthService, Arc<MockMetrics>) {
    let services = APPS.iter().map(|app| service(app, &[("app", *app)])).collect();
    let orchestrator =
        Arc::new(MockOrchestrator { deployments, pods, services, ..Default::default() });
    let metrics = Arc::new(MockMetrics {
        app_rates: reviews_rates(),
        workload_rates: reviews_v1_rates(),
        service_rates: service_rates(),
        all_rates: reviews_rates(),
        ..Default::default()
    });
    (HealthService::new(orchestrator, metrics.clone()), metrics)
}

proptest! {
    #[test]
    fn ratios_stay_in_range_and_combine(
        samples in prop::collection::vec(sample_strategy(&APPS), 0..20)
    ) {
        let rates = parse_rates(&samples, &EntityRef::app("ns", "reviews"));
        let r = request_health(Some(&rates), true);

        for ratio in [r.inbound_error_ratio, r.outbound_error_ratio, r.error_ratio] {
            prop_assert!(in_range(ratio), "ratio {} out of range", ratio);
        }
        prop_assert_eq!(
            r.error_ratio == NO_DATA,
            r.inbound_error_ratio == NO_DATA && r.outbound_error_ratio == NO_DATA
        );
        if r.outbound_error_ratio == NO_DATA {
            prop_assert_eq!(r.error_ratio, r.inbound_error_ratio);
        }
        if r.inbound_error_ratio == NO_DATA {
            prop_assert_eq!(r.error_ratio, r.outbound_error_ratio);
        }
    }

    #[test]
    fn inbound_only_traffic_sets_combined_ratio(
        samples in prop::collection::vec(sample_strategy(&APPS[1..]), 0..20)
    ) {
        let rates = parse_rates(&samples, &EntityRef::app("ns", "reviews"));
        let r = request_health(Some(&rates), true);

        prop_assert_eq!(r.outbound_error_ratio, NO_DATA);
        prop_assert_eq!(r.error_ratio, r.inbound_error_ratio);
    }

    #[test]
    fn unmeshed_pods_never_reach_metrics(
        pods in prop::collection::vec(unmeshed_pod_strategy(), 0..12),
        deployments in prop::collection::vec(deployment_strategy(), 0..6)
    ) {
        let (hs, metrics) = service_over(deployments, pods);
        let ctx = RequestContext::new();

        let app = block_on(hs.app_health(&ctx, "ns", "reviews", "1m", query_time())).unwrap();
        prop_assert!(is_no_data(&app.requests));

        let apps = block_on(hs.namespace_app_health(&ctx, "ns", "1m", query_time())).unwrap();
        for health in apps.values() {
            prop_assert!(is_no_data(&health.requests));
        }
        let workloads =
            block_on(hs.namespace_workload_health(&ctx, "ns", "1m", query_time())).unwrap();
        for health in workloads.values() {
            prop_assert!(is_no_data(&health.requests));
        }

        prop_assert_eq!(metrics.total_calls(), 0);
    }

    #[test]
    fn namespace_views_query_metrics_at_most_once(
        pods in prop::collection::vec(any_pod_strategy(), 0..12),
        deployments in prop::collection::vec(deployment_strategy(), 0..6)
    ) {
        let ctx = RequestContext::new();

        let (hs, metrics) = service_over(deployments.clone(), pods.clone());
        block_on(hs.namespace_app_health(&ctx, "ns", "1m", query_time())).unwrap();
        prop_assert!(metrics.total_calls() <= 1);
        prop_assert_eq!(metrics.total_calls(), metrics.all_calls.load(Ordering::SeqCst));

        let (hs, metrics) = service_over(deployments.clone(), pods.clone());
        block_on(hs.namespace_workload_health(&ctx, "ns", "1m", query_time())).unwrap();
        prop_assert!(metrics.total_calls() <= 1);
        prop_assert_eq!(metrics.total_calls(), metrics.all_calls.load(Ordering::SeqCst));

        let (hs, metrics) = service_over(deployments, pods);
        block_on(hs.namespace_service_health(&ctx, "ns", "1m", query_time())).unwrap();
        prop_assert!(metrics.total_calls() <= 1);
        prop_assert_eq!(metrics.total_calls(), metrics.all_calls.load(Ordering::SeqCst));
    }

    #[test]
    fn app_replicas_sum_across_deployments(
        deployments in prop::collection::vec(deployment_strategy(), 0..8),
        meshed in any::<bool>()
    ) {
        let mut expected: BTreeMap<String, (u32, u32, u32)> = BTreeMap::new();
        for d in &deployments {
            if let Some(app) = d.selector.get("app") {
                let e = expected.entry(app.clone()).or_default();
                e.0 += d.status.replicas;
                e.1 += d.status.available_replicas;
                e.2 += d.status.unavailable_replicas;
            }
        }

        let (hs, _) = service_over(deployments, reviews_pods(meshed));
        let ctx = RequestContext::new();
        let health = block_on(hs.app_health(&ctx, "ns", "reviews", "1m", query_time())).unwrap();
        let (desired, available, unavailable) =
            expected.get("reviews").copied().unwrap_or_default();

        prop_assert_eq!(health.workload_status.name.as_str(), "reviews");
        prop_assert_eq!(health.workload_status.desired_replicas, desired);
        prop_assert_eq!(health.workload_status.available_replicas, available);
        prop_assert_eq!(health.workload_status.unavailable_replicas, unavailable);
    }
}
