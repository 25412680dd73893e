use crate::metrics::{RateBundle, RateTotals};
use crate::types::*;

fn ratio(t: RateTotals) -> f64 {
    if t.total > 0.0 {
        t.errors / t.total
    } else {
        NO_DATA
    }
}

fn combine(inbound: RateTotals, outbound: RateTotals) -> RequestHealth {
    let inbound_error_ratio = ratio(inbound);
    let outbound_error_ratio = ratio(outbound);
    let error_ratio = ratio(RateTotals {
        errors: inbound.errors + outbound.errors,
        total: inbound.total + outbound.total,
    });
    RequestHealth {
        inbound_error_ratio,
        outbound_error_ratio,
        error_ratio,
    }
}

/// Error ratios for an entity, or all `-1` when it is outside the mesh or no
/// rates were fetched.
pub fn request_health(rates: Option<&RateBundle>, has_mesh: bool) -> RequestHealth {
    match rates {
        Some(r) if has_mesh => combine(r.inbound_totals(), r.outbound_totals()),
        _ => RequestHealth::no_data(),
    }
}

/// Services only have inbound semantics; the outbound side is never reported.
pub fn service_health(rates: Option<&RateBundle>) -> ServiceHealth {
    let requests = match rates {
        Some(r) => combine(r.inbound_totals(), RateTotals::default()),
        None => RequestHealth::no_data(),
    };
    ServiceHealth { requests }
}

pub fn app_health(status: WorkloadStatus, rates: Option<&RateBundle>, has_mesh: bool) -> AppHealth {
    AppHealth {
        workload_status: status,
        requests: request_health(rates, has_mesh),
    }
}

pub fn workload_health(
    status: WorkloadStatus,
    rates: Option<&RateBundle>,
    has_mesh: bool,
) -> WorkloadHealth {
    WorkloadHealth {
        workload_status: status,
        requests: request_health(rates, has_mesh),
    }
}

/// Counts over a set of namespace reports
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HealthSummary {
    pub entity_count: usize,
    pub erroring_count: usize,
    /// Unmeshed entities plus meshed ones that saw no traffic
    pub no_data_count: usize,
}

impl HealthSummary {
    pub fn from_reports(reports: &[NamespaceHealth]) -> Self {
        let mut summary = HealthSummary::default();
        for report in reports {
            for (_, requests) in report.request_health() {
                summary.entity_count += 1;
                if !requests.has_data() {
                    summary.no_data_count += 1;
                } else if requests.error_ratio > 0.0 {
                    summary.erroring_count += 1;
                }
            }
        }
        summary
    }

    pub fn has_issues(&self) -> bool {
        self.erroring_count > 0
    }
}
