// Signal readers: request rates, sidecar presence and replica status
pub mod base;
pub mod rates;
pub mod sidecar;
pub mod deployments;

// Re-export commonly used items
pub use base::{EntityKind, EntityRef, Direction};
pub use rates::{parse_rates, RateBundle, RateTotals};
pub use sidecar::{has_sidecar, any_has_sidecar, ISTIO_SIDECAR_ANNOTATION};
pub use deployments::{
    workload_status, sum_workload_status, selector_matches,
    deployments_for_app, pods_for_deployment, APP_LABEL
};
