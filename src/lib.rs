// Public modules
pub mod types;
pub mod error;
pub mod config;
pub mod parsing;
pub mod context;
pub mod kubernetes;
pub mod prometheus;
pub mod metrics;
pub mod collector;
pub mod report;

// Re-export commonly used items
pub use types::*;
pub use error::{HealthError, HealthResult};
pub use config::{
    load_config, load_config_with_env, EnvironmentProvider, MockEnvironment, SystemEnvironment,
};
pub use parsing::{parse_rate_interval, is_error_code};
pub use context::RequestContext;
pub use kubernetes::{Orchestrator, KubeOrchestrator};
pub use prometheus::{MetricsSource, PrometheusClient};
pub use metrics::*;
pub use collector::HealthService;
pub use report::HealthSummary;
