use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use crate::metrics::ISTIO_SIDECAR_ANNOTATION;
use crate::parsing::parse_rate_interval;
use crate::types::{Config, HealthKind};

/// Trait for abstracting environment variable access
pub trait EnvironmentProvider {
    fn get_var(&self, key: &str) -> Option<String>;
}

/// Production implementation using std::env
pub struct SystemEnvironment;

impl EnvironmentProvider for SystemEnvironment {
    fn get_var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Mock implementation for testing
#[derive(Debug, Default)]
pub struct MockEnvironment {
    vars: HashMap<String, String>,
}

impl MockEnvironment {
    pub fn new() -> Self {
        Self {
            vars: HashMap::new(),
        }
    }
    
    pub fn set_var<K, V>(&mut self, key: K, value: V) -> &mut Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.vars.insert(key.into(), value.into());
        self
    }
    
    pub fn with_var<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.set_var(key, value);
        self
    }
}

impl EnvironmentProvider for MockEnvironment {
    fn get_var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

pub const DEFAULT_PROMETHEUS_URL: &str = "http://prometheus.istio-system:9090";

pub fn load_config() -> Result<Config> {
    load_config_with_env(&SystemEnvironment)
}

pub fn load_config_with_env<E: EnvironmentProvider>(env: &E) -> Result<Config> {
    let namespaces = env.get_var("NAMESPACES").unwrap_or_default();
    let namespaces: Vec<String> = namespaces
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if namespaces.is_empty() {
        return Err(anyhow!("NAMESPACES env var must be set (comma-separated)"));
    }

    let prometheus_url = env.get_var("PROMETHEUS_URL")
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_PROMETHEUS_URL.to_string());
    if !prometheus_url.starts_with("http://") && !prometheus_url.starts_with("https://") {
        return Err(anyhow!("PROMETHEUS_URL must be an http(s) URL, got {}", prometheus_url));
    }

    let rate_interval = env.get_var("RATE_INTERVAL")
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| "1m".to_string());
    parse_rate_interval(&rate_interval)
        .with_context(|| format!("Invalid RATE_INTERVAL {:?}", rate_interval))?;

    let query_timeout_seconds: u64 = env.get_var("QUERY_TIMEOUT_SECONDS")
        .unwrap_or_else(|| "30".to_string())
        .parse()
        .ok()
        .filter(|v| *v > 0)
        .unwrap_or(30);

    let health_kind = match env.get_var("HEALTH_KIND").map(|v| v.trim().to_lowercase()).as_deref() {
        None | Some("") | Some("app") => HealthKind::App,
        Some("workload") => HealthKind::Workload,
        Some("service") => HealthKind::Service,
        Some(other) => {
            return Err(anyhow!("Invalid HEALTH_KIND {:?} (app, workload or service)", other))
        }
    };

    let sidecar_annotation = env.get_var("ISTIO_SIDECAR_ANNOTATION")
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| ISTIO_SIDECAR_ANNOTATION.to_string());

    Ok(Config {
        namespaces,
        prometheus_url,
        rate_interval,
        query_timeout_seconds,
        health_kind,
        sidecar_annotation,
    })
}
