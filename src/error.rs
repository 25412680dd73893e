use thiserror::Error;

/// Failure kinds surfaced by the health operations.
///
/// No operation returns a partial report: any of these aborts the request.
#[derive(Debug, Error)]
pub enum HealthError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("request cancelled")]
    Cancelled,
}

pub type HealthResult<T> = std::result::Result<T, HealthError>;

impl HealthError {
    pub fn validation(msg: impl Into<String>) -> Self {
        HealthError::Validation(msg.into())
    }

    pub fn upstream(msg: impl Into<String>) -> Self {
        HealthError::UpstreamUnavailable(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, HealthError::NotFound(_))
    }
}

impl From<kube::Error> for HealthError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(ref resp) if resp.code == 404 => {
                HealthError::NotFound(resp.message.clone())
            }
            other => HealthError::UpstreamUnavailable(format!("orchestrator: {}", other)),
        }
    }
}

impl From<reqwest::Error> for HealthError {
    fn from(err: reqwest::Error) -> Self {
        HealthError::UpstreamUnavailable(format!("metrics backend: {}", err))
    }
}
