use thiserror::Error;

/// Core error type for the gateway.
/// Internally, modules can use `anyhow::Result<T>` for convenience,
/// but public boundaries should expose `CoreResult<T>` with this error.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("service unavailable: {service}")]
    Unavailable { service: String },

    #[error("upstream error from {service}: {status} {message}")]
    UpstreamStatus {
        service: String,
        status: u16,
        message: String,
    },

    #[error("upstream {service} returned no body")]
    EmptyBody { service: String },

    #[error("decode error from {service}: {message}")]
    Decode { service: String, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GatewayError {
    /// HTTP status reported by the upstream, if the failure carried one.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            Self::UpstreamStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Short stable label for logs and telemetry.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Unavailable { .. } => "unavailable",
            Self::UpstreamStatus { .. } => "upstream_status",
            Self::EmptyBody { .. } => "empty_body",
            Self::Decode { .. } => "decode",
            Self::Io(_) => "io",
            Self::Other(_) => "other",
        }
    }
}

pub type CoreResult<T> = std::result::Result<T, GatewayError>;
