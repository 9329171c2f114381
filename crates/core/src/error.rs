use thiserror::Error;

/// Top-level error type shared by every cpumeter crate.
#[derive(Debug, Error)]
pub enum MeterError {
    /// No CPU-usage provider can be obtained on this host.
    #[error("platform unsupported: {0}")]
    PlatformUnsupported(String),

    #[error("sampling session is already running")]
    AlreadyRunning,

    /// An aggregate was requested before any sample was recorded.
    #[error("no samples recorded")]
    NoData,

    #[error("invalid interval: {0} ms (must be greater than zero)")]
    InvalidInterval(u64),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("no tokio runtime available to drive the sampling loop")]
    NoRuntime,

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

pub type Result<T, E = MeterError> = std::result::Result<T, E>;
