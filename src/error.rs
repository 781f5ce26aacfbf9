use thiserror::Error;

/// Malformed port specification.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid port range format: {0}")]
    InvalidRange(String),
    #[error("invalid start of port range: {0}")]
    InvalidRangeStart(String),
    #[error("invalid end of port range: {0}")]
    InvalidRangeEnd(String),
    #[error("invalid port number: {0}")]
    InvalidPort(String),
    #[error("port out of range (1-65535): {0}")]
    OutOfRange(String),
}

/// Rejected scan configuration. Always raised before any scanning starts.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid minimum packet rate: {0}")]
    InvalidPacketRate(String),
    #[error("invalid delay duration: {0}")]
    InvalidDuration(String),
    #[error("invalid number of threads: {0}")]
    InvalidThreadCount(String),
    #[error("invalid connect timeout: {0}")]
    InvalidTimeout(String),
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to resolve `{host}`: {source}")]
    Resolve {
        host: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{0}` did not resolve to any address")]
    NoAddress(String),
    #[error("job queue closed before all jobs were published")]
    QueueClosed,
    #[error("scan worker failed: {0}")]
    Worker(#[source] tokio::task::JoinError),
    #[error("scan incomplete: {completed} of {dispatched} jobs processed")]
    Incomplete { dispatched: usize, completed: usize },
}
