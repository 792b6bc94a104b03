use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("unknown log format {0:?}, expected text, json or journald")]
    InvalidFormat(String),
    #[error("journald output needs linux and the `journald` feature")]
    JournaldNotSupported,
    #[error("journald socket is unavailable: {0}")]
    Journald(#[from] std::io::Error),
    #[error("a global tracing subscriber is already installed")]
    AlreadyInitialized,
    #[error("tracing subscriber could not be installed: {0}")]
    InitializationFailed(#[from] tracing_subscriber::util::TryInitError),
    #[error("invalid log filter {0:?}")]
    InvalidLogLevel(String),
}
