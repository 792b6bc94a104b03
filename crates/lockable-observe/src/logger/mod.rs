mod config;
mod error;
mod format;
mod log;

pub use config::LoggerConfig;
pub use error::LoggerError;
pub use format::LoggerFormat;

/// Install the process-wide tracing subscriber.
///
/// Fails with [`LoggerError::AlreadyInitialized`] if any global subscriber
/// is already in place, including one installed by another library.
pub fn logger_init(cfg: &LoggerConfig) -> Result<(), LoggerError> {
    log::install(cfg)
}
