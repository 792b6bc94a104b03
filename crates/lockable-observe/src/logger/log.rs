use tracing::Subscriber;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, time::OffsetTime},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
};

use crate::logger::{config::LoggerConfig, error::LoggerError, format::LoggerFormat};

/// Install the global subscriber described by `cfg`.
pub(crate) fn install(cfg: &LoggerConfig) -> Result<(), LoggerError> {
    if tracing::dispatcher::has_been_set() {
        return Err(LoggerError::AlreadyInitialized);
    }
    let filter = filter(&cfg.level)?;
    let output = output_layer(cfg)?;
    tracing_subscriber::registry()
        .with(filter)
        .with(output)
        .try_init()?;
    Ok(())
}

/// Parse an `EnvFilter` directive such as `info,lockable_core=debug`.
pub(crate) fn filter(level: &str) -> Result<EnvFilter, LoggerError> {
    if level.trim().is_empty() {
        return Err(LoggerError::InvalidLogLevel(level.to_string()));
    }
    EnvFilter::try_new(level).map_err(|_| LoggerError::InvalidLogLevel(level.to_string()))
}

fn output_layer<S>(cfg: &LoggerConfig) -> Result<Box<dyn Layer<S> + Send + Sync>, LoggerError>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let layer = match cfg.format {
        LoggerFormat::Text => fmt::layer()
            .with_ansi(cfg.use_color)
            .with_target(cfg.with_targets)
            .with_timer(timer())
            .boxed(),
        LoggerFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(cfg.with_targets)
            .with_timer(timer())
            .boxed(),
        LoggerFormat::Journald => journald()?,
    };
    Ok(layer)
}

/// RFC3339 timestamps in the local offset, UTC when it cannot be determined.
fn timer() -> OffsetTime<time::format_description::well_known::Rfc3339> {
    OffsetTime::local_rfc_3339().unwrap_or_else(|_| {
        OffsetTime::new(
            time::UtcOffset::UTC,
            time::format_description::well_known::Rfc3339,
        )
    })
}

#[cfg(all(target_os = "linux", feature = "journald"))]
fn journald<S>() -> Result<Box<dyn Layer<S> + Send + Sync>, LoggerError>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    Ok(tracing_journald::layer()?
        .with_syslog_identifier("lockable".to_string())
        .boxed())
}

#[cfg(not(all(target_os = "linux", feature = "journald")))]
fn journald<S>() -> Result<Box<dyn Layer<S> + Send + Sync>, LoggerError>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    Err(LoggerError::JournaldNotSupported)
}
