//! Tracing subscriber bootstrap shared by the bookshelf binaries.

use bookshelf_kernel::settings::{LogFormat, TelemetrySettings};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build the filter: `RUST_LOG` when set, otherwise the configured directive.
pub fn env_filter(settings: &TelemetrySettings) -> anyhow::Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&settings.log_filter).map_err(|err| {
            anyhow::anyhow!("invalid log filter '{}': {}", settings.log_filter, err)
        }),
    }
}

/// Install the global tracing subscriber.
///
/// Calling it twice is harmless; the second install is skipped.
pub fn init(settings: &TelemetrySettings) -> anyhow::Result<()> {
    let filter = env_filter(settings)?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match settings.log_format {
        LogFormat::Pretty => registry.with(fmt::layer().with_target(true)).try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(true))
            .try_init(),
    };

    if installed.is_ok() {
        tracing::debug!(
            target: "bookshelf-telemetry",
            format = ?settings.log_format,
            "tracing subscriber installed"
        );
    }

    Ok(())
}
