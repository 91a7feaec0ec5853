use crate::Environment;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::{prelude::*, EnvFilter};

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Install color-eyre with a project-standard configuration.
///
/// Call this early in main() before any fallible operations. Safe to call multiple times.
pub fn install_color_eyre() {
    let _ = color_eyre::config::HookBuilder::default()
        .display_location_section(true)
        .display_env_section(false)
        .install();
}

/// Parse a configured log level, case-insensitively. `None` for unknown names.
pub fn parse_level(level: &str) -> Option<Level> {
    level.trim().parse::<Level>().ok()
}

/// Initialize tracing with environment-aware output and error span capture.
///
/// - **Production** (`APP_ENV=production`): flattened JSON events, no module targets
/// - **Development** (default): pretty, human-readable output
///
/// `RUST_LOG` overrides `level` entirely. An unknown `level` falls back to `info`
/// with a warning instead of aborting startup.
///
/// Safe to call multiple times; later calls are no-ops (common in tests).
pub fn init_tracing(environment: &Environment, level: &str) {
    let resolved = parse_level(level);
    let default_directive = resolved
        .map(|l| l.to_string().to_lowercase())
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&default_directive));

    let result = if environment.is_production() {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(false)
                    .flatten_event(true),
            )
            .with(tracing_error::ErrorLayer::default())
            .with(filter)
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_file(false)
                    .with_line_number(false)
                    .pretty(),
            )
            .with(tracing_error::ErrorLayer::default())
            .with(filter)
            .try_init()
    };

    match result {
        Ok(_) => {
            if resolved.is_none() {
                warn!(
                    configured = %level,
                    fallback = DEFAULT_LOG_LEVEL,
                    "Unexpected log level, using default"
                );
            }
            info!(environment = ?environment, level = %default_directive, "Tracing initialized");
        }
        Err(_) => {
            debug!("Tracing already initialized, skipping re-initialization");
        }
    }
}
