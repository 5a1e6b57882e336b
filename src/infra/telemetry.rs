use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing::level_filters::LevelFilter;
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

const CRATE_TARGET: &str = env!("CARGO_CRATE_NAME");
/// Level applied to everything outside this crate when `RUST_LOG` is unset.
const HOST_LEVEL: LevelFilter = LevelFilter::WARN;

/// Install a global tracing subscriber using the provided logging settings.
///
/// `RUST_LOG` takes precedence. Without it the configured level applies to
/// memo events only and the host's own targets stay at `warn`.
/// Fails if a global subscriber is already installed.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_directives(logging.level)).map_err(|err| {
            InfraError::telemetry(format!("invalid default log directives: {err}"))
        })?,
    };

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn default_directives(level: LevelFilter) -> String {
    format!("{HOST_LEVEL},{CRATE_TARGET}={level}")
}

/// Register descriptions for every counter the memo engine emits.
///
/// Safe to call repeatedly; only the first call registers.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "memento_hit_total",
            Unit::Count,
            "Total number of memoized calls served from cache."
        );
        describe_counter!(
            "memento_miss_total",
            Unit::Count,
            "Total number of memoized calls that ran the wrapped body."
        );
        describe_counter!(
            "memento_failure_total",
            Unit::Count,
            "Total number of wrapped bodies that returned an error (never cached)."
        );
        describe_counter!(
            "memento_stale_write_total",
            Unit::Count,
            "Total number of results discarded because a reset happened mid-call."
        );
        describe_counter!(
            "memento_reset_total",
            Unit::Count,
            "Total number of cache resets, by scope and granularity."
        );
    });
}
