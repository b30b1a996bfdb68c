use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

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

/// Register descriptions for every cache metric. Safe to call repeatedly.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "quire_cache_l1_hit_total",
            Unit::Count,
            "Reads answered by the memory tier."
        );
        describe_counter!(
            "quire_cache_l1_miss_total",
            Unit::Count,
            "Reads that fell through the memory tier."
        );
        describe_counter!(
            "quire_cache_backing_hit_total",
            Unit::Count,
            "Reads answered by the backing store."
        );
        describe_counter!(
            "quire_cache_backing_miss_total",
            Unit::Count,
            "Reads the backing store could not answer."
        );
        describe_counter!(
            "quire_cache_backing_error_total",
            Unit::Count,
            "Backing-store commands that failed and were degraded, by op."
        );
        describe_counter!(
            "quire_cache_corrupt_total",
            Unit::Count,
            "Cached payloads that failed to decode and were deleted."
        );
        describe_counter!(
            "quire_cache_index_hit_total",
            Unit::Count,
            "List requests served from a cached view, by view."
        );
        describe_counter!(
            "quire_cache_index_cold_total",
            Unit::Count,
            "List builds that fell back to the content store, by view."
        );
        describe_histogram!(
            "quire_cache_index_build_ms",
            Unit::Milliseconds,
            "Time to rebuild a list view in milliseconds."
        );
    });
}
