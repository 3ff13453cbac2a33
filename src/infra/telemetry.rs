//! Tracing subscriber and metric descriptions.

use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

pub const HTTP_REQUEST_MS: &str = "penmark_http_request_ms";

enum MetricKind {
    Counter,
    Histogram,
}

const METRICS: &[(&str, MetricKind, Unit, &str)] = &[
    (
        "penmark_cache_hit_total",
        MetricKind::Counter,
        Unit::Count,
        "Read-path cache hits, labelled by namespace.",
    ),
    (
        "penmark_cache_miss_total",
        MetricKind::Counter,
        Unit::Count,
        "Read-path cache misses, labelled by namespace.",
    ),
    (
        "penmark_cache_evict_total",
        MetricKind::Counter,
        Unit::Count,
        "Entries evicted by the expiry sweep.",
    ),
    (
        "penmark_cache_invalidated_total",
        MetricKind::Counter,
        Unit::Count,
        "Entries purged after a mutation, labelled by mutation kind.",
    ),
    (
        HTTP_REQUEST_MS,
        MetricKind::Histogram,
        Unit::Milliseconds,
        "Request latency, labelled by method, route and status class.",
    ),
];

static DESCRIBED: Once = Once::new();

/// Install the global subscriber. `RUST_LOG` refines the configured level.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    DESCRIBED.call_once(|| {
        for (name, kind, unit, description) in METRICS {
            match kind {
                MetricKind::Counter => describe_counter!(*name, *unit, *description),
                MetricKind::Histogram => describe_histogram!(*name, *unit, *description),
            }
        }
    });

    let filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(ErrorLayer::default());

    let installed = match logging.format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(true).with_target(true))
            .try_init(),
        LogFormat::Compact => registry
            .with(fmt::layer().compact().with_target(true))
            .try_init(),
    };
    installed.map_err(|err| InfraError::telemetry(format!("tracing subscriber: {err}")))
}
