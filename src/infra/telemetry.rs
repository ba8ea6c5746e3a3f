use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::application::banners::METRIC_BULK_DELETE;
use crate::cache::{METRIC_ERROR, METRIC_LOCAL_HIT, METRIC_MISS, METRIC_REMOTE_HIT};
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

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_LOCAL_HIT,
            Unit::Count,
            "Total number of banner content hits in the local cache tier."
        );
        describe_counter!(
            METRIC_REMOTE_HIT,
            Unit::Count,
            "Total number of banner content hits in the remote cache tier."
        );
        describe_counter!(
            METRIC_MISS,
            Unit::Count,
            "Total number of banner content lookups missing every cache tier."
        );
        describe_counter!(
            METRIC_ERROR,
            Unit::Count,
            "Total number of remote cache failures, labelled by operation."
        );
        describe_counter!(
            METRIC_BULK_DELETE,
            Unit::Count,
            "Total number of processed bulk deletions, labelled by outcome."
        );
    });
}
