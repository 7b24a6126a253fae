//! Tracing setup for the runner.

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn init_telemetry(json_logs: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,life_world=debug,life_runner=debug".into());

    let json_layer = json_logs.then(|| fmt::layer().json().with_target(true));
    let text_layer = (!json_logs).then(|| fmt::layer().with_target(true));

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()?;

    info!(json_logs, "Telemetry initialized");
    Ok(())
}

/// Record a counter metric
#[macro_export]
macro_rules! record_counter {
    ($name:expr, $value:expr) => {
        tracing::info!(
            counter_name = $name,
            counter_value = $value,
            "Counter metric"
        );
    };
}
