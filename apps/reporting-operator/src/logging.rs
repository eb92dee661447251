//! JSON log output for the operator.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the JSON subscriber. `RUST_LOG` wins over `filter` when set.
///
/// Exits the process when neither yields a valid filter.
pub fn init_logging(filter: &str) {
    let filter_layer =
        match EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(filter)) {
            Ok(f) => f,
            Err(e) => {
                eprintln!("FATAL: invalid log filter {filter:?}: {e}");
                std::process::exit(1);
            }
        };

    tracing_subscriber::registry()
        .with(fmt::layer().json().flatten_event(true))
        .with(filter_layer)
        .init();

    tracing::info!(
        filter = %filter,
        version = env!("CARGO_PKG_VERSION"),
        "reporting-operator starting"
    );
}

#[cfg(test)]
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("debug")
        .try_init();
}
