//! Tracing subscriber setup.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Directives used when `RUST_LOG` is not set
pub fn default_directives(level: &str) -> String {
    format!("warn,mns_queue={level},mns_queue_cli={level},mns_worker={level}")
}

/// Install the global subscriber
///
/// `RUST_LOG` wins over `level`. Output goes to stderr so command results on
/// stdout stay machine readable. Does nothing if a subscriber is already set.
pub fn initialize_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    let json_layer = json.then(|| fmt::layer().json().with_writer(std::io::stderr));
    let text_layer = (!json).then(|| fmt::layer().with_writer(std::io::stderr));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .try_init();
}
