//! Log initialization. All output goes to stderr; stdout carries results only.

use std::env;
use std::sync::Once;

use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Level used when neither `RUST_LOG` nor a configured level is present.
const DEFAULT_LEVEL: Level = Level::WARN;

/// Install the global subscriber once. `RUST_LOG` wins over `level`.
pub fn init_logging(level: Option<&str>) {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let filter = if env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            let level = level.map(parse_level).unwrap_or(DEFAULT_LEVEL);
            EnvFilter::default().add_directive(LevelFilter::from_level(level).into())
        };

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    });
}

fn parse_level(level_str: &str) -> Level {
    match level_str.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => {
            eprintln!(
                "Invalid log level '{}', defaulting to {}. Valid levels: trace, debug, info, warn, error",
                level_str, DEFAULT_LEVEL
            );
            DEFAULT_LEVEL
        }
    }
}
