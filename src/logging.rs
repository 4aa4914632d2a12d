//! Logging setup
//!
//! Structured logging through `tracing`. Everything goes to stderr because
//! stdout carries the flattened document.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::error::{FlatTreeError, Result};

/// Environment variable holding an `EnvFilter` directive, e.g. `flattree=trace`
pub const LOG_ENV: &str = "FLATTREE_LOG";

/// Initialize the global subscriber
///
/// `FLATTREE_LOG` wins when set; otherwise `debug` selects the debug level
/// and the default is `warn`.
pub fn init_logging(debug: bool) -> Result<()> {
    let filter = match EnvFilter::try_from_env(LOG_ENV) {
        Ok(filter) => filter,
        Err(_) if debug => EnvFilter::new("debug"),
        Err(_) => EnvFilter::new("warn"),
    };

    Registry::default()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr),
        )
        .try_init()
        .map_err(|e| FlatTreeError::Config(format!("Failed to initialize logging: {}", e)))
}
