use std::fs::File;
use std::sync::Mutex;

use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::domain::{SVConfig, SVError};

/// Sends all tracing output to the configured log file. The terminal belongs
/// to the UI, so nothing is written to stdout or stderr.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init(config: &SVConfig) -> Result<(), SVError> {
    let file = File::create(&config.log_file)?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let file_layer = fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .with_filter(env_filter);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(ErrorLayer::default())
        .try_init()
        .map_err(|e| SVError::Logging(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwritable_log_file_is_an_error() {
        let config = SVConfig::default().with_log_file("/does/not/exist/seatview.log".into());
        assert!(matches!(init(&config), Err(SVError::IoError(_))));
    }
}
