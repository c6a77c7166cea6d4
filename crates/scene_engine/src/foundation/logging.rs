//! Logging utilities and structured logging support

pub use log::{debug, info, warn, error, trace};

use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize the logging system from `RUST_LOG`, defaulting to `info`
pub fn init() {
    init_with_filter(None);
}

/// Initialize the logging system with an explicit `env_logger` filter
///
/// `filter` follows the `env_logger` syntax (e.g. `"debug"` or
/// `"scene_engine=trace,scene_demo=info"`). When `None`, `RUST_LOG` is used.
/// Repeated calls are ignored.
pub fn init_with_filter(filter: Option<&str>) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();

        if let Some(filter) = filter {
            builder.parse_filters(filter);
        } else if let Ok(filter) = std::env::var("RUST_LOG") {
            builder.parse_filters(&filter);
        } else {
            builder.filter_level(log::LevelFilter::Info);
        }

        // Tests may have installed a logger already
        if builder.try_init().is_ok() {
            log::debug!("logging initialized");
        }
    });
}

/// Initialize logging from the `log_level` of an [`EngineConfig`]
///
/// `RUST_LOG` still wins when set, so a single run can be made noisier
/// without editing the config file.
///
/// [`EngineConfig`]: crate::config::EngineConfig
pub fn init_with_config(config: &crate::config::EngineConfig) {
    if std::env::var_os("RUST_LOG").is_some() {
        init_with_filter(None);
    } else {
        init_with_filter(Some(&config.log_level));
    }
}
