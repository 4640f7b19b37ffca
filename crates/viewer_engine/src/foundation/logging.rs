//! Logging bootstrap
//!
//! Thin wrapper over `env_logger` so every binary initializes logging
//! the same way.

pub use log::{debug, error, info, trace, warn};

/// Initialize logging at the given default level
///
/// More specific `RUST_LOG` module directives still apply.
pub fn init(default_level: log::LevelFilter) {
    env_logger::Builder::from_default_env()
        .filter_level(default_level)
        .init();
}
