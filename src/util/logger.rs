//! Logging support.
//!
//! The crate logs through the `log` facade and leaves the choice of logger
//! to the embedding. For embeddings that do not set one up, the default-on
//! `builtin_env_logger` feature provides an `env_logger` that filters at
//! `info` unless `RUST_LOG` says otherwise. Disable the feature to drop the
//! dependency entirely.

use log::SetLoggerError;

/// Attempt to initialize the built-in logger. Does nothing (successfully)
/// when the `builtin_env_logger` feature is disabled, and fails if the
/// embedding already installed a logger of its own.
pub fn try_init() -> Result<(), SetLoggerError> {
    cfg_if::cfg_if! {
        if #[cfg(feature = "builtin_env_logger")] {
            env_logger::try_init_from_env(
                env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
            )
        } else {
            Ok(())
        }
    }
}
