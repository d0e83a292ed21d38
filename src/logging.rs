//! Tracing subscriber setup for applications embedding the database layer.

use crate::config::Settings;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Install a global subscriber from the settings.
///
/// `RUST_LOG` takes precedence over `log_level`. Returns `false` when a
/// subscriber is already installed, in which case the existing one is kept.
pub fn init_tracing(settings: &Settings) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if settings.json_logs {
        subscriber.with(fmt::layer().json()).try_init().is_ok()
    } else {
        subscriber
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .try_init()
            .is_ok()
    }
}
