//! Tracing subscriber setup for binaries, examples and tests.
//!
//! Library code only emits `tracing` events; installing a subscriber is left
//! to the application. [`init_tracing`] is the one-liner for applications that
//! have no subscriber setup of their own.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::EnvFilter;

/// Install a global fmt subscriber.
///
/// `RUST_LOG` takes precedence over `default_filter` (for example
/// `"breakwater=debug"`). Fails instead of panicking when a global subscriber
/// is already set.
pub fn init_tracing(default_filter: &str) -> Result<(), TryInitError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry().with(filter).with(tracing_subscriber::fmt::layer()).try_init()
}
