pub mod basin;
pub mod config;
pub mod continent;
pub mod dataset;
pub mod error;
pub mod listing;
pub mod merger;
pub mod natural_sort;
pub mod pipeline;
pub mod upload;
pub mod writer;

pub use error::*;

use std::sync::Once;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static TRACING: Once = Once::new();

/// Install the fmt subscriber, filtered by `RUST_LOG` (default `info`).
/// Later calls are no-ops.
pub fn init_tracing(service: &str) {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false))
            .init();
        tracing::debug!(service, "tracing initialised");
    });
}
