//! Console logging for the CLI.
//!
//! Events go to stderr so that stdout carries nothing but the command's JSON
//! output. The level defaults to `info` and follows `RUST_LOG` when set, e.g.
//!
//! ```bash
//! RUST_LOG=registrar=trace registrar --date 2025-03-14 roll
//! ```

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub fn init_telemetry() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_thread_ids(true)
                .with_line_number(true)
                .with_target(false)
                .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
                .with_file(true),
        )
        .try_init()?;
    Ok(())
}
