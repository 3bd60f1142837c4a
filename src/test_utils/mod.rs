//! Test utilities for rgclone
//!
//! Fixtures for a sample resource group (export, decompiled text, settings,
//! on-disk snapshot) and one-time logging setup for tests. Available to
//! integration tests through the `test-utils` feature.
//!
//! # Example
//!
//! ```rust,no_run
//! use rgclone::test_utils::fixtures::SnapshotFixture;
//!
//! # fn example() -> anyhow::Result<()> {
//! let temp = tempfile::TempDir::new()?;
//! SnapshotFixture::sample().write_to(temp.path())?;
//! # Ok(())
//! # }
//! ```

pub mod fixtures;

pub use fixtures::{SAMPLE_DECOMPILED, SAMPLE_GROUP, SnapshotFixture};

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Only the first call has an effect. With `level` set, that level is used;
/// otherwise `RUST_LOG` is honored, and without it tests stay silent.
///
/// ```bash
/// RUST_LOG=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}
