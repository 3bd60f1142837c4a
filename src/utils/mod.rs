//! Utilities shared by the pipeline and the CLI
//!
//! - [`fs`] - Atomic artifact writes and small file helpers
//! - [`progress`] - Spinner for the slow external calls
//!
//! # Example
//!
//! ```rust,no_run
//! use rgclone::utils::{ProgressBar, atomic_write};
//! use std::path::Path;
//!
//! # fn example() -> anyhow::Result<()> {
//! let spinner = ProgressBar::new_spinner(true);
//! spinner.set_message("Writing artifacts");
//! atomic_write(Path::new("out/main.bicep"), b"param environmentName string\n")?;
//! spinner.finish_and_clear();
//! # Ok(())
//! # }
//! ```

pub mod fs;
pub mod progress;

pub use fs::{atomic_write, ensure_dir, read_text_file};
pub use progress::ProgressBar;
