//! Core types shared across the pipeline: errors, run mode and
//! environment-token handling.

pub mod env_token;
pub mod error;
pub mod mode;

pub use error::{CloneError, ErrorContext, user_friendly_error};
pub use mode::RunMode;
