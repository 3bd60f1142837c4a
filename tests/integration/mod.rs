//! Integration test suite for rgclone
//!
//! End-to-end runs of the `rgclone` binary against on-disk snapshots. The
//! decompiler is replaced with `--decompiled` so the suite needs no external
//! tooling.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **backup**: Same-environment capture
//! - **clone**: Cross-environment re-targeting and artifact invariants
//! - **errors**: Failing collaborators and invalid input
//! - **rules**: Rule table listing

mod common;

mod backup;
mod clone;
mod errors;
mod rules;
