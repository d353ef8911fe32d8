//! Library target for the `harvest` package.
//!
//! The primary deliverable of this package is the `harvest` CLI binary
//! (`src/main.rs`). Input detection, configuration loading and report
//! rendering live here so they can be tested without spawning the binary.

pub mod config;
pub mod error;
pub mod input;
pub mod report;

#[doc(hidden)]
pub use harvest_engine;
