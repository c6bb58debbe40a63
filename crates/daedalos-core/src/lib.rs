//! Daedalos Core - Shared functionality for Daedalos tools
//!
//! Config file locations, JSON config loading and the human-readable
//! duration and progress formatting shared by the command-line tools.

pub mod config;
pub mod format;
pub mod paths;

pub use paths::Paths;
