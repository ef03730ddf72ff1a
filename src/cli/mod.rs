// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! CLI module for running overlays.
//!
//! This module contains the command-line interface logic, including argument parsing
//! and the `detect`/`pose` command implementation.

// Modules
/// CLI arguments.
pub mod args;

/// Overlay runner.
pub mod run;
