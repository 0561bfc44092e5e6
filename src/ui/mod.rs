//! ui
//!
//! User-facing output.
//!
//! # Modules
//!
//! - [`output`] - Verbosity-aware printing
//!
//! # Design
//!
//! Messages meant for the person at the terminal go through this module.
//! Diagnostics go through `tracing` instead.

pub mod output;
