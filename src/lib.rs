//! Rentledger - a rental ledger with bounded reservation queues
//!
//! Rentledger tracks which customer holds which item of a media rental
//! catalog, lets customers queue up for items, computes rental fees, and
//! reports every checkout and return to a protocol sink.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface for replaying scenarios
//! - [`engine`] - The ledger, its collaborators, and scenario replay
//! - [`core`] - Domain types, items, reservations, records, configuration
//! - [`ui`] - User-facing output
//!
//! # Correctness Invariants
//!
//! 1. An item is lent to at most one customer at a time
//! 2. A reservation queue holds at most three distinct customers
//! 3. A customer never reserves an item they currently borrow
//! 4. Precondition violations are reported before any state changes

pub mod cli;
pub mod core;
pub mod engine;
pub mod ui;
