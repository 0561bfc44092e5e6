//! core
//!
//! Domain types and configuration for the rental ledger.
//!
//! # Modules
//!
//! - [`types`] - Strong types: CustomerNumber, ItemId, Date, Amount
//! - [`customer`] - Customers, identified by number
//! - [`item`] - Rentable items and their fee rule
//! - [`reservation`] - Bounded FIFO reservation queue
//! - [`record`] - Rental records linking customer, item and checkout date
//! - [`config`] - Configuration schema and loading
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at construction time
//! - Items own their reservation queue; only the ledger mutates it
//! - Nothing in `core` performs I/O except [`config`]

pub mod config;
pub mod customer;
pub mod item;
pub mod record;
pub mod reservation;
pub mod types;
