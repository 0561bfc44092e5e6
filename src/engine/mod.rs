//! engine
//!
//! The rental ledger and the collaborators it talks to.
//!
//! # Architecture
//!
//! Every mutating ledger operation follows the same shape:
//!
//! ```text
//! Validate -> Mutate (per item) -> Protocol (per item) -> Notify (per batch)
//! ```
//!
//! Validation consults the injected [`registry`] traits and the ledger's own
//! records. Nothing is mutated until every precondition holds.
//!
//! # Modules
//!
//! - [`ledger`] - [`RentalLedger`], the map of active loans
//! - [`registry`] - Customer and item membership traits and in-memory stores
//! - [`protocol`] - Per-item CHECKOUT / RETURN protocol sinks
//! - [`notify`] - Change listeners
//! - [`scenario`] - TOML scenario replay on top of the ledger
//!
//! # Invariants
//!
//! - An item is lent to at most one customer at a time
//! - A reservation queue never exceeds three customers or holds duplicates
//! - A failed precondition changes nothing

pub mod ledger;
pub mod notify;
pub mod protocol;
pub mod registry;
pub mod scenario;

pub use ledger::{LedgerError, PreconditionError, RentalLedger};
pub use notify::{ChangeListener, ChangeNotifier, LedgerChange};
pub use protocol::{
    FileProtocol, MemoryProtocol, NullProtocol, ProtocolEntry, ProtocolError, ProtocolEvent,
    ProtocolSink, TracingProtocol,
};
pub use registry::{CustomerRegistry, InMemoryCatalog, InMemoryCustomers, ItemCatalog};
pub use scenario::{Replay, Report, Scenario, ScenarioError, Step, StepOutcome};
