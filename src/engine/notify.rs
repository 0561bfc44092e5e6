//! engine::notify
//!
//! Change notification for ledger observers.
//!
//! # Design
//!
//! Listeners are registered as `Arc<dyn ChangeListener>`. Registration is a
//! set: the same `Arc` registered twice is delivered to once. Delivery is
//! synchronous, in registration order, after the mutating operation has
//! finished its batch.

use std::sync::Arc;

use crate::core::customer::Customer;
use crate::core::types::ItemId;

/// What changed in the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerChange {
    /// Items were checked out to a customer.
    CheckedOut { customer: Customer, items: Vec<ItemId> },
    /// Items were returned.
    Returned { items: Vec<ItemId> },
    /// A customer joined an item's reservation queue.
    Reserved { customer: Customer, item: ItemId },
    /// A customer left an item's reservation queue.
    ReservationCancelled { customer: Customer, item: ItemId },
}

impl LedgerChange {
    /// Short name of the change kind.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerChange::CheckedOut { .. } => "checked_out",
            LedgerChange::Returned { .. } => "returned",
            LedgerChange::Reserved { .. } => "reserved",
            LedgerChange::ReservationCancelled { .. } => "reservation_cancelled",
        }
    }
}

/// Observer of ledger changes.
pub trait ChangeListener: Send + Sync {
    /// Called once after every mutating batch operation.
    fn on_change(&self, change: &LedgerChange);
}

/// Any `Fn(&LedgerChange)` closure is a listener.
impl<F> ChangeListener for F
where
    F: Fn(&LedgerChange) + Send + Sync,
{
    fn on_change(&self, change: &LedgerChange) {
        self(change)
    }
}

/// Set of registered listeners.
#[derive(Default)]
pub struct ChangeNotifier {
    listeners: Vec<Arc<dyn ChangeListener>>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. Returns false if it was already registered.
    pub fn subscribe(&mut self, listener: Arc<dyn ChangeListener>) -> bool {
        if self.position(&listener).is_some() {
            return false;
        }
        self.listeners.push(listener);
        true
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, listener: &Arc<dyn ChangeListener>) -> bool {
        match self.position(listener) {
            Some(index) => {
                self.listeners.remove(index);
                true
            }
            None => false,
        }
    }

    /// Deliver a change to every listener.
    pub fn notify(&self, change: &LedgerChange) {
        for listener in &self.listeners {
            listener.on_change(change);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Identity is the allocation, not the vtable.
    fn position(&self, listener: &Arc<dyn ChangeListener>) -> Option<usize> {
        let wanted = Arc::as_ptr(listener) as *const ();
        self.listeners
            .iter()
            .position(|l| Arc::as_ptr(l) as *const () == wanted)
    }
}

impl std::fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
