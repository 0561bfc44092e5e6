//! engine::registry
//!
//! Membership collaborators the ledger validates against.
//!
//! # Design
//!
//! The ledger never owns customers or items. It asks a [`CustomerRegistry`]
//! and an [`ItemCatalog`] whether the things it is handed are known, and
//! refuses to act otherwise. Both traits are injected at construction.
//!
//! The in-memory implementations use interior locking so that one instance
//! can be shared (via `Arc`) between the ledger and the code that manages
//! membership.

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

use crate::core::customer::Customer;
use crate::core::item::Item;
use crate::core::types::{CustomerNumber, ItemId};

/// Customer membership lookup.
pub trait CustomerRegistry: Send + Sync {
    /// Check whether a customer with this number is registered.
    fn contains(&self, number: &CustomerNumber) -> bool;
}

/// Item membership lookup.
pub trait ItemCatalog: Send + Sync {
    /// Check whether an item with this id is in the catalog.
    fn contains(&self, id: &ItemId) -> bool;
}

/// In-memory customer registry.
///
/// # Example
///
/// ```
/// use rentledger::core::customer::Customer;
/// use rentledger::core::types::CustomerNumber;
/// use rentledger::engine::registry::{CustomerRegistry, InMemoryCustomers};
///
/// let registry = InMemoryCustomers::new();
/// let ada = Customer::new(CustomerNumber::new(1).unwrap(), "Ada", "Lovelace");
/// registry.insert(ada.clone());
/// assert!(registry.contains(&ada.number()));
/// ```
#[derive(Debug, Default)]
pub struct InMemoryCustomers {
    customers: RwLock<HashMap<CustomerNumber, Customer>>,
}

impl InMemoryCustomers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from an initial list of customers.
    pub fn with_customers(customers: impl IntoIterator<Item = Customer>) -> Self {
        let registry = Self::new();
        for customer in customers {
            registry.insert(customer);
        }
        registry
    }

    /// Register or replace a customer. Returns the previous entry, if any.
    pub fn insert(&self, customer: Customer) -> Option<Customer> {
        self.customers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(customer.number(), customer)
    }

    /// Deregister a customer.
    pub fn remove(&self, number: &CustomerNumber) -> Option<Customer> {
        self.customers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(number)
    }

    /// Look up a customer by number.
    pub fn get(&self, number: &CustomerNumber) -> Option<Customer> {
        self.customers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(number)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.customers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CustomerRegistry for InMemoryCustomers {
    fn contains(&self, number: &CustomerNumber) -> bool {
        self.customers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(number)
    }
}

/// In-memory item catalog.
///
/// Tracks membership only; the items themselves stay with the caller so
/// they can be borrowed mutably for reservation changes.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    items: RwLock<HashSet<ItemId>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog containing the given items.
    pub fn with_items<'a>(items: impl IntoIterator<Item = &'a Item>) -> Self {
        let catalog = Self::new();
        for item in items {
            catalog.register(item);
        }
        catalog
    }

    /// Add an item. Returns false if it was already registered.
    pub fn register(&self, item: &Item) -> bool {
        self.items
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(item.id())
    }

    /// Remove an item. Returns false if it was not registered.
    pub fn deregister(&self, id: &ItemId) -> bool {
        self.items
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
    }

    pub fn len(&self) -> usize {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ItemCatalog for InMemoryCatalog {
    fn contains(&self, id: &ItemId) -> bool {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(id)
    }
}
