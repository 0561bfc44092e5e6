//! core::reservation
//!
//! Bounded FIFO queue of customers waiting for an item.
//!
//! # Invariants
//!
//! - At most [`ReservationQueue::CAPACITY`] customers
//! - No customer appears twice
//! - Insertion order is preserved; the head is the first reserver
//!
//! The queue knows nothing about who currently borrows the item. The
//! borrower check lives in the ledger.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::customer::Customer;
use super::types::CustomerNumber;

/// Errors from queue mutation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReservationError {
    #[error("reservation queue is full ({capacity} customers)")]
    QueueFull { capacity: usize },

    #[error("customer {0} already holds a reservation")]
    AlreadyReserved(CustomerNumber),

    #[error("customer {0} holds no reservation")]
    NotReserved(CustomerNumber),
}

/// Ordered, duplicate-free waiting list with a fixed capacity.
///
/// Serialized as a plain list of customers. Deserializing goes through
/// [`ReservationQueue::push`], so an oversized or duplicated list is rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Customer>", into = "Vec<Customer>")]
pub struct ReservationQueue {
    customers: Vec<Customer>,
}

impl ReservationQueue {
    /// Maximum number of simultaneous reservations.
    pub const CAPACITY: usize = 3;

    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether `customer` could be appended.
    ///
    /// False if the queue is full or already contains the customer.
    pub fn is_possible(&self, customer: &Customer) -> bool {
        if self.customers.len() >= Self::CAPACITY {
            return false;
        }
        !self.contains(customer)
    }

    /// Append a customer at the end of the queue.
    ///
    /// # Errors
    ///
    /// - [`ReservationError::QueueFull`] if the queue holds `CAPACITY` customers
    /// - [`ReservationError::AlreadyReserved`] if the customer is queued already
    pub fn push(&mut self, customer: Customer) -> Result<(), ReservationError> {
        if self.customers.len() >= Self::CAPACITY {
            return Err(ReservationError::QueueFull {
                capacity: Self::CAPACITY,
            });
        }
        if self.contains(&customer) {
            return Err(ReservationError::AlreadyReserved(customer.number()));
        }
        self.customers.push(customer);
        Ok(())
    }

    /// Remove a customer from any position.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::NotReserved`] if the customer is not queued.
    pub fn remove(&mut self, customer: &Customer) -> Result<Customer, ReservationError> {
        let index = self
            .customers
            .iter()
            .position(|c| c == customer)
            .ok_or(ReservationError::NotReserved(customer.number()))?;
        Ok(self.customers.remove(index))
    }

    /// The customer at the head of the queue.
    pub fn first(&self) -> Option<&Customer> {
        self.customers.first()
    }

    pub fn contains(&self, customer: &Customer) -> bool {
        self.customers.iter().any(|c| c == customer)
    }

    pub fn len(&self) -> usize {
        self.customers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.customers.is_empty()
    }

    /// Read-only view in FIFO order.
    pub fn as_slice(&self) -> &[Customer] {
        &self.customers
    }

    /// Owned copy of the queue in FIFO order.
    pub fn snapshot(&self) -> Vec<Customer> {
        self.customers.clone()
    }
}

impl TryFrom<Vec<Customer>> for ReservationQueue {
    type Error = ReservationError;

    fn try_from(customers: Vec<Customer>) -> Result<Self, Self::Error> {
        let mut queue = Self::new();
        for customer in customers {
            queue.push(customer)?;
        }
        Ok(queue)
    }
}

impl From<ReservationQueue> for Vec<Customer> {
    fn from(queue: ReservationQueue) -> Self {
        queue.customers
    }
}
