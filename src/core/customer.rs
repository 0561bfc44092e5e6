//! core::customer
//!
//! Customers who borrow and reserve items.
//!
//! A customer's identity is its [`CustomerNumber`]. Names may change over time;
//! equality and hashing look only at the number.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use super::types::CustomerNumber;

/// A customer of the rental shop.
///
/// # Example
///
/// ```
/// use rentledger::core::customer::Customer;
/// use rentledger::core::types::CustomerNumber;
///
/// let number = CustomerNumber::new(111).unwrap();
/// let before = Customer::new(number, "Ada", "Lovelace");
/// let mut after = before.clone();
/// after.set_last_name("King");
///
/// // Still the same customer.
/// assert_eq!(before, after);
/// assert_eq!(after.full_name(), "Ada King");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    number: CustomerNumber,
    first_name: String,
    last_name: String,
}

impl Customer {
    /// Create a new customer.
    pub fn new(
        number: CustomerNumber,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            number,
            first_name: first_name.into(),
            last_name: last_name.into(),
        }
    }

    /// The customer's identifying number.
    pub fn number(&self) -> CustomerNumber {
        self.number
    }

    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    pub fn set_first_name(&mut self, first_name: impl Into<String>) {
        self.first_name = first_name.into();
    }

    pub fn set_last_name(&mut self, last_name: impl Into<String>) {
        self.last_name = last_name.into();
    }

    /// First and last name separated by a space.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

impl PartialEq for Customer {
    fn eq(&self, other: &Self) -> bool {
        self.number == other.number
    }
}

impl Eq for Customer {}

impl Hash for Customer {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.number.hash(state);
    }
}

impl std::fmt::Display for Customer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.full_name(), self.number)
    }
}
