//! core::record
//!
//! Rental records: who holds which item since when.
//!
//! A [`RentalRecord`] is created on checkout and dropped on return. It is
//! immutable in between.

use serde::{Deserialize, Serialize};

use super::customer::Customer;
use super::item::{Item, ItemError};
use super::types::{Amount, Date, ItemId};

/// The association of a borrowing customer, an item, and a checkout date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentalRecord {
    customer: Customer,
    item: ItemId,
    item_title: String,
    checkout_date: Date,
}

impl RentalRecord {
    /// Record that `customer` took `item` on `checkout_date`.
    pub fn new(customer: Customer, item: &Item, checkout_date: Date) -> Self {
        Self {
            customer,
            item: item.id(),
            item_title: item.title().to_string(),
            checkout_date,
        }
    }

    /// The borrowing customer.
    pub fn customer(&self) -> &Customer {
        &self.customer
    }

    /// Id of the borrowed item.
    pub fn item(&self) -> ItemId {
        self.item
    }

    /// Item title at checkout time.
    pub fn item_title(&self) -> &str {
        &self.item_title
    }

    pub fn checkout_date(&self) -> Date {
        self.checkout_date
    }

    /// Number of charged days if returned on `until` (both ends count).
    ///
    /// Zero if `until` lies before the checkout date.
    pub fn rental_days(&self, until: Date) -> i64 {
        (until.days_since(self.checkout_date) + 1).max(0)
    }

    /// Fee owed if `item` is returned on `until`.
    ///
    /// `item` must be the item this record refers to.
    pub fn fee(&self, item: &Item, until: Date) -> Result<Amount, ItemError> {
        debug_assert_eq!(item.id(), self.item);
        item.rental_fee(self.checkout_date, until)
    }

    /// Multi-line, human-readable description of the record.
    pub fn formatted_description(&self) -> String {
        format!(
            "Borrower: {}\nItem: {} [{}]\nCheckout date: {}\n",
            self.customer,
            self.item_title,
            self.item.short(),
            self.checkout_date
        )
    }
}
