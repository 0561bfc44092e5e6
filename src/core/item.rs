//! core::item
//!
//! Rentable catalog items.
//!
//! # Overview
//!
//! An [`Item`] carries its own [`ReservationQueue`] and knows how to compute
//! its rental fee. Items are owned by whoever holds the catalog; the ledger
//! only ever borrows them.
//!
//! # Fee rule
//!
//! Both the checkout day and the return day are charged:
//! `fee = daily_rate * (days_between(from, to) + 1)`.
//!
//! # Example
//!
//! ```
//! use rentledger::core::item::{Item, ItemKind};
//! use rentledger::core::types::{Amount, Date};
//!
//! let item = Item::new(ItemKind::Dvd, "Metropolis", "restored cut");
//! let day1 = Date::new(2024, 1, 1).unwrap();
//! let day2 = Date::new(2024, 1, 2).unwrap();
//!
//! assert_eq!(item.rental_fee(day1, day1).unwrap(), Amount::from_minor(300));
//! assert_eq!(item.rental_fee(day1, day2).unwrap(), Amount::from_minor(600));
//! assert!(item.rental_fee(day2, day1).is_err());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::customer::Customer;
use super::reservation::{ReservationError, ReservationQueue};
use super::types::{Amount, Date, ItemId};

/// Indentation used in formatted descriptions.
const INDENT: &str = "    ";

/// Errors from item operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ItemError {
    #[error("rental period ends before it starts: {from} > {to}")]
    InvalidRentalPeriod { from: Date, to: Date },

    #[error("daily rate must be positive, got {0}")]
    InvalidDailyRate(Amount),

    #[error("rental fee for {days} day(s) at {rate} per day is too large")]
    FeeOverflow { rate: Amount, days: i64 },

    #[error(transparent)]
    Reservation(#[from] ReservationError),
}

/// Kind of medium. Only affects the display label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Cd,
    Dvd,
    VideoGame,
}

impl ItemKind {
    /// Human-readable label for the kind.
    pub fn label(&self) -> &'static str {
        match self {
            ItemKind::Cd => "CD",
            ItemKind::Dvd => "DVD",
            ItemKind::VideoGame => "Video game",
        }
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A rentable item.
///
/// Identity is the [`ItemId`] assigned at construction; titles may collide.
///
/// Items are neither `Clone` nor `Deserialize`: each id belongs to exactly one
/// value, so there is exactly one reservation queue per item. Share an item
/// by reference or through an `Arc`.
///
/// ```compile_fail
/// use rentledger::core::item::{Item, ItemKind};
///
/// let item = Item::new(ItemKind::Cd, "Blue Train", "");
/// let copy = item.clone();
/// ```
#[derive(Debug, Serialize)]
pub struct Item {
    id: ItemId,
    kind: ItemKind,
    title: String,
    comment: String,
    daily_rate: Amount,
    reservations: ReservationQueue,
}

impl Item {
    /// Daily rate used unless overridden.
    pub const DEFAULT_DAILY_RATE: Amount = Amount::from_minor(300);

    /// Create an item with a fresh id and the default daily rate.
    pub fn new(kind: ItemKind, title: impl Into<String>, comment: impl Into<String>) -> Self {
        Self {
            id: ItemId::generate(),
            kind,
            title: title.into(),
            comment: comment.into(),
            daily_rate: Self::DEFAULT_DAILY_RATE,
            reservations: ReservationQueue::new(),
        }
    }

    /// Replace the daily rate.
    ///
    /// # Errors
    ///
    /// Returns `ItemError::InvalidDailyRate` unless the rate is positive.
    pub fn with_daily_rate(mut self, rate: Amount) -> Result<Self, ItemError> {
        if rate <= Amount::ZERO {
            return Err(ItemError::InvalidDailyRate(rate));
        }
        self.daily_rate = rate;
        Ok(self)
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn kind(&self) -> ItemKind {
        self.kind
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn set_comment(&mut self, comment: impl Into<String>) {
        self.comment = comment.into();
    }

    pub fn daily_rate(&self) -> Amount {
        self.daily_rate
    }

    /// Fee for renting from `from` until `to`, both days inclusive.
    ///
    /// # Errors
    ///
    /// - `ItemError::InvalidRentalPeriod` if `from` is after `to`
    /// - `ItemError::FeeOverflow` if the fee does not fit in an [`Amount`]
    pub fn rental_fee(&self, from: Date, to: Date) -> Result<Amount, ItemError> {
        if from > to {
            return Err(ItemError::InvalidRentalPeriod { from, to });
        }
        let days = to.days_since(from) + 1;
        self.daily_rate
            .checked_mul(days)
            .ok_or(ItemError::FeeOverflow {
                rate: self.daily_rate,
                days,
            })
    }

    /// Multi-line description, one `Attribute: value` per line.
    pub fn formatted_description(&self) -> String {
        format!(
            "{}:\n{INDENT}Title: {}\n{INDENT}Comment: {}\n",
            self.kind.label(),
            self.title,
            self.comment
        )
    }

    // =========================================================================
    // Reservations
    // =========================================================================

    /// Check the queue-level rule: not full and not already queued.
    ///
    /// Whether the customer currently borrows this item is not considered here.
    pub fn reservation_possible(&self, customer: &Customer) -> bool {
        self.reservations.is_possible(customer)
    }

    /// Append `customer` to the end of the queue.
    pub(crate) fn add_reserver(&mut self, customer: Customer) -> Result<(), ItemError> {
        self.reservations.push(customer)?;
        Ok(())
    }

    /// Remove `customer` from the queue.
    pub(crate) fn remove_reserver(&mut self, customer: &Customer) -> Result<(), ItemError> {
        self.reservations.remove(customer)?;
        Ok(())
    }

    /// The customer at the head of the queue, if any.
    pub fn first_reserver(&self) -> Option<&Customer> {
        self.reservations.first()
    }

    /// Read-only view of the reservation queue.
    pub fn reservations(&self) -> &ReservationQueue {
        &self.reservations
    }
}

impl std::fmt::Display for Item {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} \"{}\"", self.kind.label(), self.title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::CustomerNumber;

    const RATE: i64 = 300;

    fn item() -> Item {
        Item::new(ItemKind::Cd, "Title", "Comment")
    }

    fn customer(n: u32) -> Customer {
        Customer::new(CustomerNumber::new(n).unwrap(), "First", "Last")
    }

    fn day(d: u32) -> Date {
        Date::new(2001, 1, d).unwrap()
    }

    #[test]
    fn construction() {
        let item = item();
        assert_eq!(item.title(), "Title");
        assert_eq!(item.comment(), "Comment");
        assert_eq!(item.kind(), ItemKind::Cd);
        assert_eq!(item.daily_rate(), Amount::from_minor(RATE));
        assert!(item.reservations().is_empty());
    }

    #[test]
    fn identity_is_not_title() {
        let a = item();
        let b = item();
        assert_eq!(a.title(), b.title());
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn rental_fee_counts_both_ends() {
        let item = item();
        assert_eq!(item.rental_fee(day(1), day(1)).unwrap(), Amount::from_minor(RATE));
        assert_eq!(
            item.rental_fee(day(1), day(2)).unwrap(),
            Amount::from_minor(2 * RATE)
        );
        assert_eq!(
            item.rental_fee(day(1), day(7)).unwrap(),
            Amount::from_minor(7 * RATE)
        );
    }

    #[test]
    fn rental_fee_rejects_reversed_period() {
        assert_eq!(
            item().rental_fee(day(2), day(1)),
            Err(ItemError::InvalidRentalPeriod {
                from: day(2),
                to: day(1)
            })
        );
    }

    #[test]
    fn rental_fee_overflow_is_an_error() {
        let item = item()
            .with_daily_rate(Amount::from_minor(i64::MAX / 2 + 1))
            .unwrap();
        assert_eq!(
            item.rental_fee(day(1), day(1)).unwrap(),
            Amount::from_minor(i64::MAX / 2 + 1)
        );
        assert_eq!(
            item.rental_fee(day(1), day(2)),
            Err(ItemError::FeeOverflow {
                rate: Amount::from_minor(i64::MAX / 2 + 1),
                days: 2
            })
        );
    }

    #[test]
    fn custom_daily_rate() {
        let item = item().with_daily_rate(Amount::from_minor(150)).unwrap();
        assert_eq!(item.rental_fee(day(1), day(3)).unwrap(), Amount::from_minor(450));
        assert!(Item::new(ItemKind::Dvd, "t", "c")
            .with_daily_rate(Amount::ZERO)
            .is_err());
    }

    #[test]
    fn setters() {
        let mut item = item();
        item.set_title("Title2");
        item.set_comment("Comment2");
        assert_eq!(item.title(), "Title2");
        assert_eq!(item.comment(), "Comment2");
    }

    #[test]
    fn formatted_description_lists_attributes() {
        let text = Item::new(ItemKind::VideoGame, "Tetris", "boxed").formatted_description();
        assert!(text.starts_with("Video game:\n"));
        assert!(text.contains("Title: Tetris\n"));
        assert!(text.contains("Comment: boxed\n"));
    }

    #[test]
    fn reservation_queue_rules() {
        let mut item = item();
        item.add_reserver(customer(111)).unwrap();
        item.add_reserver(customer(222)).unwrap();
        assert!(item.reservation_possible(&customer(333)));
        item.add_reserver(customer(333)).unwrap();

        assert!(!item.reservation_possible(&customer(444)));
        assert!(!item.reservation_possible(&customer(333)));
        assert_eq!(item.first_reserver(), Some(&customer(111)));

        item.remove_reserver(&customer(111)).unwrap();
        assert_eq!(item.first_reserver(), Some(&customer(222)));
        assert!(item.remove_reserver(&customer(111)).is_err());
    }
}
