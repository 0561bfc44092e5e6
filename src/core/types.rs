//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`CustomerNumber`] - Validated, immutable customer identity
//! - [`ItemId`] - Identity of a catalog item (independent of its title)
//! - [`Date`] - Calendar date used for checkout and return
//! - [`Amount`] - Money in minor currency units
//! - [`UtcTimestamp`] - RFC3339 timestamp for protocol entries
//!
//! # Validation
//!
//! These types enforce validity at construction time. Invalid values
//! cannot be represented, preventing entire classes of bugs.
//!
//! # Examples
//!
//! ```
//! use rentledger::core::types::{Amount, CustomerNumber, Date};
//!
//! let number = CustomerNumber::new(111).unwrap();
//! assert_eq!(number.value(), 111);
//! assert!(CustomerNumber::new(0).is_err());
//!
//! let day1 = Date::new(2024, 1, 1).unwrap();
//! let day7 = Date::new(2024, 1, 7).unwrap();
//! assert_eq!(day7.days_since(day1), 6);
//!
//! assert_eq!(Amount::from_minor(1250).to_string(), "12.50");
//! ```

use std::str::FromStr;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid customer number: {0}")]
    InvalidCustomerNumber(String),

    #[error("invalid item id: {0}")]
    InvalidItemId(String),

    #[error("invalid date: {0}")]
    InvalidDate(String),
}

/// A validated customer number.
///
/// Customer numbers are positive integers and never change once issued.
///
/// # Example
///
/// ```
/// use rentledger::core::types::CustomerNumber;
///
/// let number: CustomerNumber = "4711".parse().unwrap();
/// assert_eq!(number.value(), 4711);
/// assert!("abc".parse::<CustomerNumber>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct CustomerNumber(u32);

impl CustomerNumber {
    /// Create a new validated customer number.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidCustomerNumber` if the number is zero.
    pub fn new(value: u32) -> Result<Self, TypeError> {
        if value == 0 {
            return Err(TypeError::InvalidCustomerNumber(
                "customer number must be positive".into(),
            ));
        }
        Ok(Self(value))
    }

    /// Get the raw number.
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for CustomerNumber {
    type Error = TypeError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CustomerNumber> for u32 {
    fn from(number: CustomerNumber) -> Self {
        number.0
    }
}

impl FromStr for CustomerNumber {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s
            .trim()
            .parse::<u32>()
            .map_err(|e| TypeError::InvalidCustomerNumber(format!("'{s}': {e}")))?;
        Self::new(value)
    }
}

impl std::fmt::Display for CustomerNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a catalog item.
///
/// Two items with the same title are still distinct items; the ledger keys
/// everything by this id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(Uuid);

impl ItemId {
    /// Generate a fresh random item id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Abbreviated form for display.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl FromStr for ItemId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| TypeError::InvalidItemId(format!("'{s}': {e}")))
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A calendar date without time of day.
///
/// Serialized as `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Date(NaiveDate);

impl Date {
    /// Create a date from year, month and day.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidDate` if the combination does not exist.
    pub fn new(year: i32, month: u32, day: u32) -> Result<Self, TypeError> {
        NaiveDate::from_ymd_opt(year, month, day)
            .map(Self)
            .ok_or_else(|| TypeError::InvalidDate(format!("{year:04}-{month:02}-{day:02}")))
    }

    /// Number of days from `earlier` to `self`.
    ///
    /// Negative if `self` lies before `earlier`.
    pub fn days_since(&self, earlier: Date) -> i64 {
        self.0.signed_duration_since(earlier.0).num_days()
    }

    /// The date `days` days after this one.
    ///
    /// Saturates at the end of the representable range.
    pub fn plus_days(&self, days: i64) -> Self {
        Self(
            self.0
                .checked_add_signed(Duration::days(days))
                .unwrap_or(NaiveDate::MAX),
        )
    }
}

impl FromStr for Date {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Self)
            .map_err(|e| TypeError::InvalidDate(format!("'{s}': {e}")))
    }
}

impl std::fmt::Display for Date {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

/// An amount of money in minor currency units (e.g. cents).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(i64);

impl Amount {
    /// The zero amount.
    pub const ZERO: Amount = Amount(0);

    /// Create an amount from minor units.
    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    /// Get the amount in minor units.
    pub fn minor(&self) -> i64 {
        self.0
    }

    /// Sum of two amounts, or `None` on overflow.
    pub fn checked_add(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_add(rhs.0).map(Amount)
    }

    /// The amount times `factor`, or `None` on overflow.
    pub fn checked_mul(self, factor: i64) -> Option<Amount> {
        self.0.checked_mul(factor).map(Amount)
    }
}


impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

/// A UTC timestamp in RFC3339 format.
///
/// # Example
///
/// ```
/// use rentledger::core::types::UtcTimestamp;
///
/// let now = UtcTimestamp::now();
/// assert!(now.to_string().contains('T'));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtcTimestamp(chrono::DateTime<chrono::Utc>);

impl UtcTimestamp {
    /// Create a timestamp for the current moment.
    pub fn now() -> Self {
        Self(chrono::Utc::now())
    }

    /// Get the underlying datetime.
    pub fn as_datetime(&self) -> &chrono::DateTime<chrono::Utc> {
        &self.0
    }
}

impl std::fmt::Display for UtcTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}
