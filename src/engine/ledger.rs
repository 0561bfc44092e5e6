//! engine::ledger
//!
//! The rental ledger: the single source of truth for who holds what.
//!
//! # Architecture
//!
//! The ledger maps each lent item to exactly one [`RentalRecord`]. Absence of
//! a record means the item is available. Checkout and return run in batches:
//! every precondition is checked first, then items are mutated one by one,
//! each mutation followed by one protocol entry, and finally one change
//! notification is delivered for the whole batch.
//!
//! Reservation queues live on the items themselves. The ledger is the facade
//! that validates reservation requests against its loans and mutates the
//! caller's `&mut Item`.
//!
//! # Invariants
//!
//! - An item has a record iff it is currently lent
//! - An item is lent to at most one customer at a time
//! - A reservation queue holds at most three distinct customers
//! - Every customer and item the ledger acts on is known to the injected
//!   [`CustomerRegistry`] and [`ItemCatalog`]
//!
//! # Errors
//!
//! A violated precondition yields [`LedgerError::Precondition`] and leaves
//! the ledger untouched. A failing [`ProtocolSink`] yields
//! [`LedgerError::Protocol`]; mutations already applied in that batch are
//! kept, and listeners are still notified about them.
//!
//! # Concurrency
//!
//! Mutating operations take `&mut self`. To share a ledger across threads,
//! put it behind one `Mutex` so each batch runs under a single lock.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use rentledger::core::customer::Customer;
//! use rentledger::core::item::{Item, ItemKind};
//! use rentledger::core::types::{CustomerNumber, Date};
//! use rentledger::engine::ledger::RentalLedger;
//! use rentledger::engine::protocol::MemoryProtocol;
//! use rentledger::engine::registry::{InMemoryCatalog, InMemoryCustomers};
//!
//! let ada = Customer::new(CustomerNumber::new(1).unwrap(), "Ada", "Lovelace");
//! let disc = Item::new(ItemKind::Cd, "Kind of Blue", "");
//!
//! let customers = Arc::new(InMemoryCustomers::with_customers([ada.clone()]));
//! let catalog = Arc::new(InMemoryCatalog::with_items([&disc]));
//! let mut ledger = RentalLedger::new(customers, catalog, Box::new(MemoryProtocol::new()));
//!
//! let today = Date::new(2024, 1, 1).unwrap();
//! ledger.check_out(&ada, &[&disc], today).unwrap();
//! assert!(ledger.is_lent(&disc).unwrap());
//! assert_eq!(ledger.borrower_of(&disc).unwrap(), &ada);
//!
//! ledger.return_items(&[&disc], today.plus_days(1)).unwrap();
//! assert!(!ledger.is_lent(&disc).unwrap());
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use super::notify::{ChangeListener, ChangeNotifier, LedgerChange};
use super::protocol::{ProtocolEntry, ProtocolError, ProtocolEvent, ProtocolSink};
use super::registry::{CustomerRegistry, ItemCatalog};
use crate::core::customer::Customer;
use crate::core::item::Item;
use crate::core::record::RentalRecord;
use crate::core::types::{CustomerNumber, Date, ItemId};

/// A broken caller contract. Reported before any mutation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PreconditionError {
    #[error("customer {0} is not registered")]
    UnknownCustomer(CustomerNumber),

    #[error("item {0} is not in the catalog")]
    UnknownItem(ItemId),

    #[error("item batch is empty")]
    EmptyBatch,

    #[error("item {0} appears more than once in the batch")]
    DuplicateItem(ItemId),

    #[error("item {0} is already lent")]
    AlreadyLent(ItemId),

    #[error("item {0} is not lent")]
    NotLent(ItemId),

    #[error("customer {customer} cannot reserve item {item}")]
    ReservationNotPossible { customer: CustomerNumber, item: ItemId },

    #[error("customer {customer} holds no reservation on item {item}")]
    NotReserved { customer: CustomerNumber, item: ItemId },
}

/// Errors from ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The caller broke a precondition; nothing was changed.
    #[error("precondition violated: {0}")]
    Precondition(#[from] PreconditionError),

    /// The protocol sink failed part-way through a batch.
    ///
    /// `applied` lists the items whose ledger change was kept.
    #[error("protocol failed after {} item(s): {source}", .applied.len())]
    Protocol {
        applied: Vec<ItemId>,
        #[source]
        source: ProtocolError,
    },
}

impl LedgerError {
    /// The precondition that was violated, if that is what happened.
    pub fn precondition(&self) -> Option<&PreconditionError> {
        match self {
            LedgerError::Precondition(p) => Some(p),
            LedgerError::Protocol { .. } => None,
        }
    }
}

/// The authoritative map of active loans.
pub struct RentalLedger {
    records: HashMap<ItemId, RentalRecord>,
    customers: Arc<dyn CustomerRegistry>,
    catalog: Arc<dyn ItemCatalog>,
    protocol: Box<dyn ProtocolSink>,
    notifier: ChangeNotifier,
}

impl RentalLedger {
    /// Create an empty ledger with its collaborators.
    pub fn new(
        customers: Arc<dyn CustomerRegistry>,
        catalog: Arc<dyn ItemCatalog>,
        protocol: Box<dyn ProtocolSink>,
    ) -> Self {
        Self {
            records: HashMap::new(),
            customers,
            catalog,
            protocol,
            notifier: ChangeNotifier::new(),
        }
    }

    /// Seed the ledger with existing loans.
    ///
    /// A later record for the same item replaces an earlier one. Seeding is
    /// not protocolled and notifies nobody.
    pub fn with_records(mut self, records: impl IntoIterator<Item = RentalRecord>) -> Self {
        for record in records {
            self.records.insert(record.item(), record);
        }
        self
    }

    // =========================================================================
    // Membership
    // =========================================================================

    /// Check whether the customer is registered.
    pub fn customer_known(&self, customer: &Customer) -> bool {
        self.customers.contains(&customer.number())
    }

    /// Check whether the item is in the catalog.
    pub fn item_known(&self, item: &Item) -> bool {
        self.catalog.contains(&item.id())
    }

    /// Check whether every item of a non-empty batch is in the catalog.
    pub fn items_known(&self, items: &[&Item]) -> Result<bool, LedgerError> {
        if items.is_empty() {
            return Err(PreconditionError::EmptyBatch.into());
        }
        Ok(items.iter().all(|item| self.item_known(item)))
    }

    // =========================================================================
    // Loans
    // =========================================================================

    /// Check whether the item is currently lent.
    pub fn is_lent(&self, item: &Item) -> Result<bool, LedgerError> {
        self.require_item(item)?;
        Ok(self.records.contains_key(&item.id()))
    }

    /// Check whether none of the items is lent.
    pub fn all_not_lent(&self, items: &[&Item]) -> Result<bool, LedgerError> {
        self.require_items(items)?;
        Ok(items.iter().all(|item| !self.records.contains_key(&item.id())))
    }

    /// Check whether every item is lent.
    pub fn all_lent(&self, items: &[&Item]) -> Result<bool, LedgerError> {
        self.require_items(items)?;
        Ok(items.iter().all(|item| self.records.contains_key(&item.id())))
    }

    /// Check whether `customer` may check out all `items`.
    pub fn can_check_out(&self, items: &[&Item], customer: &Customer) -> Result<bool, LedgerError> {
        self.require_customer(customer)?;
        self.all_not_lent(items)
    }

    /// Lend every item to `customer` as of `date`.
    ///
    /// Produces one CHECKOUT protocol entry per item and one
    /// [`LedgerChange::CheckedOut`] notification for the batch.
    ///
    /// If the protocol sink fails part-way, the items lent so far stay lent
    /// and listeners are still notified about them before the error is
    /// returned. Listeners therefore never miss a change that took effect.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Precondition`] if the customer or an item is unknown,
    ///   the batch is empty or repeats an item, or an item is already lent
    /// - [`LedgerError::Protocol`] if the protocol sink fails
    pub fn check_out(
        &mut self,
        customer: &Customer,
        items: &[&Item],
        date: Date,
    ) -> Result<(), LedgerError> {
        self.require_customer(customer)?;
        self.require_items(items)?;
        require_distinct(items)?;
        if let Some(lent) = items.iter().find(|i| self.records.contains_key(&i.id())) {
            return Err(PreconditionError::AlreadyLent(lent.id()).into());
        }

        let mut applied = Vec::with_capacity(items.len());
        let mut failure = None;
        for item in items {
            let record = RentalRecord::new(customer.clone(), item, date);
            self.records.insert(item.id(), record.clone());
            applied.push(item.id());
            debug!(customer = %customer.number(), item = %item.id(), %date, "checked out");

            let entry = ProtocolEntry::new(ProtocolEvent::Checkout, record);
            if let Err(e) = self.protocol.record(&entry) {
                failure = Some(e);
                break;
            }
        }

        let change = LedgerChange::CheckedOut {
            customer: customer.clone(),
            items: applied.clone(),
        };
        self.finish_batch(change, applied, failure)
    }

    /// Take every item back as of `date`.
    ///
    /// Produces one RETURN protocol entry per item and one
    /// [`LedgerChange::Returned`] notification for the batch.
    ///
    /// As with [`check_out`](Self::check_out), a protocol failure keeps the
    /// items already taken back and still notifies listeners about them.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Precondition`] if an item is unknown or not lent, or
    ///   the batch is empty or repeats an item
    /// - [`LedgerError::Protocol`] if the protocol sink fails
    pub fn return_items(&mut self, items: &[&Item], date: Date) -> Result<(), LedgerError> {
        self.require_items(items)?;
        require_distinct(items)?;
        if let Some(free) = items.iter().find(|i| !self.records.contains_key(&i.id())) {
            return Err(PreconditionError::NotLent(free.id()).into());
        }

        let mut applied = Vec::with_capacity(items.len());
        let mut failure = None;
        for item in items {
            let Some(record) = self.records.remove(&item.id()) else {
                continue;
            };
            applied.push(item.id());
            debug!(
                customer = %record.customer().number(),
                item = %item.id(),
                %date,
                days = record.rental_days(date),
                "returned"
            );

            let entry = ProtocolEntry::new(ProtocolEvent::Return, record);
            if let Err(e) = self.protocol.record(&entry) {
                failure = Some(e);
                break;
            }
        }

        let change = LedgerChange::Returned {
            items: applied.clone(),
        };
        self.finish_batch(change, applied, failure)
    }

    /// Ids of all items currently lent to `customer`.
    pub fn active_rentals_for(&self, customer: &Customer) -> Result<HashSet<ItemId>, LedgerError> {
        self.require_customer(customer)?;
        Ok(self
            .records
            .values()
            .filter(|r| r.customer() == customer)
            .map(RentalRecord::item)
            .collect())
    }

    /// The customer currently holding `item`.
    pub fn borrower_of(&self, item: &Item) -> Result<&Customer, LedgerError> {
        self.rental_record_of(item).map(RentalRecord::customer)
    }

    /// The record for a lent item.
    pub fn rental_record_of(&self, item: &Item) -> Result<&RentalRecord, LedgerError> {
        self.require_item(item)?;
        self.records
            .get(&item.id())
            .ok_or_else(|| PreconditionError::NotLent(item.id()).into())
    }

    /// All records of `customer`, oldest checkout first.
    pub fn rental_records_for(&self, customer: &Customer) -> Result<Vec<&RentalRecord>, LedgerError> {
        self.require_customer(customer)?;
        let mut records: Vec<_> = self
            .records
            .values()
            .filter(|r| r.customer() == customer)
            .collect();
        sort_records(&mut records);
        Ok(records)
    }

    /// Every active record, oldest checkout first.
    pub fn rental_records(&self) -> Vec<&RentalRecord> {
        let mut records: Vec<_> = self.records.values().collect();
        sort_records(&mut records);
        records
    }

    /// Number of items currently lent.
    pub fn lent_count(&self) -> usize {
        self.records.len()
    }

    // =========================================================================
    // Reservations
    // =========================================================================

    /// Queue-level check: the item's queue has room and lacks `customer`.
    pub fn reservation_possible(&self, item: &Item, customer: &Customer) -> bool {
        item.reservation_possible(customer)
    }

    /// Check whether `customer` may reserve every item in the batch.
    ///
    /// Per item:
    /// - lent to `customer` while the queue would accept them: refused
    /// - lent to someone else: accepted
    /// - not lent: accepted iff the queue would accept them
    ///
    /// A lent item whose queue is full or already holds the customer passes
    /// this check; [`reserve`](Self::reserve) still refuses it.
    pub fn can_reserve(&self, items: &[&Item], customer: &Customer) -> Result<bool, LedgerError> {
        for item in items {
            self.require_item(item)?;
            let queue_ok = item.reservation_possible(customer);
            match self.records.get(&item.id()) {
                Some(record) => {
                    if record.customer() == customer && queue_ok {
                        return Ok(false);
                    }
                }
                None => {
                    if !queue_ok {
                        return Ok(false);
                    }
                }
            }
        }
        Ok(true)
    }

    /// Append `customer` to the item's reservation queue.
    ///
    /// # Errors
    ///
    /// Returns [`PreconditionError::ReservationNotPossible`] if
    /// [`can_reserve`](Self::can_reserve) refuses, or the queue is full or
    /// already holds the customer.
    pub fn reserve(&mut self, customer: &Customer, item: &mut Item) -> Result<(), LedgerError> {
        self.require_customer(customer)?;
        self.require_item(item)?;

        let refused = PreconditionError::ReservationNotPossible {
            customer: customer.number(),
            item: item.id(),
        };
        if !self.can_reserve(&[&*item], customer)? {
            return Err(refused.into());
        }
        item.add_reserver(customer.clone()).map_err(|_| refused)?;

        debug!(
            customer = %customer.number(),
            item = %item.id(),
            queued = item.reservations().len(),
            "reserved"
        );
        self.notifier.notify(&LedgerChange::Reserved {
            customer: customer.clone(),
            item: item.id(),
        });
        Ok(())
    }

    /// Copy of the item's reservation queue in FIFO order.
    pub fn reservers_of(&self, item: &Item) -> Result<Vec<Customer>, LedgerError> {
        self.require_item(item)?;
        Ok(item.reservations().snapshot())
    }

    /// Head of the item's reservation queue.
    pub fn first_reserver(&self, item: &Item) -> Result<Option<Customer>, LedgerError> {
        self.require_item(item)?;
        Ok(item.first_reserver().cloned())
    }

    /// Remove `customer` from the item's reservation queue.
    ///
    /// # Errors
    ///
    /// Returns [`PreconditionError::NotReserved`] if the customer is not queued.
    pub fn cancel_reservation(
        &mut self,
        customer: &Customer,
        item: &mut Item,
    ) -> Result<(), LedgerError> {
        self.require_customer(customer)?;
        self.require_item(item)?;

        item.remove_reserver(customer)
            .map_err(|_| PreconditionError::NotReserved {
                customer: customer.number(),
                item: item.id(),
            })?;

        debug!(customer = %customer.number(), item = %item.id(), "reservation cancelled");
        self.notifier.notify(&LedgerChange::ReservationCancelled {
            customer: customer.clone(),
            item: item.id(),
        });
        Ok(())
    }

    // =========================================================================
    // Observers
    // =========================================================================

    /// Register a change listener. Returns false if already registered.
    pub fn subscribe(&mut self, listener: Arc<dyn ChangeListener>) -> bool {
        self.notifier.subscribe(listener)
    }

    /// Remove a change listener. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, listener: &Arc<dyn ChangeListener>) -> bool {
        self.notifier.unsubscribe(listener)
    }

    // =========================================================================
    // Internal helpers
    // =========================================================================

    fn require_customer(&self, customer: &Customer) -> Result<(), PreconditionError> {
        if self.customer_known(customer) {
            Ok(())
        } else {
            Err(PreconditionError::UnknownCustomer(customer.number()))
        }
    }

    fn require_item(&self, item: &Item) -> Result<(), PreconditionError> {
        if self.item_known(item) {
            Ok(())
        } else {
            Err(PreconditionError::UnknownItem(item.id()))
        }
    }

    fn require_items(&self, items: &[&Item]) -> Result<(), PreconditionError> {
        if items.is_empty() {
            return Err(PreconditionError::EmptyBatch);
        }
        items.iter().try_for_each(|item| self.require_item(item))
    }

    /// Notify about whatever was applied, then report the protocol outcome.
    fn finish_batch(
        &self,
        change: LedgerChange,
        applied: Vec<ItemId>,
        failure: Option<ProtocolError>,
    ) -> Result<(), LedgerError> {
        if !applied.is_empty() {
            self.notifier.notify(&change);
        }
        match failure {
            None => Ok(()),
            Some(source) => {
                warn!(
                    change = change.kind(),
                    applied = applied.len(),
                    error = %source,
                    "protocol failed; applied changes are kept"
                );
                Err(LedgerError::Protocol { applied, source })
            }
        }
    }
}

impl std::fmt::Debug for RentalLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RentalLedger")
            .field("records", &self.records.len())
            .field("notifier", &self.notifier)
            .finish_non_exhaustive()
    }
}

fn require_distinct(items: &[&Item]) -> Result<(), PreconditionError> {
    let mut seen = HashSet::with_capacity(items.len());
    for item in items {
        if !seen.insert(item.id()) {
            return Err(PreconditionError::DuplicateItem(item.id()));
        }
    }
    Ok(())
}

fn sort_records(records: &mut [&RentalRecord]) {
    records.sort_by(|a, b| {
        a.checkout_date()
            .cmp(&b.checkout_date())
            .then_with(|| a.item_title().cmp(b.item_title()))
            .then_with(|| a.item().cmp(&b.item()))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::item::ItemKind;
    use crate::engine::protocol::MemoryProtocol;
    use crate::engine::registry::{InMemoryCatalog, InMemoryCustomers};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Test fixture: four customers, three items, a memory protocol.
    struct Fixture {
        ledger: RentalLedger,
        protocol: MemoryProtocol,
        customers: Vec<Customer>,
        items: Vec<Item>,
    }

    impl Fixture {
        fn new() -> Self {
            let customers: Vec<_> = [111, 222, 333, 444]
                .into_iter()
                .map(|n| {
                    Customer::new(
                        CustomerNumber::new(n).unwrap(),
                        format!("First{n}"),
                        format!("Last{n}"),
                    )
                })
                .collect();
            let items = vec![
                Item::new(ItemKind::Cd, "Kind of Blue", "jazz"),
                Item::new(ItemKind::Dvd, "Metropolis", "1927"),
                Item::new(ItemKind::VideoGame, "Tetris", ""),
            ];
            let protocol = MemoryProtocol::new();
            let ledger = RentalLedger::new(
                Arc::new(InMemoryCustomers::with_customers(customers.clone())),
                Arc::new(InMemoryCatalog::with_items(&items)),
                Box::new(protocol.clone()),
            );
            Self {
                ledger,
                protocol,
                customers,
                items,
            }
        }

        fn stranger() -> Customer {
            Customer::new(CustomerNumber::new(999).unwrap(), "Nobody", "Known")
        }
    }

    fn day(d: u32) -> Date {
        Date::new(2024, 1, d).unwrap()
    }

    #[derive(Default)]
    struct Counter(AtomicUsize);

    impl ChangeListener for Counter {
        fn on_change(&self, _change: &LedgerChange) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl Counter {
        fn count(&self) -> usize {
            self.0.load(Ordering::SeqCst)
        }
    }

    mod loans {
        use super::*;

        #[test]
        fn checkout_then_return() {
            let mut f = Fixture::new();
            let (k1, x) = (&f.customers[0], &f.items[0]);

            assert!(!f.ledger.is_lent(x).unwrap());
            assert!(f.ledger.can_check_out(&[x], k1).unwrap());

            f.ledger.check_out(k1, &[x], day(1)).unwrap();
            assert!(f.ledger.is_lent(x).unwrap());
            assert_eq!(f.ledger.borrower_of(x).unwrap(), k1);
            assert_eq!(f.ledger.rental_record_of(x).unwrap().checkout_date(), day(1));
            assert!(!f.ledger.can_check_out(&[x], k1).unwrap());

            f.ledger.return_items(&[x], day(2)).unwrap();
            assert!(!f.ledger.is_lent(x).unwrap());
            assert_eq!(f.ledger.lent_count(), 0);
        }

        #[test]
        fn batch_predicates() {
            let mut f = Fixture::new();
            let (a, b, c) = (&f.items[0], &f.items[1], &f.items[2]);
            f.ledger.check_out(&f.customers[0], &[a, b], day(1)).unwrap();

            assert!(f.ledger.all_lent(&[a, b]).unwrap());
            assert!(!f.ledger.all_lent(&[a, c]).unwrap());
            assert!(f.ledger.all_not_lent(&[c]).unwrap());
            assert!(!f.ledger.all_not_lent(&[b, c]).unwrap());
        }

        #[test]
        fn empty_batches_rejected() {
            let mut f = Fixture::new();
            let k1 = f.customers[0].clone();
            assert_eq!(
                f.ledger.all_lent(&[]).unwrap_err().precondition(),
                Some(&PreconditionError::EmptyBatch)
            );
            assert!(f.ledger.check_out(&k1, &[], day(1)).is_err());
            assert!(f.ledger.return_items(&[], day(1)).is_err());
            assert!(f.ledger.items_known(&[]).is_err());
        }

        #[test]
        fn one_protocol_entry_per_item() {
            let mut f = Fixture::new();
            let items: Vec<&Item> = f.items.iter().collect();
            f.ledger.check_out(&f.customers[1], &items, day(3)).unwrap();
            f.ledger.return_items(&items[..2], day(4)).unwrap();

            let entries = f.protocol.entries();
            assert_eq!(entries.len(), 5);
            assert!(entries[..3]
                .iter()
                .all(|e| e.event == ProtocolEvent::Checkout));
            assert!(entries[3..].iter().all(|e| e.event == ProtocolEvent::Return));
            assert_eq!(entries[3].record.item(), f.items[0].id());
        }

        #[test]
        fn records_per_customer() {
            let mut f = Fixture::new();
            let (k1, k2) = (&f.customers[0], &f.customers[1]);
            let (a, b, c) = (&f.items[0], &f.items[1], &f.items[2]);
            f.ledger.check_out(k1, &[b], day(2)).unwrap();
            f.ledger.check_out(k1, &[a], day(1)).unwrap();
            f.ledger.check_out(k2, &[c], day(1)).unwrap();

            let rentals = f.ledger.active_rentals_for(k1).unwrap();
            assert_eq!(rentals, HashSet::from([a.id(), b.id()]));

            let records = f.ledger.rental_records_for(k1).unwrap();
            let ids: Vec<_> = records.iter().map(|r| r.item()).collect();
            assert_eq!(ids, vec![a.id(), b.id()]);

            assert_eq!(f.ledger.rental_records().len(), 3);
            assert!(f
                .ledger
                .active_rentals_for(&f.customers[3])
                .unwrap()
                .is_empty());
        }

        #[test]
        fn seeded_records() {
            let f = Fixture::new();
            let record = RentalRecord::new(f.customers[2].clone(), &f.items[1], day(5));
            let ledger = f.ledger.with_records([record.clone()]);

            assert!(ledger.is_lent(&f.items[1]).unwrap());
            assert_eq!(ledger.rental_record_of(&f.items[1]).unwrap(), &record);
            assert!(f.protocol.is_empty());
        }
    }

    mod preconditions {
        use super::*;

        #[test]
        fn unknown_customer() {
            let mut f = Fixture::new();
            let stranger = Fixture::stranger();
            let x = &f.items[0];

            let err = f.ledger.check_out(&stranger, &[x], day(1)).unwrap_err();
            assert_eq!(
                err.precondition(),
                Some(&PreconditionError::UnknownCustomer(stranger.number()))
            );
            assert!(!f.ledger.is_lent(x).unwrap());
            assert!(f.ledger.active_rentals_for(&stranger).is_err());
            assert!(f.ledger.rental_records_for(&stranger).is_err());
        }

        #[test]
        fn unknown_item() {
            let mut f = Fixture::new();
            let outsider = Item::new(ItemKind::Cd, "Kind of Blue", "jazz");

            assert!(f.ledger.is_lent(&outsider).is_err());
            assert!(!f.ledger.items_known(&[&outsider]).unwrap());

            let err = f
                .ledger
                .check_out(&f.customers[0], &[&f.items[0], &outsider], day(1))
                .unwrap_err();
            assert_eq!(
                err.precondition(),
                Some(&PreconditionError::UnknownItem(outsider.id()))
            );
            // Nothing applied, not even the known item.
            assert!(!f.ledger.is_lent(&f.items[0]).unwrap());
            assert!(f.protocol.is_empty());
        }

        #[test]
        fn already_lent_blocks_whole_batch() {
            let mut f = Fixture::new();
            let (a, b) = (&f.items[0], &f.items[1]);
            f.ledger.check_out(&f.customers[0], &[b], day(1)).unwrap();

            let err = f
                .ledger
                .check_out(&f.customers[1], &[a, b], day(2))
                .unwrap_err();
            assert_eq!(
                err.precondition(),
                Some(&PreconditionError::AlreadyLent(b.id()))
            );
            assert!(!f.ledger.is_lent(a).unwrap());
            assert_eq!(f.ledger.borrower_of(b).unwrap(), &f.customers[0]);
        }

        #[test]
        fn return_requires_lent() {
            let mut f = Fixture::new();
            let x = &f.items[0];
            let err = f.ledger.return_items(&[x], day(1)).unwrap_err();
            assert_eq!(err.precondition(), Some(&PreconditionError::NotLent(x.id())));
            assert!(f.ledger.borrower_of(x).is_err());
            assert!(f.ledger.rental_record_of(x).is_err());
        }

        #[test]
        fn duplicate_items_rejected() {
            let mut f = Fixture::new();
            let x = &f.items[0];
            let err = f
                .ledger
                .check_out(&f.customers[0], &[x, x], day(1))
                .unwrap_err();
            assert_eq!(
                err.precondition(),
                Some(&PreconditionError::DuplicateItem(x.id()))
            );
            assert!(!f.ledger.is_lent(x).unwrap());
        }
    }

    mod protocol_failures {
        use super::*;

        #[test]
        fn checkout_keeps_applied_items() {
            let mut f = Fixture::new();
            let counter = Arc::new(Counter::default());
            f.ledger.subscribe(counter.clone());
            f.protocol.fail_after(1);

            let items: Vec<&Item> = f.items.iter().collect();
            let err = f
                .ledger
                .check_out(&f.customers[0], &items, day(1))
                .unwrap_err();

            match err {
                LedgerError::Protocol { applied, .. } => {
                    assert_eq!(applied, vec![f.items[0].id(), f.items[1].id()]);
                }
                other => panic!("expected protocol failure, got {other:?}"),
            }
            assert!(f.ledger.is_lent(&f.items[0]).unwrap());
            assert!(f.ledger.is_lent(&f.items[1]).unwrap());
            assert!(!f.ledger.is_lent(&f.items[2]).unwrap());
            assert_eq!(counter.count(), 1);
        }

        #[test]
        fn return_keeps_applied_items() {
            let mut f = Fixture::new();
            let (a, b) = (&f.items[0], &f.items[1]);
            f.ledger.check_out(&f.customers[0], &[a, b], day(1)).unwrap();
            let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
            let sink = seen.clone();
            f.ledger.subscribe(Arc::new(move |change: &LedgerChange| {
                sink.lock().unwrap().push(change.clone());
            }));
            f.protocol.fail_after(0);

            let err = f.ledger.return_items(&[a, b], day(2)).unwrap_err();
            assert!(err.precondition().is_none());
            assert!(err.to_string().contains("protocol failed after 1 item"));
            assert!(!f.ledger.is_lent(a).unwrap());
            assert!(f.ledger.is_lent(b).unwrap());
            assert_eq!(
                *seen.lock().unwrap(),
                vec![LedgerChange::Returned { items: vec![a.id()] }]
            );
        }
    }

    mod reservations {
        use super::*;

        #[test]
        fn reserve_and_cancel() {
            let mut f = Fixture::new();
            let (k2, k3) = (f.customers[1].clone(), f.customers[2].clone());
            let mut x = f.items.remove(0);

            f.ledger.reserve(&k2, &mut x).unwrap();
            f.ledger.reserve(&k3, &mut x).unwrap();
            assert_eq!(f.ledger.reservers_of(&x).unwrap(), vec![k2.clone(), k3.clone()]);
            assert_eq!(f.ledger.first_reserver(&x).unwrap(), Some(k2.clone()));

            f.ledger.cancel_reservation(&k2, &mut x).unwrap();
            assert_eq!(f.ledger.first_reserver(&x).unwrap(), Some(k3));
        }

        #[test]
        fn fourth_reservation_rejected() {
            let mut f = Fixture::new();
            let mut x = f.items.remove(0);
            for customer in &f.customers[..3] {
                f.ledger.reserve(customer, &mut x).unwrap();
            }

            assert!(!f.ledger.reservation_possible(&x, &f.customers[3]));
            let err = f.ledger.reserve(&f.customers[3], &mut x).unwrap_err();
            assert!(matches!(
                err.precondition(),
                Some(PreconditionError::ReservationNotPossible { .. })
            ));
            assert_eq!(x.reservations().len(), 3);
        }

        #[test]
        fn duplicate_reservation_rejected() {
            let mut f = Fixture::new();
            let mut x = f.items.remove(0);
            f.ledger.reserve(&f.customers[1], &mut x).unwrap();
            assert!(f.ledger.reserve(&f.customers[1], &mut x).is_err());
            assert_eq!(x.reservations().len(), 1);
        }

        #[test]
        fn borrower_cannot_reserve_own_loan() {
            let mut f = Fixture::new();
            let k1 = f.customers[0].clone();
            let mut x = f.items.remove(0);
            f.ledger.check_out(&k1, &[&x], day(1)).unwrap();

            assert!(!f.ledger.can_reserve(&[&x], &k1).unwrap());
            assert!(f.ledger.reserve(&k1, &mut x).is_err());
            assert!(f.ledger.can_reserve(&[&x], &f.customers[1]).unwrap());
        }

        #[test]
        fn lent_item_with_full_queue_passes_gate_but_not_reserve() {
            let mut f = Fixture::new();
            let k4 = f.customers[3].clone();
            let mut x = f.items.remove(0);
            f.ledger.check_out(&f.customers[0], &[&x], day(1)).unwrap();
            for customer in &f.customers[1..3] {
                f.ledger.reserve(customer, &mut x).unwrap();
            }
            f.ledger.reserve(&k4, &mut x).unwrap();
            let fifth = Fixture::stranger();

            // Queue full, item lent to someone else: the gate lets it through.
            assert!(f.ledger.can_reserve(&[&x], &f.customers[0]).unwrap());
            assert!(f.ledger.reserve(&f.customers[0], &mut x).is_err());
            assert!(f.ledger.reserve(&fifth, &mut x).is_err());
            assert_eq!(x.reservations().len(), 3);
        }

        #[test]
        fn can_reserve_batch_fails_if_any_item_fails() {
            let mut f = Fixture::new();
            let k1 = f.customers[0].clone();
            let b = f.items.remove(1);
            let mut a = f.items.remove(0);
            f.ledger.reserve(&k1, &mut a).unwrap();

            assert!(f.ledger.can_reserve(&[&b], &k1).unwrap());
            assert!(!f.ledger.can_reserve(&[&b, &a], &k1).unwrap());
            assert!(f.ledger.can_reserve(&[], &k1).unwrap());
        }

        #[test]
        fn cancel_requires_reservation() {
            let mut f = Fixture::new();
            let mut x = f.items.remove(0);
            let err = f
                .ledger
                .cancel_reservation(&f.customers[0], &mut x)
                .unwrap_err();
            assert!(matches!(
                err.precondition(),
                Some(PreconditionError::NotReserved { .. })
            ));
        }

        #[test]
        fn unknown_item_cannot_be_reserved() {
            let mut f = Fixture::new();
            let mut outsider = Item::new(ItemKind::Cd, "Outsider", "");
            assert!(f.ledger.reserve(&f.customers[0], &mut outsider).is_err());
            assert!(outsider.reservations().is_empty());
            assert!(f.ledger.reservers_of(&outsider).is_err());
        }
    }

    mod notifications {
        use super::*;

        #[test]
        fn one_notification_per_batch_per_listener() {
            let mut f = Fixture::new();
            let a = Arc::new(Counter::default());
            let b = Arc::new(Counter::default());
            f.ledger.subscribe(a.clone());
            f.ledger.subscribe(b.clone());

            let items: Vec<&Item> = f.items.iter().collect();
            f.ledger.check_out(&f.customers[0], &items, day(1)).unwrap();

            assert_eq!(a.count(), 1);
            assert_eq!(b.count(), 1);
        }

        #[test]
        fn every_mutation_notifies() {
            let mut f = Fixture::new();
            let counter = Arc::new(Counter::default());
            f.ledger.subscribe(counter.clone());
            let mut x = f.items.remove(0);

            f.ledger.check_out(&f.customers[0], &[&x], day(1)).unwrap();
            f.ledger.reserve(&f.customers[1], &mut x).unwrap();
            f.ledger.cancel_reservation(&f.customers[1], &mut x).unwrap();
            f.ledger.return_items(&[&x], day(2)).unwrap();
            assert_eq!(counter.count(), 4);

            // Failed preconditions do not notify.
            let _ = f.ledger.return_items(&[&x], day(3));
            assert_eq!(counter.count(), 4);
        }

        #[test]
        fn unsubscribed_listener_is_silent() {
            let mut f = Fixture::new();
            let counter = Arc::new(Counter::default());
            let handle: Arc<dyn ChangeListener> = counter.clone();
            assert!(f.ledger.subscribe(handle.clone()));
            assert!(!f.ledger.subscribe(handle.clone()));
            assert!(f.ledger.unsubscribe(&handle));

            f.ledger
                .check_out(&f.customers[0], &[&f.items[0]], day(1))
                .unwrap();
            assert_eq!(counter.count(), 0);
        }
    }
}
