//! Integration tests for the rental ledger.
//!
//! These tests drive the public API the way an application would: registries
//! and items owned by the caller, the ledger borrowing them per call.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tempfile::TempDir;

use rentledger::core::customer::Customer;
use rentledger::core::item::{Item, ItemError, ItemKind};
use rentledger::core::types::{Amount, CustomerNumber, Date};
use rentledger::engine::ledger::{LedgerError, PreconditionError, RentalLedger};
use rentledger::engine::notify::{ChangeListener, LedgerChange};
use rentledger::engine::protocol::{FileProtocol, MemoryProtocol, ProtocolEvent, ProtocolSink};
use rentledger::engine::registry::{InMemoryCatalog, InMemoryCustomers};

fn customer(n: u32, first: &str, last: &str) -> Customer {
    Customer::new(CustomerNumber::new(n).unwrap(), first, last)
}

fn d(day: u32) -> Date {
    Date::new(2024, 3, day).unwrap()
}

struct Shop {
    ledger: RentalLedger,
    catalog: Arc<InMemoryCatalog>,
    k: [Customer; 4],
    x: Item,
}

fn shop(protocol: Box<dyn ProtocolSink>) -> Shop {
    let k = [
        customer(1, "Ada", "Lovelace"),
        customer(2, "Alan", "Turing"),
        customer(3, "Grace", "Hopper"),
        customer(4, "Edsger", "Dijkstra"),
    ];
    let x = Item::new(ItemKind::Dvd, "Metropolis", "Restored");
    let customers = Arc::new(InMemoryCustomers::with_customers(k.clone()));
    let catalog = Arc::new(InMemoryCatalog::with_items([&x]));
    let ledger = RentalLedger::new(customers, catalog.clone(), protocol);
    Shop {
        ledger,
        catalog,
        k,
        x,
    }
}

#[test]
fn reference_scenario() {
    let Shop {
        mut ledger,
        k: [k1, k2, k3, k4],
        mut x,
        ..
    } = shop(Box::new(MemoryProtocol::new()));

    ledger.check_out(&k1, &[&x], d(1)).unwrap();
    assert!(ledger.is_lent(&x).unwrap());

    assert!(ledger.reservation_possible(&x, &k2));
    ledger.reserve(&k2, &mut x).unwrap();
    ledger.reserve(&k3, &mut x).unwrap();
    ledger.reserve(&k4, &mut x).unwrap();
    assert_eq!(
        ledger.reservers_of(&x).unwrap(),
        vec![k2.clone(), k3.clone(), k4.clone()]
    );

    // Full queue and current borrower.
    assert!(ledger.reserve(&k1, &mut x).is_err());
    assert_eq!(x.reservations().len(), 3);
    assert_eq!(ledger.first_reserver(&x).unwrap(), Some(k2.clone()));

    ledger.cancel_reservation(&k2, &mut x).unwrap();
    assert_eq!(ledger.reservers_of(&x).unwrap(), vec![k3, k4]);

    ledger.return_items(&[&x], d(2)).unwrap();
    assert!(!ledger.is_lent(&x).unwrap());
    assert_eq!(x.rental_fee(d(1), d(2)).unwrap(), Amount::from_minor(600));
}

#[test]
fn fee_formula() {
    let x = Item::new(ItemKind::Cd, "Blue Train", "");
    let rate = Item::DEFAULT_DAILY_RATE;
    assert_eq!(x.rental_fee(d(1), d(1)).unwrap(), rate);
    assert_eq!(Some(x.rental_fee(d(1), d(2)).unwrap()), rate.checked_mul(2));
    assert_eq!(Some(x.rental_fee(d(1), d(7)).unwrap()), rate.checked_mul(7));
    assert!(x.rental_fee(d(2), d(1)).is_err());

    let pricey = Item::new(ItemKind::Dvd, "Gold", "")
        .with_daily_rate(Amount::from_minor(i64::MAX - 1))
        .unwrap();
    assert_eq!(
        pricey.rental_fee(d(1), d(2)),
        Err(ItemError::FeeOverflow {
            rate: Amount::from_minor(i64::MAX - 1),
            days: 2
        })
    );
}

#[test]
fn two_listeners_one_delivery_each() {
    let Shop {
        mut ledger, k, x, ..
    } = shop(Box::new(MemoryProtocol::new()));

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    ledger.subscribe(Arc::new(move |change: &LedgerChange| {
        sink.lock().unwrap().push(change.clone());
    }));

    #[derive(Default)]
    struct Count(AtomicUsize);
    impl ChangeListener for Count {
        fn on_change(&self, _change: &LedgerChange) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
    let count = Arc::new(Count::default());
    ledger.subscribe(count.clone());

    ledger.check_out(&k[0], &[&x], d(1)).unwrap();

    assert_eq!(count.0.load(Ordering::SeqCst), 1);
    assert_eq!(
        *seen.lock().unwrap(),
        vec![LedgerChange::CheckedOut {
            customer: k[0].clone(),
            items: vec![x.id()],
        }]
    );
}

#[test]
fn deregistered_item_is_refused() {
    let Shop {
        mut ledger,
        catalog,
        k,
        x,
    } = shop(Box::new(MemoryProtocol::new()));

    catalog.deregister(&x.id());
    let err = ledger.check_out(&k[0], &[&x], d(1)).unwrap_err();
    assert_eq!(
        err.precondition(),
        Some(&PreconditionError::UnknownItem(x.id()))
    );
    assert!(!ledger.item_known(&x));
}

#[test]
fn protocol_failure_keeps_mutations() {
    let protocol = MemoryProtocol::new();
    let Shop {
        mut ledger, k, x, ..
    } = shop(Box::new(protocol.clone()));
    protocol.fail_after(0);

    let err = ledger.check_out(&k[1], &[&x], d(1)).unwrap_err();
    assert!(matches!(err, LedgerError::Protocol { .. }));
    assert!(ledger.is_lent(&x).unwrap());
    assert_eq!(ledger.borrower_of(&x).unwrap(), &k[1]);

    protocol.recover();
    ledger.return_items(&[&x], d(3)).unwrap();
    assert_eq!(protocol.len(), 1);
}

#[test]
fn file_protocol_records_each_item() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("protocol.jsonl");
    let Shop {
        mut ledger, k, x, ..
    } = shop(Box::new(FileProtocol::new(&path)));

    ledger.check_out(&k[2], &[&x], d(4)).unwrap();
    ledger.return_items(&[&x], d(6)).unwrap();

    let entries = FileProtocol::new(&path).read_all().unwrap();
    let events: Vec<_> = entries.iter().map(|e| e.event).collect();
    assert_eq!(events, vec![ProtocolEvent::Checkout, ProtocolEvent::Return]);
    assert_eq!(entries[1].record.customer(), &k[2]);
    assert_eq!(entries[1].record.rental_days(d(6)), 3);
}

#[test]
fn ledger_can_be_shared_behind_a_mutex() {
    let Shop {
        ledger, k, x, ..
    } = shop(Box::new(MemoryProtocol::new()));
    let ledger = Arc::new(Mutex::new(ledger));
    let x = Arc::new(x);

    let handles: Vec<_> = k
        .into_iter()
        .map(|who| {
            let ledger = ledger.clone();
            let x = x.clone();
            std::thread::spawn(move || {
                let mut ledger = ledger.lock().unwrap();
                let result = ledger.check_out(&who, &[&*x], d(1));
                result.is_ok()
            })
        })
        .collect();

    let winners = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();
    assert_eq!(winners, 1);
    assert_eq!(ledger.lock().unwrap().lent_count(), 1);
}
