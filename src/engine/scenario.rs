//! engine::scenario
//!
//! Declarative replay of ledger activity.
//!
//! # Format
//!
//! A scenario is a TOML document with four tables of arrays:
//!
//! ```toml
//! [[customers]]
//! number = 111
//! first_name = "Ada"
//! last_name = "Lovelace"
//!
//! [[items]]
//! key = "blue"
//! kind = "cd"            # cd | dvd | video_game
//! title = "Kind of Blue"
//! comment = "Remastered"
//! daily_rate = 300       # optional, minor units
//!
//! [[rentals]]            # loans that exist before the first step
//! customer = 111
//! item = "blue"
//! date = "2024-01-01"
//!
//! [[steps]]
//! action = "return"
//! items = ["blue"]
//! date = "2024-01-03"
//! ```
//!
//! Step actions: `check_out`, `return`, `reserve`, `cancel_reservation`,
//! `fee`, `show`, `status`.
//!
//! # Replay
//!
//! [`Replay`] builds in-memory registries and a [`RentalLedger`] from the
//! scenario, then applies steps one at a time. A step the ledger refuses is
//! reported as rejected and the replay moves on.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use super::ledger::{LedgerError, RentalLedger};
use super::notify::{ChangeListener, LedgerChange};
use super::protocol::ProtocolSink;
use super::registry::{InMemoryCatalog, InMemoryCustomers};
use crate::core::customer::Customer;
use crate::core::item::{Item, ItemError, ItemKind};
use crate::core::record::RentalRecord;
use crate::core::types::{Amount, CustomerNumber, Date};

/// Errors from loading or replaying a scenario.
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("failed to read scenario '{path}': {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse scenario '{origin}': {message}")]
    Parse { origin: String, message: String },

    #[error("customer {0} is declared more than once")]
    DuplicateCustomer(CustomerNumber),

    #[error("item key '{0}' is declared more than once")]
    DuplicateItem(String),

    #[error("{context}: customer {number} is not declared")]
    UnknownCustomer {
        context: String,
        number: CustomerNumber,
    },

    #[error("{context}: item '{key}' is not declared")]
    UnknownItem { context: String, key: String },

    #[error("item '{key}': {source}")]
    InvalidItem {
        key: String,
        #[source]
        source: ItemError,
    },

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Fee(#[from] ItemError),
}

/// A customer declaration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CustomerSpec {
    pub number: CustomerNumber,
    pub first_name: String,
    pub last_name: String,
}

/// An item declaration. `key` is the name steps refer to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ItemSpec {
    pub key: String,
    pub kind: ItemKind,
    pub title: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub daily_rate: Option<i64>,
}

/// A loan present before the first step.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RentalSpec {
    pub customer: CustomerNumber,
    pub item: String,
    pub date: Date,
}

/// One replay step.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    CheckOut {
        customer: CustomerNumber,
        items: Vec<String>,
        date: Date,
    },
    Return {
        items: Vec<String>,
        date: Date,
    },
    Reserve {
        customer: CustomerNumber,
        item: String,
    },
    CancelReservation {
        customer: CustomerNumber,
        item: String,
    },
    /// Fee for an explicit period, or for the active loan up to `to`.
    Fee {
        item: String,
        #[serde(default)]
        from: Option<Date>,
        to: Date,
    },
    Show {
        item: String,
    },
    Status,
}

impl Step {
    fn customer(&self) -> Option<CustomerNumber> {
        match self {
            Step::CheckOut { customer, .. }
            | Step::Reserve { customer, .. }
            | Step::CancelReservation { customer, .. } => Some(*customer),
            _ => None,
        }
    }

    fn item_keys(&self) -> Vec<&str> {
        match self {
            Step::CheckOut { items, .. } | Step::Return { items, .. } => {
                items.iter().map(String::as_str).collect()
            }
            Step::Reserve { item, .. }
            | Step::CancelReservation { item, .. }
            | Step::Fee { item, .. }
            | Step::Show { item } => vec![item.as_str()],
            Step::Status => vec![],
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Step::CheckOut {
                customer,
                items,
                date,
            } => write!(f, "check_out {customer} [{}] on {date}", items.join(", ")),
            Step::Return { items, date } => write!(f, "return [{}] on {date}", items.join(", ")),
            Step::Reserve { customer, item } => write!(f, "reserve {item} for {customer}"),
            Step::CancelReservation { customer, item } => {
                write!(f, "cancel_reservation {item} for {customer}")
            }
            Step::Fee {
                item,
                from: Some(from),
                to,
            } => write!(f, "fee {item} from {from} to {to}"),
            Step::Fee {
                item,
                from: None,
                to,
            } => write!(f, "fee {item} until {to}"),
            Step::Show { item } => write!(f, "show {item}"),
            Step::Status => f.write_str("status"),
        }
    }
}

/// A parsed scenario document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Scenario {
    pub customers: Vec<CustomerSpec>,
    pub items: Vec<ItemSpec>,
    pub rentals: Vec<RentalSpec>,
    pub steps: Vec<Step>,
}

impl Scenario {
    /// Read and validate a scenario file.
    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ScenarioError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::parse(&contents, &path.display().to_string())
    }

    /// Parse and validate scenario text. `origin` names it in errors.
    pub fn parse(contents: &str, origin: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = toml::from_str(contents).map_err(|e| ScenarioError::Parse {
            origin: origin.to_string(),
            message: e.to_string(),
        })?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Check declarations are unique and every reference resolves.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        let mut numbers = HashSet::new();
        for customer in &self.customers {
            if !numbers.insert(customer.number) {
                return Err(ScenarioError::DuplicateCustomer(customer.number));
            }
        }

        let mut keys = HashSet::new();
        for item in &self.items {
            if !keys.insert(item.key.as_str()) {
                return Err(ScenarioError::DuplicateItem(item.key.clone()));
            }
        }

        let check_customer = |context: &dyn Fn() -> String, number: CustomerNumber| {
            if numbers.contains(&number) {
                Ok(())
            } else {
                Err(ScenarioError::UnknownCustomer {
                    context: context(),
                    number,
                })
            }
        };
        let check_item = |context: &dyn Fn() -> String, key: &str| {
            if keys.contains(key) {
                Ok(())
            } else {
                Err(ScenarioError::UnknownItem {
                    context: context(),
                    key: key.to_string(),
                })
            }
        };

        for (index, rental) in self.rentals.iter().enumerate() {
            let context = || format!("rental {}", index + 1);
            check_customer(&context, rental.customer)?;
            check_item(&context, &rental.item)?;
        }

        for (index, step) in self.steps.iter().enumerate() {
            let context = || format!("step {} ({step})", index + 1);
            if let Some(number) = step.customer() {
                check_customer(&context, number)?;
            }
            for key in step.item_keys() {
                check_item(&context, key)?;
            }
        }

        Ok(())
    }
}

/// Result of one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step took effect; the text describes what happened.
    Applied(String),
    /// The ledger refused the step.
    Rejected(String),
}

impl StepOutcome {
    pub fn is_rejected(&self) -> bool {
        matches!(self, StepOutcome::Rejected(_))
    }
}

/// One line of a replay report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    /// 1-based step number.
    pub index: usize,
    pub step: String,
    pub outcome: StepOutcome,
}

/// Everything a replay produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    pub steps: Vec<StepReport>,
    /// Change notifications delivered during the replay.
    pub notifications: usize,
    /// Items still lent at the end.
    pub lent: usize,
}

impl Report {
    pub fn rejected(&self) -> usize {
        self.steps.iter().filter(|s| s.outcome.is_rejected()).count()
    }
}

/// Collects every change the ledger announces.
#[derive(Debug, Default)]
struct ChangeLog {
    changes: Mutex<Vec<LedgerChange>>,
}

impl ChangeLog {
    fn snapshot(&self) -> Vec<LedgerChange> {
        self.changes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ChangeListener for ChangeLog {
    fn on_change(&self, change: &LedgerChange) {
        self.changes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(change.clone());
    }
}

/// A ledger populated from a scenario, ready to apply steps.
pub struct Replay {
    ledger: RentalLedger,
    customers: HashMap<CustomerNumber, Customer>,
    items: HashMap<String, Item>,
    /// Item keys in declaration order.
    order: Vec<String>,
    changes: Arc<ChangeLog>,
}

impl Replay {
    /// Build the registries and ledger described by `scenario`.
    ///
    /// Items without their own `daily_rate` get `default_rate`.
    pub fn new(
        scenario: &Scenario,
        protocol: Box<dyn ProtocolSink>,
        default_rate: Amount,
    ) -> Result<Self, ScenarioError> {
        scenario.validate()?;

        let customers: HashMap<_, _> = scenario
            .customers
            .iter()
            .map(|c| {
                let customer = Customer::new(c.number, c.first_name.as_str(), c.last_name.as_str());
                (c.number, customer)
            })
            .collect();

        let mut items = HashMap::with_capacity(scenario.items.len());
        let mut order = Vec::with_capacity(scenario.items.len());
        for spec in &scenario.items {
            let rate = spec.daily_rate.map(Amount::from_minor).unwrap_or(default_rate);
            let item = Item::new(spec.kind, spec.title.as_str(), spec.comment.as_str())
                .with_daily_rate(rate)
                .map_err(|source| ScenarioError::InvalidItem {
                    key: spec.key.clone(),
                    source,
                })?;
            order.push(spec.key.clone());
            items.insert(spec.key.clone(), item);
        }

        let mut records = Vec::with_capacity(scenario.rentals.len());
        for (index, rental) in scenario.rentals.iter().enumerate() {
            let context = || format!("rental {}", index + 1);
            let customer = lookup_customer(&customers, rental.customer, context)?;
            let item = lookup_item(&items, &rental.item, context)?;
            records.push(RentalRecord::new(customer.clone(), item, rental.date));
        }

        let registry = InMemoryCustomers::with_customers(customers.values().cloned());
        let catalog = InMemoryCatalog::with_items(items.values());
        let mut ledger =
            RentalLedger::new(Arc::new(registry), Arc::new(catalog), protocol).with_records(records);

        let changes = Arc::new(ChangeLog::default());
        ledger.subscribe(changes.clone());

        info!(
            customers = customers.len(),
            items = items.len(),
            lent = ledger.lent_count(),
            "scenario loaded"
        );

        Ok(Self {
            ledger,
            customers,
            items,
            order,
            changes,
        })
    }

    /// Apply every step in order and collect the outcomes.
    pub fn run(&mut self, steps: &[Step]) -> Report {
        let reports = steps
            .iter()
            .enumerate()
            .map(|(index, step)| StepReport {
                index: index + 1,
                step: step.to_string(),
                outcome: self.apply(step),
            })
            .collect();

        Report {
            steps: reports,
            notifications: self.changes.snapshot().len(),
            lent: self.ledger.lent_count(),
        }
    }

    /// Apply one step.
    pub fn apply(&mut self, step: &Step) -> StepOutcome {
        match self.execute(step) {
            Ok(detail) => {
                debug!(%step, "step applied");
                StepOutcome::Applied(detail)
            }
            Err(e) => {
                debug!(%step, error = %e, "step rejected");
                StepOutcome::Rejected(e.to_string())
            }
        }
    }

    pub fn ledger(&self) -> &RentalLedger {
        &self.ledger
    }

    /// The item declared under `key`.
    pub fn item(&self, key: &str) -> Option<&Item> {
        self.items.get(key)
    }

    /// Every change delivered to the replay's listener so far.
    pub fn changes(&self) -> Vec<LedgerChange> {
        self.changes.snapshot()
    }

    fn execute(&mut self, step: &Step) -> Result<String, ScenarioError> {
        let context = || step.to_string();
        match step {
            Step::CheckOut {
                customer,
                items,
                date,
            } => {
                let customer = lookup_customer(&self.customers, *customer, context)?;
                let batch = lookup_items(&self.items, items, context)?;
                self.ledger.check_out(customer, &batch, *date)?;
                Ok(format!("{} item(s) lent to {customer}", batch.len()))
            }

            Step::Return { items, date } => {
                let batch = lookup_items(&self.items, items, context)?;
                let mut total = Some(Amount::ZERO);
                if self.ledger.all_lent(&batch)? {
                    for item in &batch {
                        let fee = match self.ledger.rental_record_of(item)?.fee(item, *date) {
                            Ok(fee) => Some(fee),
                            Err(e) => {
                                debug!(item = %item.id(), error = %e, "no fee for return");
                                None
                            }
                        };
                        total = total
                            .zip(fee)
                            .and_then(|(sum, fee)| sum.checked_add(fee));
                    }
                }
                self.ledger.return_items(&batch, *date)?;
                match total {
                    Some(total) => Ok(format!("{} item(s) returned, fee {total}", batch.len())),
                    None => Ok(format!(
                        "{} item(s) returned, fee not computable",
                        batch.len()
                    )),
                }
            }

            Step::Reserve { customer, item } => {
                let customer = lookup_customer(&self.customers, *customer, context)?;
                let item = lookup_item_mut(&mut self.items, item, context)?;
                self.ledger.reserve(customer, item)?;
                Ok(format!(
                    "{customer} queued at position {}",
                    item.reservations().len()
                ))
            }

            Step::CancelReservation { customer, item } => {
                let customer = lookup_customer(&self.customers, *customer, context)?;
                let item = lookup_item_mut(&mut self.items, item, context)?;
                self.ledger.cancel_reservation(customer, item)?;
                Ok(format!(
                    "{customer} removed, {} still queued",
                    item.reservations().len()
                ))
            }

            Step::Fee { item, from, to } => {
                let item = lookup_item(&self.items, item, context)?;
                let fee = match from {
                    Some(from) => item.rental_fee(*from, *to)?,
                    None => self.ledger.rental_record_of(item)?.fee(item, *to)?,
                };
                Ok(format!("fee {fee}"))
            }

            Step::Show { item } => {
                let item = lookup_item(&self.items, item, context)?;
                let mut text = item.formatted_description();
                if self.ledger.is_lent(item)? {
                    text.push_str(&self.ledger.rental_record_of(item)?.formatted_description());
                }
                Ok(text.trim_end().to_string())
            }

            Step::Status => {
                let mut lines = Vec::with_capacity(self.order.len());
                for key in &self.order {
                    let item = lookup_item(&self.items, key, context)?;
                    lines.push(self.status_line(key, item)?);
                }
                Ok(lines.join("\n"))
            }
        }
    }

    fn status_line(&self, key: &str, item: &Item) -> Result<String, ScenarioError> {
        let mut line = if self.ledger.is_lent(item)? {
            let record = self.ledger.rental_record_of(item)?;
            format!(
                "{key}: lent to {} since {}",
                record.customer(),
                record.checkout_date()
            )
        } else {
            format!("{key}: available")
        };

        let reservers = self.ledger.reservers_of(item)?;
        if !reservers.is_empty() {
            let numbers: Vec<String> = reservers.iter().map(|c| c.number().to_string()).collect();
            line.push_str(&format!("; reserved by {}", numbers.join(", ")));
        }
        Ok(line)
    }
}

impl std::fmt::Debug for Replay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Replay")
            .field("ledger", &self.ledger)
            .field("customers", &self.customers.len())
            .field("items", &self.order)
            .finish_non_exhaustive()
    }
}

fn lookup_customer(
    customers: &HashMap<CustomerNumber, Customer>,
    number: CustomerNumber,
    context: impl Fn() -> String,
) -> Result<&Customer, ScenarioError> {
    customers
        .get(&number)
        .ok_or_else(|| ScenarioError::UnknownCustomer {
            context: context(),
            number,
        })
}

fn lookup_item<'a>(
    items: &'a HashMap<String, Item>,
    key: &str,
    context: impl Fn() -> String,
) -> Result<&'a Item, ScenarioError> {
    items.get(key).ok_or_else(|| ScenarioError::UnknownItem {
        context: context(),
        key: key.to_string(),
    })
}

fn lookup_item_mut<'a>(
    items: &'a mut HashMap<String, Item>,
    key: &str,
    context: impl Fn() -> String,
) -> Result<&'a mut Item, ScenarioError> {
    items.get_mut(key).ok_or_else(|| ScenarioError::UnknownItem {
        context: context(),
        key: key.to_string(),
    })
}

fn lookup_items<'a>(
    items: &'a HashMap<String, Item>,
    keys: &[String],
    context: impl Fn() -> String,
) -> Result<Vec<&'a Item>, ScenarioError> {
    keys.iter()
        .map(|key| lookup_item(items, key, &context))
        .collect()
}
