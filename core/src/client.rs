//! Collaborator interfaces — the remote-service boundary.
//!
//! RULE: Only MetricsApi implementations perform I/O.
//! The engine is a pure transformation layer between a fetch client and a
//! render layer; it calls these methods and never opens a socket itself.

use crate::record::MetricRecord;
use crate::types::RowId;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed response: {0}")]
    Decode(String),
}

/// The query scope for a record fetch. An empty description list is an
/// unscoped query; `entity_key` narrows to one country/company when set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterContext {
    pub descriptions: Vec<String>,
    pub entity_key: Option<String>,
}

impl FilterContext {
    pub fn for_descriptions(descriptions: Vec<String>) -> Self {
        Self {
            descriptions,
            entity_key: None,
        }
    }
}

/// The contract every collaborator backend must fulfill.
///
/// All five operations map to remote endpoints owned elsewhere. Any of
/// them may fail with a network error; the engine degrades per its error
/// taxonomy instead of propagating a panic.
pub trait MetricsApi {
    fn fetch_records(&self, ctx: &FilterContext) -> Result<Vec<MetricRecord>, ApiError>;

    fn fetch_selection_set(&self) -> Result<Vec<String>, ApiError>;

    fn write_selection_set(&self, descriptions: &[String]) -> Result<(), ApiError>;

    fn fetch_row_selection(&self, description: &str) -> Result<Vec<RowId>, ApiError>;

    fn write_row_selection(&self, description: &str, row_ids: &[RowId]) -> Result<(), ApiError>;
}

// The engine is single-threaded by contract, so an Rc'd backend can serve
// a session and an outside observer (tests, the headless runner) at once.
impl<A: MetricsApi + ?Sized> MetricsApi for std::rc::Rc<A> {
    fn fetch_records(&self, ctx: &FilterContext) -> Result<Vec<MetricRecord>, ApiError> {
        (**self).fetch_records(ctx)
    }

    fn fetch_selection_set(&self) -> Result<Vec<String>, ApiError> {
        (**self).fetch_selection_set()
    }

    fn write_selection_set(&self, descriptions: &[String]) -> Result<(), ApiError> {
        (**self).write_selection_set(descriptions)
    }

    fn fetch_row_selection(&self, description: &str) -> Result<Vec<RowId>, ApiError> {
        (**self).fetch_row_selection(description)
    }

    fn write_row_selection(&self, description: &str, row_ids: &[RowId]) -> Result<(), ApiError> {
        (**self).write_row_selection(description, row_ids)
    }
}

// ── In-memory backend ────────────────────────────────────────────────────────

/// An in-process MetricsApi (used in tests and by the headless runner as a
/// default). Holds server-side truth behind a RefCell — the engine is
/// single-threaded by contract, so interior mutability is enough.
///
/// `fail_once` arms a one-shot injected failure for a named operation,
/// which is how tests exercise the rollback and fallback paths.
#[derive(Default)]
pub struct InMemoryApi {
    state: RefCell<InMemoryState>,
}

#[derive(Default)]
struct InMemoryState {
    records: Vec<MetricRecord>,
    selection: Vec<String>,
    rows: HashMap<String, Vec<RowId>>,
    fail_once: HashSet<&'static str>,
    calls: HashMap<&'static str, usize>,
}

impl InMemoryApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<MetricRecord>) -> Self {
        let api = Self::default();
        api.state.borrow_mut().records = records;
        api
    }

    pub fn seed_records(&self, records: Vec<MetricRecord>) {
        self.state.borrow_mut().records = records;
    }

    pub fn seed_selection(&self, descriptions: &[&str]) {
        self.state.borrow_mut().selection =
            descriptions.iter().map(|d| d.to_string()).collect();
    }

    /// Arm a one-shot failure for `op` ("fetch_records",
    /// "fetch_selection_set", "write_selection_set", "fetch_row_selection",
    /// "write_row_selection"). The next call to that operation fails.
    pub fn fail_once(&self, op: &'static str) {
        self.state.borrow_mut().fail_once.insert(op);
    }

    /// How many times `op` has been invoked. Lets tests pin trigger
    /// de-duplication without poking scheduler internals.
    pub fn call_count(&self, op: &str) -> usize {
        self.state.borrow().calls.get(op).copied().unwrap_or(0)
    }

    /// Server-side truth, for assertions.
    pub fn server_selection(&self) -> Vec<String> {
        self.state.borrow().selection.clone()
    }

    pub fn server_row_selection(&self, description: &str) -> Vec<RowId> {
        self.state
            .borrow()
            .rows
            .get(description)
            .cloned()
            .unwrap_or_default()
    }

    fn enter(&self, op: &'static str) -> Result<(), ApiError> {
        let mut state = self.state.borrow_mut();
        *state.calls.entry(op).or_insert(0) += 1;
        if state.fail_once.remove(op) {
            return Err(ApiError::Network(format!("injected failure: {op}")));
        }
        Ok(())
    }
}

impl MetricsApi for InMemoryApi {
    fn fetch_records(&self, ctx: &FilterContext) -> Result<Vec<MetricRecord>, ApiError> {
        self.enter("fetch_records")?;
        let state = self.state.borrow();
        let records = state
            .records
            .iter()
            .filter(|r| {
                ctx.descriptions.is_empty() || ctx.descriptions.contains(&r.description)
            })
            .filter(|r| {
                ctx.entity_key
                    .as_ref()
                    .map(|e| *e == r.entity_key)
                    .unwrap_or(true)
            })
            .cloned()
            .collect();
        Ok(records)
    }

    fn fetch_selection_set(&self) -> Result<Vec<String>, ApiError> {
        self.enter("fetch_selection_set")?;
        Ok(self.state.borrow().selection.clone())
    }

    fn write_selection_set(&self, descriptions: &[String]) -> Result<(), ApiError> {
        self.enter("write_selection_set")?;
        // Last writer wins, as at the real server.
        self.state.borrow_mut().selection = descriptions.to_vec();
        Ok(())
    }

    fn fetch_row_selection(&self, description: &str) -> Result<Vec<RowId>, ApiError> {
        self.enter("fetch_row_selection")?;
        Ok(self
            .state
            .borrow()
            .rows
            .get(description)
            .cloned()
            .unwrap_or_default())
    }

    fn write_row_selection(&self, description: &str, row_ids: &[RowId]) -> Result<(), ApiError> {
        self.enter("write_row_selection")?;
        let mut state = self.state.borrow_mut();
        if row_ids.is_empty() {
            state.rows.remove(description);
        } else {
            state.rows.insert(description.to_string(), row_ids.to_vec());
        }
        Ok(())
    }
}
