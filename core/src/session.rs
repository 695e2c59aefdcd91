//! The dashboard session — the heart of the engine.
//!
//! DATA FLOW (fixed, documented, never reordered):
//!   1. The scheduler triggers a selection-set load (poll or navigation).
//!   2. A selection content change triggers a record fetch.
//!   3. A fresh snapshot recomputes colors, prunes stale selections, and
//!      revalidates the filter cascade.
//!   4. Views pull pivots (memoized) and colors from here; they never
//!      reshape data themselves.
//!
//! RULES:
//!   - All remote I/O goes through the MetricsApi boundary.
//!   - No remote failure is fatal: the session degrades to the
//!     last-known-good snapshot and raises a dismissible notice.
//!   - Everything observable lands in the DashEvent log.

use crate::client::{ApiError, FilterContext, MetricsApi};
use crate::config::DashConfig;
use crate::error::DashResult;
use crate::event::DashEvent;
use crate::filter::{FilterCascade, FilterState};
use crate::palette::{ColorAssigner, RowColor};
use crate::pivot::{build_pivot, PivotBuild, PivotOptions};
use crate::record::{MetricRecord, RecordStore};
use crate::scheduler::{FetchClass, RefreshScheduler};
use crate::selection::{Actor, Outcome, SelectionSync};
use crate::types::{RowId, SessionId, Tick};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use uuid::Uuid;

/// A dismissible, user-visible banner raised when a remote call fails.
#[derive(Debug, Clone, Serialize)]
pub struct Notice {
    pub id: String,
    pub message: String,
    pub raised_at: DateTime<Utc>,
}

type MemoKey = (Uuid, FilterState, PivotOptions);

pub struct DashSession {
    session_id: SessionId,
    config: DashConfig,
    api: Box<dyn MetricsApi>,
    actor: Actor,
    current_tick: Tick,
    store: RecordStore,
    cascade: FilterCascade,
    selection: SelectionSync,
    scheduler: RefreshScheduler,
    colors: ColorAssigner,
    notices: Vec<Notice>,
    events: Vec<DashEvent>,
    memo: Vec<(MemoKey, PivotBuild)>,
}

impl DashSession {
    pub fn new(config: DashConfig, api: Box<dyn MetricsApi>, actor: Actor) -> Self {
        let session_id: SessionId = Uuid::new_v4().to_string();
        let scheduler = RefreshScheduler::new(config.poll_interval_ticks);
        log::info!("session {session_id} started (admin={})", actor.is_admin);
        let mut session = Self {
            session_id: session_id.clone(),
            config,
            api,
            actor,
            current_tick: 0,
            store: RecordStore::empty(),
            cascade: FilterCascade::new(),
            selection: SelectionSync::new(),
            scheduler,
            colors: ColorAssigner::default(),
            notices: Vec::new(),
            events: Vec::new(),
            memo: Vec::new(),
        };
        session.events.push(DashEvent::SessionStarted { session_id });
        session
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Navigation into a dashboard view. Forces a selection-set reload
    /// check on top of the regular poll cadence.
    pub fn enter_dashboard(&mut self) {
        self.scheduler.note_navigation();
        self.run_due_work();
    }

    /// Advance one tick and run whatever became due.
    pub fn tick(&mut self) {
        self.current_tick += 1;
        self.run_due_work();
    }

    /// Run n ticks in a loop. Used for testing and the headless runner.
    pub fn run_ticks(&mut self, n: u64) {
        for _ in 0..n {
            self.tick();
        }
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn current_tick(&self) -> Tick {
        self.current_tick
    }

    pub fn actor(&self) -> Actor {
        self.actor
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn filter_state(&self) -> &FilterState {
        self.cascade.state()
    }

    pub fn selected_descriptions(&self) -> &BTreeSet<String> {
        self.selection.selected()
    }

    pub fn row_selection(&self, description: &str) -> Option<&BTreeSet<RowId>> {
        self.selection.row_selection(description)
    }

    pub fn events(&self) -> &[DashEvent] {
        &self.events
    }

    /// Drain the event log (the IPC runner ships these to its client).
    pub fn take_events(&mut self) -> Vec<DashEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn dismiss_notice(&mut self, id: &str) -> bool {
        let before = self.notices.len();
        self.notices.retain(|n| n.id != id);
        self.notices.len() != before
    }

    // ── Filters ──────────────────────────────────────────────────────

    /// Top-level dropdown options. Before the first successful fetch the
    /// configured fallback list is served so the dropdown still renders.
    pub fn premium_type_options(&self) -> Vec<String> {
        if self.store.fetched_at().is_none() {
            return self.config.fallback_premium_types.clone();
        }
        self.cascade.premium_type_options(&self.store)
    }

    pub fn category_options(&self) -> Vec<String> {
        self.cascade.category_options(&self.store)
    }

    pub fn description_options(&self) -> Vec<String> {
        self.cascade.description_options(&self.store)
    }

    pub fn set_premium_type(&mut self, value: &str) -> bool {
        self.cascade.set_premium_type(&self.store, value)
    }

    pub fn set_category(&mut self, value: &str) -> bool {
        self.cascade.set_category(&self.store, value)
    }

    pub fn set_description(&mut self, value: &str) -> bool {
        self.cascade.set_description(&self.store, value)
    }

    // ── Pivots and colors ────────────────────────────────────────────

    /// The pivot for the current snapshot and filters. Pure, so the
    /// result is memoized on (snapshot, filters, options) identity.
    pub fn pivot(&mut self, options: PivotOptions) -> &PivotBuild {
        let key: MemoKey = (
            self.store.snapshot_id(),
            self.cascade.state().clone(),
            options,
        );
        if let Some(idx) = self.memo.iter().position(|(k, _)| *k == key) {
            return &self.memo[idx].1;
        }

        let build = build_pivot(self.store.records(), self.cascade.state(), options);
        let capacity = self.config.pivot_memo_capacity.max(1);
        if self.memo.len() >= capacity {
            self.memo.remove(0);
        }
        self.memo.push((key, build));
        let idx = self.memo.len() - 1;
        &self.memo[idx].1
    }

    pub fn color_for(&self, category: &str, premium_type: &str) -> RowColor {
        self.colors.color_for(category, premium_type)
    }

    // ── Curation (admin-gated, see selection.rs) ─────────────────────

    pub fn toggle_description(&mut self, description: &str) -> DashResult<Outcome> {
        let before = self.selection.sorted_selection();
        match self
            .selection
            .toggle_description(self.api.as_ref(), self.actor, description)
        {
            Ok(outcome) => {
                if outcome.applied() {
                    let selected = self.selection.contains(description);
                    self.events.push(DashEvent::SelectionToggled {
                        tick: self.current_tick,
                        description: description.to_string(),
                        selected,
                    });
                    // The selection content changed; pick up matching
                    // records without waiting for the next tick.
                    self.refresh_records_if_needed();
                }
                Ok(outcome)
            }
            Err(err) => {
                if self.selection.sorted_selection() == before {
                    self.events.push(DashEvent::WriteRolledBack {
                        tick: self.current_tick,
                        resource: FetchClass::SelectionSet.name().to_string(),
                    });
                }
                self.push_notice(err.to_string());
                Err(err)
            }
        }
    }

    pub fn set_row_selection(
        &mut self,
        description: &str,
        row_id: RowId,
        selected: bool,
    ) -> DashResult<Outcome> {
        let before = self.selection.row_selection(description).cloned();
        let result = self.selection.set_row_selection(
            self.api.as_ref(),
            self.actor,
            description,
            row_id,
            selected,
        );
        self.finish_row_mutation(description, before, result)
    }

    pub fn select_all_rows(
        &mut self,
        description: &str,
        row_ids: &[RowId],
    ) -> DashResult<Outcome> {
        let before = self.selection.row_selection(description).cloned();
        let result =
            self.selection
                .select_all(self.api.as_ref(), self.actor, description, row_ids);
        self.finish_row_mutation(description, before, result)
    }

    pub fn clear_all_rows(&mut self, description: &str) -> DashResult<Outcome> {
        let before = self.selection.row_selection(description).cloned();
        let result = self
            .selection
            .clear_all(self.api.as_ref(), self.actor, description);
        self.finish_row_mutation(description, before, result)
    }

    // ── Internals ────────────────────────────────────────────────────

    fn run_due_work(&mut self) {
        self.poll_selection_if_due();
        self.refresh_records_if_needed();
    }

    fn poll_selection_if_due(&mut self) {
        if !self.scheduler.selection_poll_due(self.current_tick) {
            return;
        }
        let token = match self.scheduler.begin_selection_fetch(self.current_tick) {
            Some(token) => token,
            None => {
                self.events.push(DashEvent::TriggerDropped {
                    tick: self.current_tick,
                    resource: FetchClass::SelectionSet.name().to_string(),
                });
                return;
            }
        };

        let result = self.api.fetch_selection_set();
        if !self.scheduler.finish_selection_fetch(token) {
            self.events.push(DashEvent::StaleResultDiscarded {
                tick: self.current_tick,
                resource: FetchClass::SelectionSet.name().to_string(),
            });
            return;
        }

        match result {
            Ok(set) => {
                let count = set.len();
                self.selection.overwrite_from_server(set);
                self.events.push(DashEvent::SelectionFetched {
                    tick: self.current_tick,
                    count,
                });
            }
            // Last-known-good selection stands.
            Err(err) => self.fetch_failed(FetchClass::SelectionSet, err),
        }
    }

    fn refresh_records_if_needed(&mut self) {
        let key = self.selection.sorted_selection();
        if !self.scheduler.records_fetch_needed(&key) {
            return;
        }
        let token = match self.scheduler.begin_records_fetch() {
            Some(token) => token,
            None => {
                self.events.push(DashEvent::TriggerDropped {
                    tick: self.current_tick,
                    resource: FetchClass::Records.name().to_string(),
                });
                return;
            }
        };

        let ctx = FilterContext::for_descriptions(key.clone());
        let result = self.api.fetch_records(&ctx);
        let fetched_for = result.as_ref().ok().map(|_| key.as_slice());
        if !self.scheduler.finish_records_fetch(token, fetched_for) {
            self.events.push(DashEvent::StaleResultDiscarded {
                tick: self.current_tick,
                resource: FetchClass::Records.name().to_string(),
            });
            return;
        }

        match result {
            Ok(records) => self.apply_records(records),
            // Last-known-good snapshot stands.
            Err(err) => self.fetch_failed(FetchClass::Records, err),
        }
    }

    fn apply_records(&mut self, records: Vec<MetricRecord>) {
        let count = records.len();
        self.store.replace(records);
        self.colors = ColorAssigner::from_records(self.store.records());
        self.events.push(DashEvent::RecordsRefreshed {
            tick: self.current_tick,
            count,
        });

        let live = self.store.live_descriptions();
        let pruned = self.selection.prune_if_missing(&live);
        if !pruned.is_empty() {
            for description in pruned {
                self.events.push(DashEvent::SelectionPruned {
                    tick: self.current_tick,
                    description,
                });
            }
            // The pruned names had no records, so this snapshot also
            // covers the narrowed selection.
            let key = self.selection.sorted_selection();
            self.scheduler.note_records_key(&key);
        }

        if self.cascade.revalidate(&self.store) {
            self.events.push(DashEvent::FiltersRevalidated {
                tick: self.current_tick,
            });
        }
    }

    fn finish_row_mutation(
        &mut self,
        description: &str,
        before: Option<BTreeSet<RowId>>,
        result: DashResult<Outcome>,
    ) -> DashResult<Outcome> {
        match result {
            Ok(outcome) => {
                if outcome.applied() {
                    let rows = self
                        .selection
                        .row_selection(description)
                        .map(|s| s.len())
                        .unwrap_or(0);
                    self.events.push(DashEvent::RowSelectionChanged {
                        tick: self.current_tick,
                        description: description.to_string(),
                        rows,
                    });
                }
                Ok(outcome)
            }
            Err(err) => {
                if self.selection.row_selection(description).cloned() == before {
                    self.events.push(DashEvent::WriteRolledBack {
                        tick: self.current_tick,
                        resource: "row_selection".to_string(),
                    });
                }
                self.push_notice(err.to_string());
                Err(err)
            }
        }
    }

    fn fetch_failed(&mut self, class: FetchClass, err: ApiError) {
        let message = err.to_string();
        log::warn!("{} fetch failed: {message}", class.name());
        self.events.push(DashEvent::FetchFailed {
            tick: self.current_tick,
            resource: class.name().to_string(),
            message: message.clone(),
        });
        self.push_notice(format!("Could not refresh {}: {message}", class.name()));
    }

    fn push_notice(&mut self, message: String) {
        self.notices.push(Notice {
            id: Uuid::new_v4().to_string(),
            message,
            raised_at: Utc::now(),
        });
    }
}

impl Drop for DashSession {
    fn drop(&mut self) {
        log::debug!("session {} torn down at tick {}", self.session_id, self.current_tick);
    }
}
