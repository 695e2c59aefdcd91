//! Observable engine transitions.
//!
//! RULE: Components never talk to the view layer directly.
//! Anything a dashboard (or a test) needs to observe about the engine's
//! behavior is appended to the session's event log as a DashEvent.

use crate::types::{SessionId, Tick};
use serde::{Deserialize, Serialize};

/// Every notable transition the session records.
/// Variants are appended over time — never removed or reordered.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DashEvent {
    // ── Lifecycle ──────────────────────────────────
    SessionStarted {
        session_id: SessionId,
    },

    // ── Fetch outcomes ─────────────────────────────
    SelectionFetched {
        tick: Tick,
        count: usize,
    },
    RecordsRefreshed {
        tick: Tick,
        count: usize,
    },
    FetchFailed {
        tick: Tick,
        resource: String,
        message: String,
    },

    // ── Scheduler decisions ────────────────────────
    TriggerDropped {
        tick: Tick,
        resource: String,
    },
    StaleResultDiscarded {
        tick: Tick,
        resource: String,
    },

    // ── Reconciliation ─────────────────────────────
    SelectionPruned {
        tick: Tick,
        description: String,
    },
    FiltersRevalidated {
        tick: Tick,
    },

    // ── Curation ───────────────────────────────────
    SelectionToggled {
        tick: Tick,
        description: String,
        selected: bool,
    },
    RowSelectionChanged {
        tick: Tick,
        description: String,
        rows: usize,
    },
    WriteRolledBack {
        tick: Tick,
        resource: String,
    },
}
