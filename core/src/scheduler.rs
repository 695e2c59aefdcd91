//! Refresh scheduling — poll cadence, trigger de-duplication, and
//! in-flight fetch guards.
//!
//! RULE: At most one in-flight fetch per trigger class. A trigger that
//! arrives while its class is busy is dropped, not queued — the next
//! natural trigger retries. A completion carrying a stale token is
//! rejected so a superseded fetch's result is discarded.

use crate::types::Tick;

/// The two trigger classes the scheduler guards independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchClass {
    SelectionSet,
    Records,
}

impl FetchClass {
    pub fn name(self) -> &'static str {
        match self {
            FetchClass::SelectionSet => "selection_set",
            FetchClass::Records => "records",
        }
    }
}

/// Proof that a fetch was begun. Completion hands it back; only the
/// newest token for a class is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchToken {
    class: FetchClass,
    seq: u64,
}

impl FetchToken {
    pub fn class(self) -> FetchClass {
        self.class
    }
}

#[derive(Debug)]
pub struct RefreshScheduler {
    poll_interval: Tick,
    last_selection_poll: Option<Tick>,
    navigation_pending: bool,
    selection_busy: bool,
    records_busy: bool,
    selection_seq: u64,
    records_seq: u64,
    // The sorted selection the last successful record fetch covered.
    // Content-based, so irrelevant re-renders never refetch.
    last_records_key: Option<Vec<String>>,
}

impl RefreshScheduler {
    pub fn new(poll_interval: Tick) -> Self {
        Self {
            poll_interval,
            last_selection_poll: None,
            navigation_pending: false,
            selection_busy: false,
            records_busy: false,
            selection_seq: 0,
            records_seq: 0,
            last_records_key: None,
        }
    }

    // ── Selection-set polling ────────────────────────────────────────

    /// Navigation into a dashboard view forces the next poll check true.
    pub fn note_navigation(&mut self) {
        self.navigation_pending = true;
    }

    pub fn selection_poll_due(&self, tick: Tick) -> bool {
        if self.navigation_pending {
            return true;
        }
        match self.last_selection_poll {
            None => true,
            Some(last) => tick.saturating_sub(last) >= self.poll_interval,
        }
    }

    /// Claim the selection-fetch slot. None while a fetch is in flight —
    /// the trigger is dropped.
    pub fn begin_selection_fetch(&mut self, tick: Tick) -> Option<FetchToken> {
        if self.selection_busy {
            return None;
        }
        self.selection_busy = true;
        self.navigation_pending = false;
        self.last_selection_poll = Some(tick);
        self.selection_seq += 1;
        Some(FetchToken {
            class: FetchClass::SelectionSet,
            seq: self.selection_seq,
        })
    }

    /// Release the slot. False means the token is stale (a newer fetch
    /// superseded it) and the caller must discard its result.
    pub fn finish_selection_fetch(&mut self, token: FetchToken) -> bool {
        if token.class != FetchClass::SelectionSet
            || !self.selection_busy
            || token.seq != self.selection_seq
        {
            return false;
        }
        self.selection_busy = false;
        true
    }

    // ── Record fetching ──────────────────────────────────────────────

    /// True when the sorted selection differs from the set the last
    /// record fetch was issued for.
    pub fn records_fetch_needed(&self, selection_sorted: &[String]) -> bool {
        match &self.last_records_key {
            None => true,
            Some(key) => key != selection_sorted,
        }
    }

    pub fn begin_records_fetch(&mut self) -> Option<FetchToken> {
        if self.records_busy {
            return None;
        }
        self.records_busy = true;
        self.records_seq += 1;
        Some(FetchToken {
            class: FetchClass::Records,
            seq: self.records_seq,
        })
    }

    /// Release the slot. `fetched_for` is the key the fetch covered, or
    /// None when it failed — a failure leaves the key unchanged so the
    /// next trigger retries. False means the token is stale.
    pub fn finish_records_fetch(
        &mut self,
        token: FetchToken,
        fetched_for: Option<&[String]>,
    ) -> bool {
        if token.class != FetchClass::Records
            || !self.records_busy
            || token.seq != self.records_seq
        {
            return false;
        }
        self.records_busy = false;
        if let Some(key) = fetched_for {
            self.last_records_key = Some(key.to_vec());
        }
        true
    }

    /// Mark the current snapshot as also covering `key`. Used after a
    /// prune: the pruned descriptions had no records, so the snapshot
    /// fetched for the wider key is byte-identical for the narrower one.
    pub fn note_records_key(&mut self, key: &[String]) {
        self.last_records_key = Some(key.to_vec());
    }
}
