//! The globally shared, admin-curated selection set and the per-description
//! row curation that hangs off it.
//!
//! RULE: Mutations are optimistic locally, authoritative at the server.
//! Every write is followed by a read-back that overwrites local state with
//! the server's answer; a failed write rolls local state back to its
//! pre-mutation value. Concurrent admins race at the server — last
//! successful write wins, and every client converges on its next poll.

use crate::client::MetricsApi;
use crate::error::{DashError, DashResult};
use crate::types::RowId;
use std::collections::{BTreeMap, BTreeSet};

/// Who is asking. Mutation entry points are gated on `is_admin`;
/// reads are open to everyone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub is_admin: bool,
}

impl Actor {
    pub const fn admin() -> Self {
        Self { is_admin: true }
    }

    pub const fn viewer() -> Self {
        Self { is_admin: false }
    }
}

/// What happened to a requested mutation. Rejections are no-ops by
/// contract — never errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    RejectedPrivilege,
    RejectedPrecondition,
}

impl Outcome {
    pub fn applied(self) -> bool {
        matches!(self, Outcome::Applied)
    }
}

#[derive(Debug, Default)]
pub struct SelectionSync {
    selected: BTreeSet<String>,
    rows: BTreeMap<String, BTreeSet<RowId>>,
}

impl SelectionSync {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected(&self) -> &BTreeSet<String> {
        &self.selected
    }

    pub fn contains(&self, description: &str) -> bool {
        self.selected.contains(description)
    }

    /// The selection in sorted order — the content key the scheduler
    /// de-duplicates record fetches on, and the form every write sends.
    pub fn sorted_selection(&self) -> Vec<String> {
        self.selected.iter().cloned().collect()
    }

    pub fn row_selection(&self, description: &str) -> Option<&BTreeSet<RowId>> {
        self.rows.get(description)
    }

    /// Overwrite local state with the server's authoritative answer.
    /// Row curation for descriptions the server dropped goes with them.
    pub fn overwrite_from_server(&mut self, descriptions: Vec<String>) {
        self.selected = descriptions.into_iter().collect();
        self.rows.retain(|d, _| self.selected.contains(d));
    }

    /// Drop every selected description that no longer resolves to a live,
    /// active record, cascading its row curation away. Returns what was
    /// pruned. Applying this twice with the same `live` set is a no-op
    /// the second time.
    pub fn prune_if_missing(&mut self, live: &BTreeSet<String>) -> Vec<String> {
        let stale: Vec<String> = self
            .selected
            .iter()
            .filter(|d| !live.contains(*d))
            .cloned()
            .collect();
        for description in &stale {
            self.selected.remove(description);
            self.rows.remove(description);
            log::info!("pruned stale selection {description:?}");
        }
        stale
    }

    // ── Mutations ────────────────────────────────────────────────────

    /// Flip a description's dashboard membership, persist the full set,
    /// then reconcile to server truth.
    pub fn toggle_description(
        &mut self,
        api: &dyn MetricsApi,
        actor: Actor,
        description: &str,
    ) -> DashResult<Outcome> {
        if !actor.is_admin {
            log::debug!("toggle of {description:?} rejected: actor lacks admin");
            return Ok(Outcome::RejectedPrivilege);
        }

        let prev_selected = self.selected.clone();
        let prev_rows = self.rows.clone();

        if self.selected.remove(description) {
            // Deselecting cascades the row curation away.
            self.rows.remove(description);
        } else {
            self.selected.insert(description.to_string());
        }

        let outgoing = self.sorted_selection();
        if let Err(source) = api.write_selection_set(&outgoing) {
            self.selected = prev_selected;
            self.rows = prev_rows;
            log::warn!("selection write failed, rolled back: {source}");
            return Err(DashError::Api {
                resource: "selection_set",
                source,
            });
        }

        // The write landed. If the read-back fails, the optimistic set
        // (which the server just accepted) stands until the next poll.
        match api.fetch_selection_set() {
            Ok(server) => {
                self.overwrite_from_server(server);
                Ok(Outcome::Applied)
            }
            Err(source) => {
                log::warn!("selection read-back failed, keeping optimistic set: {source}");
                Err(DashError::Api {
                    resource: "selection_set",
                    source,
                })
            }
        }
    }

    /// Select or deselect one row under a dashboard-visible description.
    /// Row curation is only meaningful for descriptions already in the
    /// selection set ("select in dashboard first").
    pub fn set_row_selection(
        &mut self,
        api: &dyn MetricsApi,
        actor: Actor,
        description: &str,
        row_id: RowId,
        selected: bool,
    ) -> DashResult<Outcome> {
        if !actor.is_admin {
            return Ok(Outcome::RejectedPrivilege);
        }
        if !self.selected.contains(description) {
            log::debug!("row curation for {description:?} rejected: not in dashboard selection");
            return Ok(Outcome::RejectedPrecondition);
        }

        let prev = self.rows.get(description).cloned();
        let mut set = prev.clone().unwrap_or_default();
        if selected {
            set.insert(row_id);
        } else {
            set.remove(&row_id);
        }
        self.put_rows(description, set);
        self.persist_rows(api, description, prev)
    }

    /// Bulk variant: replace the curation under `description` with the
    /// given ids. Same precondition as set_row_selection.
    pub fn select_all(
        &mut self,
        api: &dyn MetricsApi,
        actor: Actor,
        description: &str,
        row_ids: &[RowId],
    ) -> DashResult<Outcome> {
        if !actor.is_admin {
            return Ok(Outcome::RejectedPrivilege);
        }
        if !self.selected.contains(description) {
            return Ok(Outcome::RejectedPrecondition);
        }

        let prev = self.rows.get(description).cloned();
        self.put_rows(description, row_ids.iter().copied().collect());
        self.persist_rows(api, description, prev)
    }

    /// Bulk variant: drop the whole curation under `description`.
    pub fn clear_all(
        &mut self,
        api: &dyn MetricsApi,
        actor: Actor,
        description: &str,
    ) -> DashResult<Outcome> {
        if !actor.is_admin {
            return Ok(Outcome::RejectedPrivilege);
        }
        if !self.selected.contains(description) {
            return Ok(Outcome::RejectedPrecondition);
        }

        let prev = self.rows.remove(description);
        self.persist_rows(api, description, prev)
    }

    // ── Internals ────────────────────────────────────────────────────

    // Entries never hold an empty set; "no rows curated" is "no entry".
    fn put_rows(&mut self, description: &str, set: BTreeSet<RowId>) {
        if set.is_empty() {
            self.rows.remove(description);
        } else {
            self.rows.insert(description.to_string(), set);
        }
    }

    fn persist_rows(
        &mut self,
        api: &dyn MetricsApi,
        description: &str,
        prev: Option<BTreeSet<RowId>>,
    ) -> DashResult<Outcome> {
        let outgoing: Vec<RowId> = self
            .rows
            .get(description)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default();

        if let Err(source) = api.write_row_selection(description, &outgoing) {
            match prev {
                Some(set) => {
                    self.rows.insert(description.to_string(), set);
                }
                None => {
                    self.rows.remove(description);
                }
            }
            log::warn!("row selection write for {description:?} failed, rolled back: {source}");
            return Err(DashError::Api {
                resource: "row_selection",
                source,
            });
        }

        match api.fetch_row_selection(description) {
            Ok(server) => {
                self.put_rows(description, server.into_iter().collect());
                Ok(Outcome::Applied)
            }
            Err(source) => {
                log::warn!("row selection read-back failed, keeping optimistic rows: {source}");
                Err(DashError::Api {
                    resource: "row_selection",
                    source,
                })
            }
        }
    }
}
