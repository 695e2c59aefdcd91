//! The cascading filter dimensions: premium-type → category → description.
//!
//! RULE: The cascade invariant holds before every read.
//! `category` is meaningless without `premium_type`, `description` without
//! both; any setter that changes an upstream dimension clears everything
//! below it in the same call.

use crate::record::RecordStore;
use serde::{Deserialize, Serialize};

/// The active filter selections. Empty string means "not selected"
/// (and acts as a wildcard when records are filtered).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterState {
    pub premium_type: String,
    pub category: String,
    pub description: String,
}

impl FilterState {
    /// The hierarchy invariant: no dimension is set unless everything
    /// above it is set too.
    pub fn is_consistent(&self) -> bool {
        (self.category.is_empty() || !self.premium_type.is_empty())
            && (self.description.is_empty() || !self.category.is_empty())
    }
}

/// Manages the three dependent dropdowns and their valid-option lists.
#[derive(Debug, Default)]
pub struct FilterCascade {
    state: FilterState,
}

impl FilterCascade {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &FilterState {
        &self.state
    }

    pub fn clear(&mut self) {
        self.state = FilterState::default();
    }

    // ── Derived option lists ─────────────────────────────────────────

    /// Distinct premium types over active records, first-seen order.
    pub fn premium_type_options(&self, store: &RecordStore) -> Vec<String> {
        distinct(store.active().map(|r| r.premium_type.as_str()))
    }

    /// Distinct categories under the selected premium type.
    /// Empty until a premium type is selected.
    pub fn category_options(&self, store: &RecordStore) -> Vec<String> {
        if self.state.premium_type.is_empty() {
            return Vec::new();
        }
        distinct(
            store
                .active()
                .filter(|r| r.premium_type == self.state.premium_type)
                .map(|r| r.category.as_str()),
        )
    }

    /// Distinct descriptions under the selected premium type and category.
    /// Empty until both upstream dimensions are selected.
    pub fn description_options(&self, store: &RecordStore) -> Vec<String> {
        if self.state.premium_type.is_empty() || self.state.category.is_empty() {
            return Vec::new();
        }
        distinct(
            store
                .active()
                .filter(|r| {
                    r.premium_type == self.state.premium_type
                        && r.category == self.state.category
                })
                .map(|r| r.description.as_str()),
        )
    }

    // ── Setters ──────────────────────────────────────────────────────

    /// Select a premium type. Illegal values are rejected silently
    /// (returns false, state untouched). Changing the value clears
    /// category and description in the same call.
    pub fn set_premium_type(&mut self, store: &RecordStore, value: &str) -> bool {
        if !value.is_empty() && !self.premium_type_options(store).iter().any(|o| o == value) {
            log::debug!("rejected premium_type {value:?}: not a current option");
            return false;
        }
        if self.state.premium_type == value {
            return true;
        }
        self.state.premium_type = value.to_string();
        self.state.category.clear();
        self.state.description.clear();
        true
    }

    pub fn set_category(&mut self, store: &RecordStore, value: &str) -> bool {
        if !value.is_empty() && !self.category_options(store).iter().any(|o| o == value) {
            log::debug!("rejected category {value:?}: not a current option");
            return false;
        }
        if self.state.category == value {
            return true;
        }
        self.state.category = value.to_string();
        self.state.description.clear();
        true
    }

    pub fn set_description(&mut self, store: &RecordStore, value: &str) -> bool {
        if !value.is_empty() && !self.description_options(store).iter().any(|o| o == value) {
            log::debug!("rejected description {value:?}: not a current option");
            return false;
        }
        self.state.description = value.to_string();
        true
    }

    /// Re-check the current selections against a fresh snapshot. A value
    /// that no longer appears cascades to '' exactly as a setter change
    /// would. Returns true when anything changed.
    pub fn revalidate(&mut self, store: &RecordStore) -> bool {
        let before = self.state.clone();

        if !self.state.premium_type.is_empty()
            && !self
                .premium_type_options(store)
                .iter()
                .any(|o| *o == self.state.premium_type)
        {
            self.clear();
        } else if !self.state.category.is_empty()
            && !self
                .category_options(store)
                .iter()
                .any(|o| *o == self.state.category)
        {
            self.state.category.clear();
            self.state.description.clear();
        } else if !self.state.description.is_empty()
            && !self
                .description_options(store)
                .iter()
                .any(|o| *o == self.state.description)
        {
            self.state.description.clear();
        }

        if self.state != before {
            log::info!("filter selections revalidated: {before:?} -> {:?}", self.state);
            true
        } else {
            false
        }
    }
}

/// Distinct non-empty values, preserving first-seen order.
fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for v in values {
        if v.is_empty() {
            continue;
        }
        if !out.iter().any(|seen| seen == v) {
            out.push(v.to_string());
        }
    }
    out
}
