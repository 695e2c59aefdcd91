//! The flat metric records fetched from the remote service, and the
//! in-memory snapshot that holds them.
//!
//! RULE: RecordStore is immutable per fetch. A refresh replaces the whole
//! snapshot; nothing ever mutates individual records in place.

use crate::types::RowId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use uuid::Uuid;

// ── Cell values ──────────────────────────────────────────────────────────────

/// A reported value. The wire format is a JSON number, a label string, or
/// one of the missing-value spellings ("-", "", null, absent field).
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    Number(f64),
    Text(String),
    #[default]
    Missing,
}

impl CellValue {
    pub fn is_missing(&self) -> bool {
        matches!(self, CellValue::Missing)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for CellValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }

        Ok(match Option::<Raw>::deserialize(deserializer)? {
            None => CellValue::Missing,
            Some(Raw::Number(n)) => CellValue::Number(n),
            Some(Raw::Text(s)) => {
                let trimmed = s.trim();
                if trimmed.is_empty() || trimmed == "-" {
                    CellValue::Missing
                } else {
                    CellValue::Text(s)
                }
            }
        })
    }
}

impl Serialize for CellValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            CellValue::Number(n) => serializer.serialize_f64(*n),
            CellValue::Text(s) => serializer.serialize_str(s),
            // The wire sentinel for "no data". Never rendered as zero.
            CellValue::Missing => serializer.serialize_str("-"),
        }
    }
}

// ── Records ──────────────────────────────────────────────────────────────────

/// One flat time-series row: description × period × entity.
/// Arrives from the remote API in camelCase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricRecord {
    pub description: String,
    pub premium_type: String,
    pub category: String,
    pub period_type: String,
    pub period: String,
    pub unit: String,
    #[serde(default)]
    pub value: CellValue,
    #[serde(default)]
    pub entity_key: String,
    pub row_id: RowId,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

// ── Snapshot store ───────────────────────────────────────────────────────────

/// The in-memory holder of the records fetched for the current filter
/// context. `snapshot_id` changes on every replace, so derived caches can
/// key on it instead of comparing record vectors.
pub struct RecordStore {
    records: Vec<MetricRecord>,
    snapshot_id: Uuid,
    fetched_at: Option<DateTime<Utc>>,
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::empty()
    }
}

impl RecordStore {
    /// A store that has never seen a fetch. Its snapshot id is nil so it
    /// never collides with a real snapshot.
    pub fn empty() -> Self {
        Self {
            records: Vec::new(),
            snapshot_id: Uuid::nil(),
            fetched_at: None,
        }
    }

    /// Replace the snapshot wholesale with a fresh fetch result.
    pub fn replace(&mut self, records: Vec<MetricRecord>) {
        self.records = records;
        self.snapshot_id = Uuid::new_v4();
        self.fetched_at = Some(Utc::now());
        log::debug!(
            "record store replaced: {} records, snapshot {}",
            self.records.len(),
            self.snapshot_id
        );
    }

    pub fn records(&self) -> &[MetricRecord] {
        &self.records
    }

    pub fn snapshot_id(&self) -> Uuid {
        self.snapshot_id
    }

    /// When the current snapshot was fetched. None until the first
    /// successful fetch — the fallback option list applies only then.
    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.fetched_at
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records visible to non-privileged views (soft-deleted rows excluded).
    pub fn active(&self) -> impl Iterator<Item = &MetricRecord> {
        self.records.iter().filter(|r| r.is_active)
    }

    /// Descriptions that still resolve to at least one active record.
    /// This is the set SelectionSync prunes against after every refresh.
    pub fn live_descriptions(&self) -> BTreeSet<String> {
        self.active()
            .filter(|r| !r.description.trim().is_empty())
            .map(|r| r.description.clone())
            .collect()
    }
}
