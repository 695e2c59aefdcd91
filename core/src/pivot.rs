//! The pivot builder — flat records in, period-type-keyed pivot groups out.
//!
//! RULE: build_pivot never fails and never mutates its inputs.
//! Malformed rows are skipped and counted, not propagated; the same inputs
//! always produce structurally identical output.

use crate::filter::FilterState;
use crate::record::{CellValue, MetricRecord};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Row ordering within a pivot group. Source pages disagree on this, so
/// both behaviors are first-class options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowOrder {
    #[default]
    FirstSeen,
    Alphabetical,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct PivotOptions {
    pub row_order: RowOrder,
    /// Privileged audit views may include soft-deleted rows.
    /// Non-privileged views must not set this.
    pub include_inactive: bool,
}

/// Classification of a pivot row, constant per description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowMeta {
    pub category: String,
    pub premium_type: String,
}

/// One period-type's slice of the pivot: descriptions as rows, periods as
/// columns. `cells[d][p]` exists iff some record had that exact pair —
/// an absent entry renders as the "no data" sentinel, never as zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PivotGroup {
    pub periods: Vec<String>,
    pub descriptions: Vec<String>,
    pub cells: BTreeMap<String, BTreeMap<String, CellValue>>,
    pub units: BTreeMap<String, String>,
    pub meta: BTreeMap<String, RowMeta>,
}

/// The builder output: one group per period type plus the count of
/// malformed records that were skipped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PivotBuild {
    pub table: BTreeMap<String, PivotGroup>,
    pub skipped: usize,
}

impl PivotBuild {
    pub fn group(&self, period_type: &str) -> Option<&PivotGroup> {
        self.table.get(period_type)
    }
}

/// Numeric-aware period ordering: if both operands parse as integers,
/// compare numerically; otherwise lexically. Keeps "9" before "10" for
/// year columns while leaving labels like "2024-Q1" lexical.
pub fn period_cmp(a: &str, b: &str) -> Ordering {
    match (a.trim().parse::<i64>(), b.trim().parse::<i64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}

struct GroupAcc {
    periods: Vec<String>,
    descriptions: Vec<String>,
    cells: BTreeMap<String, BTreeMap<String, CellValue>>,
    units: BTreeMap<String, String>,
    meta: BTreeMap<String, RowMeta>,
}

impl GroupAcc {
    fn new() -> Self {
        Self {
            periods: Vec::new(),
            descriptions: Vec::new(),
            cells: BTreeMap::new(),
            units: BTreeMap::new(),
            meta: BTreeMap::new(),
        }
    }
}

fn matches_filters(record: &MetricRecord, filters: &FilterState) -> bool {
    // An empty dimension is a wildcard.
    (filters.premium_type.is_empty() || record.premium_type == filters.premium_type)
        && (filters.category.is_empty() || record.category == filters.category)
        && (filters.description.is_empty() || record.description == filters.description)
}

/// Reshape flat records into a pivot table keyed by period type.
///
/// Per (description, period) pair the LAST record wins (duplicate rows for
/// the same key overwrite earlier ones); unit and classification come from
/// the FIRST record for the description, since those are expected constant
/// while cell values vary per period.
pub fn build_pivot(
    records: &[MetricRecord],
    filters: &FilterState,
    options: PivotOptions,
) -> PivotBuild {
    let mut skipped = 0usize;
    let mut groups: BTreeMap<String, GroupAcc> = BTreeMap::new();

    for record in records {
        if !options.include_inactive && !record.is_active {
            continue;
        }
        if !matches_filters(record, filters) {
            continue;
        }
        // A row missing its grouping keys cannot land anywhere in the
        // table. Skip it, count it, keep building.
        if record.period_type.trim().is_empty()
            || record.description.trim().is_empty()
            || record.period.trim().is_empty()
        {
            skipped += 1;
            continue;
        }

        let group = groups
            .entry(record.period_type.clone())
            .or_insert_with(GroupAcc::new);

        if !group.periods.iter().any(|p| *p == record.period) {
            group.periods.push(record.period.clone());
        }
        if !group.descriptions.iter().any(|d| *d == record.description) {
            group.descriptions.push(record.description.clone());
        }

        group
            .cells
            .entry(record.description.clone())
            .or_default()
            .insert(record.period.clone(), record.value.clone());

        group
            .units
            .entry(record.description.clone())
            .or_insert_with(|| record.unit.clone());
        group
            .meta
            .entry(record.description.clone())
            .or_insert_with(|| RowMeta {
                category: record.category.clone(),
                premium_type: record.premium_type.clone(),
            });
    }

    let mut table = BTreeMap::new();
    for (period_type, mut acc) in groups {
        // A partition that gathered no rows or no columns is dropped,
        // never emitted as an empty group.
        if acc.periods.is_empty() || acc.descriptions.is_empty() {
            continue;
        }
        acc.periods.sort_by(|a, b| period_cmp(a, b));
        if options.row_order == RowOrder::Alphabetical {
            acc.descriptions.sort();
        }
        table.insert(
            period_type,
            PivotGroup {
                periods: acc.periods,
                descriptions: acc.descriptions,
                cells: acc.cells,
                units: acc.units,
                meta: acc.meta,
            },
        );
    }

    if skipped > 0 {
        log::warn!("pivot build skipped {skipped} malformed record(s)");
    }

    PivotBuild { table, skipped }
}
