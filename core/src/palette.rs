//! Deterministic row coloring by (category, premium-type) pair.
//!
//! Assignment is round-robin over the fixed palette, in first-seen order
//! of the pairs in the current snapshot. The same pair always gets the
//! same color within one snapshot; a new snapshot may reassign.

use crate::record::MetricRecord;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RowColor {
    pub background: &'static str,
    pub border: &'static str,
}

/// The fixed ordered palette.
/// NEVER reorder or remove entries — only append.
/// Reordering silently recolors every dashboard.
pub const PALETTE: [RowColor; 8] = [
    RowColor { background: "#e8f1fb", border: "#5b9bd5" },
    RowColor { background: "#fdeaea", border: "#d9655f" },
    RowColor { background: "#eaf6ec", border: "#61a878" },
    RowColor { background: "#fff4dd", border: "#d8a43a" },
    RowColor { background: "#f2ecfa", border: "#8e6fc7" },
    RowColor { background: "#e6f6f8", border: "#4aa6b5" },
    RowColor { background: "#fbeef5", border: "#c96d9e" },
    RowColor { background: "#f1f2ed", border: "#8e9676" },
];

/// What an unknown pair gets.
pub const NEUTRAL: RowColor = RowColor {
    background: "#ffffff",
    border: "#d9d9d9",
};

#[derive(Debug, Default)]
pub struct ColorAssigner {
    // (category, premium_type, color), in assignment order. Pair counts
    // are small (tens), so a scan beats a map here.
    assigned: Vec<(String, String, RowColor)>,
}

impl ColorAssigner {
    /// Assign palette entries round-robin over the distinct
    /// (category, premium_type) pairs of `records`, first-seen order.
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a MetricRecord>) -> Self {
        let mut assigned: Vec<(String, String, RowColor)> = Vec::new();
        for record in records {
            let seen = assigned
                .iter()
                .any(|(c, p, _)| *c == record.category && *p == record.premium_type);
            if !seen {
                let color = PALETTE[assigned.len() % PALETTE.len()];
                assigned.push((record.category.clone(), record.premium_type.clone(), color));
            }
        }
        Self { assigned }
    }

    pub fn color_for(&self, category: &str, premium_type: &str) -> RowColor {
        self.assigned
            .iter()
            .find(|(c, p, _)| c == category && p == premium_type)
            .map(|(_, _, color)| *color)
            .unwrap_or(NEUTRAL)
    }

    /// Number of distinct pairs seen in the snapshot.
    pub fn len(&self) -> usize {
        self.assigned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assigned.is_empty()
    }
}
