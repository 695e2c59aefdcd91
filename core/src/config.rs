//! Engine tunables.

use crate::error::DashResult;
use crate::types::Tick;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashConfig {
    /// Ticks between selection-set polls.
    pub poll_interval_ticks: Tick,

    /// Premium-type options offered when a record fetch fails before any
    /// snapshot exists. Once a fetch has succeeded, options always derive
    /// from the last-known-good snapshot instead.
    pub fallback_premium_types: Vec<String>,

    /// Maximum memoized pivot builds kept per session.
    pub pivot_memo_capacity: usize,
}

impl Default for DashConfig {
    fn default() -> Self {
        Self {
            poll_interval_ticks: 30,
            fallback_premium_types: vec!["Life".into(), "Non-Life".into()],
            pivot_memo_capacity: 8,
        }
    }
}

impl DashConfig {
    pub fn from_json(json: &str) -> DashResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
