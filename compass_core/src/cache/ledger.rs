//! Per-sample progress markers

use serde::{Deserialize, Serialize};

/// Where a sample is in its lifecycle, as recorded on disk
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Progress {
    NotStarted,
    /// Claimed by a worker, results may be partial
    InProgress,
    /// Every reaction has a durable, verified result
    Complete,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct LedgerEntry {
    pub sample: String,
    pub state: Progress,
}
