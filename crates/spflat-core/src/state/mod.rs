// # Persisted State
//
// The outcome of a run is a mapping from sending domain to its flattened
// result. It is loaded at startup, replaced or retained by the driver, and
// written back when the run ends.

pub mod file;

pub use file::StateFile;

use crate::fingerprint::fingerprint;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Flattened addresses of one sending domain and their fingerprint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlattenedResult {
    /// Fingerprint of `records`
    pub sum: String,
    /// Flattened network strings in crawler order
    pub records: Vec<String>,
}

impl FlattenedResult {
    /// Fingerprint `records` and wrap them
    pub fn new(records: Vec<String>) -> Self {
        Self {
            sum: fingerprint(&records),
            records,
        }
    }

    /// Whether two results carry the same fingerprint
    pub fn same_as(&self, other: &FlattenedResult) -> bool {
        self.sum == other.sum
    }
}

/// Sending domain → most recent flattened result
///
/// Keys are kept sorted so the state file is stable across runs.
pub type PersistedState = BTreeMap<String, FlattenedResult>;
