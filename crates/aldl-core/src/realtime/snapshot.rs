//! Decoded telemetry snapshots

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One decoded set of parameter values captured at a point in time.
///
/// Snapshots are never modified after construction; the engine shares
/// them as `Arc<Snapshot>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    captured_at: DateTime<Utc>,
    values: BTreeMap<String, f64>,
    flags: BTreeMap<String, bool>,
}

impl Snapshot {
    /// Create a snapshot from decoded values
    pub fn new(
        captured_at: DateTime<Utc>,
        values: BTreeMap<String, f64>,
        flags: BTreeMap<String, bool>,
    ) -> Self {
        Self {
            captured_at,
            values,
            flags,
        }
    }

    /// Capture timestamp
    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Value of a parameter, if it was decoded
    pub fn get(&self, id: &str) -> Option<f64> {
        self.values.get(id).copied()
    }

    /// State of a bit flag, if it was decoded
    pub fn flag(&self, id: &str) -> Option<bool> {
        self.flags.get(id).copied()
    }

    /// All decoded parameter values keyed by parameter id
    pub fn values(&self) -> &BTreeMap<String, f64> {
        &self.values
    }

    /// All decoded bit flags keyed by bit id
    pub fn flags(&self) -> &BTreeMap<String, bool> {
        &self.flags
    }

    /// Number of decoded values
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no value was decoded
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
