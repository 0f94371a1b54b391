//! ExperienceRecord and query result types

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// One observation of how an executed action compared with its prediction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperienceRecord {
    /// Unique record ID (UUIDv7, time ordered)
    pub id: String,
    /// Task category the action was planned for (e.g. "book-flight-hotel")
    pub task_type: String,
    /// Action descriptor as planned, e.g. "search_flights(origin=SFO)"
    pub action_descriptor: String,
    /// Cost the planner assumed for the action
    pub predicted_cost: u64,
    /// Cost the execution engine actually observed
    pub observed_cost: u64,
    /// Creation timestamp (unix ms)
    pub timestamp: i64,
}

impl ExperienceRecord {
    /// Create a record stamped with the current time
    pub fn new(
        task_type: impl Into<String>,
        action_descriptor: impl Into<String>,
        predicted_cost: u64,
        observed_cost: u64,
    ) -> Self {
        let task_type = task_type.into();
        let action_descriptor = action_descriptor.into();
        debug!(%task_type, %action_descriptor, predicted_cost, observed_cost, "ExperienceRecord::new: called");
        Self {
            id: Uuid::now_v7().to_string(),
            task_type,
            action_descriptor,
            predicted_cost,
            observed_cost,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Override the timestamp (used by tests and imports)
    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// observed / predicted, or None when the prediction was zero
    pub fn ratio(&self) -> Option<f64> {
        if self.predicted_cost == 0 {
            None
        } else {
            Some(self.observed_cost as f64 / self.predicted_cost as f64)
        }
    }
}

/// A record returned from a query together with its action similarity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExperienceMatch {
    pub record: ExperienceRecord,
    /// Similarity of the stored descriptor to the queried one, in [0, 1]
    pub similarity: f64,
}

/// Summary statistics for a store
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreStats {
    pub record_count: usize,
    pub task_type_count: usize,
    pub oldest_timestamp: Option<i64>,
    pub newest_timestamp: Option<i64>,
    /// Mean observed/predicted ratio across records with a nonzero prediction
    pub mean_ratio: Option<f64>,
}
