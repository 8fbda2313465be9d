//! Per-item outcomes and the result aggregator.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reason recorded when a worker error carries no message of its own
pub const FALLBACK_REASON: &str = "unknown error";

/// Failure of a single work item. Never fatal to the job.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct ItemError {
    reason: String,
}

impl ItemError {
    pub fn new(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        let reason = if reason.trim().is_empty() {
            FALLBACK_REASON.to_string()
        } else {
            reason
        };
        Self { reason }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn into_reason(self) -> String {
        self.reason
    }
}

/// Recorded result of attempting one work item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum ItemOutcome<T> {
    Success { payload: T },
    Failure { reason: String },
}

impl<T> ItemOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, ItemOutcome::Success { .. })
    }

    pub fn payload(&self) -> Option<&T> {
        match self {
            ItemOutcome::Success { payload } => Some(payload),
            ItemOutcome::Failure { .. } => None,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            ItemOutcome::Success { .. } => None,
            ItemOutcome::Failure { reason } => Some(reason),
        }
    }
}

impl<T> From<Result<T, ItemError>> for ItemOutcome<T> {
    fn from(result: Result<T, ItemError>) -> Self {
        match result {
            Ok(payload) => ItemOutcome::Success { payload },
            Err(err) => ItemOutcome::Failure {
                reason: err.into_reason(),
            },
        }
    }
}

/// Outcome paired with the index of the item it belongs to.
///
/// Wire shape: `{ "index": 0, "outcome": "success", "payload": ... }` or
/// `{ "index": 1, "outcome": "failure", "reason": "..." }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord<T> {
    pub index: usize,
    #[serde(flatten)]
    pub outcome: ItemOutcome<T>,
}

/// Success and failure counts of a finished (or cancelled) job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Summary {
    pub succeeded: usize,
    pub failed: usize,
}

impl Summary {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }

    /// Human-readable line for the end of a batch, e.g. "3 succeeded, 1 failed"
    pub fn describe(&self, noun: &str) -> String {
        if self.failed == 0 {
            format!("All {} {} succeeded", self.succeeded, noun)
        } else {
            format!("{} succeeded, {} failed", self.succeeded, self.failed)
        }
    }
}

/// Single response assembled from the per-item outcomes of one job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregate<T> {
    pub succeeded: usize,
    pub failed: usize,
    pub items: Vec<ItemRecord<T>>,
}

impl<T> Aggregate<T> {
    /// Count outcomes of records that already carry their item index
    pub fn from_records(items: Vec<ItemRecord<T>>) -> Self {
        let succeeded = items.iter().filter(|r| r.outcome.is_success()).count();
        let failed = items.len() - succeeded;
        Self {
            succeeded,
            failed,
            items,
        }
    }

    pub fn summary(&self) -> Summary {
        Summary {
            succeeded: self.succeeded,
            failed: self.failed,
        }
    }
}

/// Assemble ordered outcomes into one response. Position in the input is the item index.
pub fn aggregate<T>(outcomes: Vec<ItemOutcome<T>>) -> Aggregate<T> {
    let records = outcomes
        .into_iter()
        .enumerate()
        .map(|(index, outcome)| ItemRecord { index, outcome })
        .collect();
    Aggregate::from_records(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_reason_gets_fallback() {
        assert_eq!(ItemError::new("").reason(), FALLBACK_REASON);
        assert_eq!(ItemError::new("   ").reason(), FALLBACK_REASON);
        assert_eq!(ItemError::new("rate limited").reason(), "rate limited");
    }

    #[test]
    fn test_aggregate_counts_mixed_outcomes() {
        let result = aggregate(vec![
            ItemOutcome::Success { payload: "A'" },
            ItemOutcome::Failure {
                reason: "rate limited".to_string(),
            },
            ItemOutcome::Success { payload: "C'" },
        ]);

        assert_eq!(result.succeeded, 2);
        assert_eq!(result.failed, 1);
        assert_eq!(result.items.len(), 3);
        assert_eq!(result.items[1].index, 1);
        assert_eq!(result.items[1].outcome.reason(), Some("rate limited"));
    }

    #[test]
    fn test_aggregate_empty() {
        let result = aggregate::<String>(vec![]);
        assert_eq!(result.summary(), Summary::default());
        assert!(result.items.is_empty());
    }

    #[test]
    fn test_record_wire_shape() {
        let ok = ItemRecord {
            index: 0,
            outcome: ItemOutcome::Success { payload: json!({"url": "u"}) },
        };
        let failed: ItemRecord<serde_json::Value> = ItemRecord {
            index: 1,
            outcome: ItemOutcome::Failure {
                reason: "boom".to_string(),
            },
        };

        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({"index": 0, "outcome": "success", "payload": {"url": "u"}})
        );
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            json!({"index": 1, "outcome": "failure", "reason": "boom"})
        );

        let parsed: ItemRecord<serde_json::Value> =
            serde_json::from_value(json!({"index": 1, "outcome": "failure", "reason": "boom"}))
                .unwrap();
        assert_eq!(parsed, failed);
    }

    #[test]
    fn test_summary_describe() {
        let clean = Summary {
            succeeded: 4,
            failed: 0,
        };
        let partial = Summary {
            succeeded: 3,
            failed: 1,
        };

        assert_eq!(clean.describe("downloads"), "All 4 downloads succeeded");
        assert_eq!(partial.describe("downloads"), "3 succeeded, 1 failed");
        assert_eq!(partial.total(), 4);
    }
}
