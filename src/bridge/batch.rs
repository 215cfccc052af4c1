//! Per-item outcome tracking for batch operations.
//!
//! A batch applies one operation to a list of items and partitions the
//! outcomes into succeeded / already-in-state / failed instead of stopping at
//! the first failure. A single unresolvable item must not discard progress on
//! the rest.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::error::{BridgeError, ErrorCode};
use super::executor::ExecOutcome;
use super::protocol::{ResponseEnvelope, Status};
use crate::ui::prelude::*;

/// One operation applied per item, e.g. "install package X".
#[async_trait]
pub trait BatchOperation: Send + Sync {
    /// Imperative verb for messages and validation errors, e.g. "install".
    fn verb(&self) -> &str;

    /// Past tense for summary messages, e.g. "installed".
    fn past_tense(&self) -> &str;

    /// Whether the item already satisfies the target state. Satisfied items
    /// are classified without applying the operation, keeping batches
    /// idempotent.
    async fn is_satisfied(&self, item: &str) -> Result<bool, BridgeError>;

    /// Apply the operation to one item.
    async fn apply(&self, item: &str) -> Result<ExecOutcome, BridgeError>;
}

/// An item the operation could not complete.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailedItem {
    pub item: String,
    pub code: ErrorCode,
    pub message: String,
}

/// Disjoint partition of a batch's de-duplicated input, in input order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub succeeded: Vec<String>,
    pub already_in_state: Vec<String>,
    pub failed: Vec<FailedItem>,
}

impl BatchReport {
    /// Status is a pure function of the set cardinalities, independent of the
    /// execution path that produced them.
    pub fn status(&self) -> Status {
        if self.failed.is_empty() {
            Status::Success
        } else {
            Status::Warning
        }
    }

    pub fn is_empty(&self) -> bool {
        self.succeeded.is_empty() && self.already_in_state.is_empty() && self.failed.is_empty()
    }

    /// Human-readable summary enumerating the failed set.
    pub fn summary(&self, past_tense: &str) -> String {
        if self.is_empty() {
            return "nothing to do".to_string();
        }

        let mut parts = Vec::new();
        if !self.succeeded.is_empty() {
            parts.push(format!("{} {}", self.succeeded.len(), past_tense));
        }
        if !self.already_in_state.is_empty() {
            parts.push(format!(
                "{} already in desired state",
                self.already_in_state.len()
            ));
        }
        if !self.failed.is_empty() {
            let names: Vec<&str> = self.failed.iter().map(|f| f.item.as_str()).collect();
            parts.push(format!("{} failed: {}", self.failed.len(), names.join(", ")));
        }
        parts.join(", ")
    }

    /// Payload for the envelope, with counts alongside each set.
    pub fn to_data(&self) -> Value {
        json!({
            "succeeded": self.succeeded,
            "succeeded_count": self.succeeded.len(),
            "already_in_state": self.already_in_state,
            "already_in_state_count": self.already_in_state.len(),
            "failed": self.failed,
            "failed_count": self.failed.len(),
        })
    }

    /// Wrap the report in an envelope: `success` when nothing failed,
    /// `warning` otherwise.
    pub fn into_envelope(self, past_tense: &str) -> ResponseEnvelope {
        let message = self.summary(past_tense);
        let data = self.to_data();
        match self.status() {
            Status::Warning => ResponseEnvelope::warning(message, data),
            _ => ResponseEnvelope::success(message, data),
        }
    }
}

/// Drives one operation across a list of items, sequentially.
///
/// Sequential on purpose: package managers hold an exclusive lock on their
/// own database, so concurrent invocations would fail or corrupt state.
pub struct BatchRunner {
    cancel: Arc<AtomicBool>,
}

impl BatchRunner {
    pub fn new(cancel: Arc<AtomicBool>) -> Self {
        Self { cancel }
    }

    /// Classify every item in input order.
    ///
    /// Duplicates are processed once. A failure on one item never aborts the
    /// rest. Cancellation stops submission of further items and returns the
    /// partial report. Empty input is a validation error and touches no
    /// external process.
    pub async fn run(
        &self,
        items: &[String],
        operation: &dyn BatchOperation,
    ) -> Result<BatchReport, BridgeError> {
        if items.is_empty() {
            return Err(BridgeError::validation(format!(
                "no items supplied to {}",
                operation.verb()
            )));
        }

        let mut seen = HashSet::new();
        let mut report = BatchReport::default();

        for item in items {
            if !seen.insert(item.clone()) {
                continue;
            }

            if self.cancel.load(Ordering::SeqCst) {
                emit(
                    Level::Warn,
                    "batch.cancelled",
                    &format!(
                        "{} Cancelled, returning partial results",
                        char::from(NerdFont::Warning)
                    ),
                    None,
                );
                break;
            }

            match operation.is_satisfied(item).await {
                Ok(true) => report.already_in_state.push(item.clone()),
                Ok(false) => match operation.apply(item).await {
                    Ok(outcome) if outcome.success() => report.succeeded.push(item.clone()),
                    Ok(outcome) => report.failed.push(FailedItem {
                        item: item.clone(),
                        code: ErrorCode::SystemError,
                        message: outcome.failure_reason(),
                    }),
                    Err(err) => report.failed.push(FailedItem {
                        item: item.clone(),
                        code: err.code(),
                        message: err.to_string(),
                    }),
                },
                Err(err) => report.failed.push(FailedItem {
                    item: item.clone(),
                    code: err.code(),
                    message: err.to_string(),
                }),
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    /// Test double: a fixed set of satisfied items plus scripted outcomes,
    /// counting apply calls.
    struct FakeOperation {
        satisfied: Mutex<HashSet<String>>,
        failures: HashMap<String, i32>,
        apply_calls: AtomicUsize,
    }

    impl FakeOperation {
        fn new(satisfied: &[&str], failures: &[(&str, i32)]) -> Self {
            Self {
                satisfied: Mutex::new(satisfied.iter().map(|s| s.to_string()).collect()),
                failures: failures
                    .iter()
                    .map(|(item, code)| (item.to_string(), *code))
                    .collect(),
                apply_calls: AtomicUsize::new(0),
            }
        }

        fn applied(&self) -> usize {
            self.apply_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl BatchOperation for FakeOperation {
        fn verb(&self) -> &str {
            "install"
        }

        fn past_tense(&self) -> &str {
            "installed"
        }

        async fn is_satisfied(&self, item: &str) -> Result<bool, BridgeError> {
            Ok(self.satisfied.lock().unwrap().contains(item))
        }

        async fn apply(&self, item: &str) -> Result<ExecOutcome, BridgeError> {
            self.apply_calls.fetch_add(1, Ordering::SeqCst);
            let exit_code = self.failures.get(item).copied().unwrap_or(0);
            if exit_code == 0 {
                // A successful apply moves the item into the desired state.
                self.satisfied.lock().unwrap().insert(item.to_string());
            }
            Ok(ExecOutcome {
                exit_code,
                stdout: String::new(),
                stderr: if exit_code == 0 {
                    String::new()
                } else {
                    "error: target not found".to_string()
                },
            })
        }
    }

    fn runner() -> BatchRunner {
        BatchRunner::new(Arc::new(AtomicBool::new(false)))
    }

    fn items(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_partition_covers_deduplicated_input() {
        let op = FakeOperation::new(&["b"], &[("d", 1)]);
        let input = items(&["a", "b", "c", "d", "a", "c"]);

        let report = runner().run(&input, &op).await.unwrap();

        let mut all: Vec<&str> = report
            .succeeded
            .iter()
            .map(String::as_str)
            .chain(report.already_in_state.iter().map(String::as_str))
            .chain(report.failed.iter().map(|f| f.item.as_str()))
            .collect();
        all.sort_unstable();
        assert_eq!(all, vec!["a", "b", "c", "d"]);

        // Pairwise disjoint.
        let unique: HashSet<&&str> = all.iter().collect();
        assert_eq!(unique.len(), all.len());
    }

    #[tokio::test]
    async fn test_satisfied_items_skip_the_executor() {
        let op = FakeOperation::new(&["a", "b"], &[]);
        let report = runner().run(&items(&["a", "b"]), &op).await.unwrap();

        assert_eq!(report.already_in_state, vec!["a", "b"]);
        assert_eq!(op.applied(), 0);
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent() {
        let op = FakeOperation::new(&[], &[]);
        let input = items(&["a", "b"]);

        let first = runner().run(&input, &op).await.unwrap();
        assert_eq!(first.succeeded, vec!["a", "b"]);
        assert_eq!(op.applied(), 2);

        let second = runner().run(&input, &op).await.unwrap();
        assert_eq!(second.already_in_state, vec!["a", "b"]);
        assert!(second.succeeded.is_empty());
        assert_eq!(op.applied(), 2, "second run must not re-apply");
    }

    #[tokio::test]
    async fn test_mixed_outcome_scenario() {
        // a already installed, b installs, c fails.
        let op = FakeOperation::new(&["a"], &[("c", 1)]);
        let report = runner().run(&items(&["a", "b", "c"]), &op).await.unwrap();

        assert_eq!(report.already_in_state, vec!["a"]);
        assert_eq!(report.succeeded, vec!["b"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].item, "c");
        assert_eq!(report.failed[0].code, ErrorCode::SystemError);

        assert_eq!(report.status(), Status::Warning);
        let envelope = report.into_envelope("installed");
        assert_eq!(envelope.status, Status::Warning);
        assert!(envelope.message.contains("1 installed"));
        assert!(envelope.message.contains("1 failed: c"));
    }

    #[tokio::test]
    async fn test_empty_input_is_validation_error() {
        let op = FakeOperation::new(&[], &[]);
        let err = runner().run(&[], &op).await.unwrap_err();

        assert_eq!(err.code(), ErrorCode::ValidationError);
        assert_eq!(op.applied(), 0);
    }

    #[tokio::test]
    async fn test_failure_does_not_abort_subsequent_items() {
        let op = FakeOperation::new(&[], &[("a", 1)]);
        let report = runner().run(&items(&["a", "b", "c"]), &op).await.unwrap();

        assert_eq!(report.failed[0].item, "a");
        assert_eq!(report.succeeded, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_timeout_lands_in_failed() {
        struct TimeoutOperation;

        #[async_trait]
        impl BatchOperation for TimeoutOperation {
            fn verb(&self) -> &str {
                "install"
            }
            fn past_tense(&self) -> &str {
                "installed"
            }
            async fn is_satisfied(&self, _item: &str) -> Result<bool, BridgeError> {
                Ok(false)
            }
            async fn apply(&self, item: &str) -> Result<ExecOutcome, BridgeError> {
                Err(BridgeError::Timeout {
                    command: format!("pacman -S {item}"),
                    seconds: 300,
                })
            }
        }

        let report = runner()
            .run(&items(&["slowpkg"]), &TimeoutOperation)
            .await
            .unwrap();

        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].code, ErrorCode::Timeout);
        assert_eq!(report.status(), Status::Warning);
    }

    #[tokio::test]
    async fn test_cancellation_returns_partial_report() {
        struct CancellingOperation {
            cancel: Arc<AtomicBool>,
        }

        #[async_trait]
        impl BatchOperation for CancellingOperation {
            fn verb(&self) -> &str {
                "install"
            }
            fn past_tense(&self) -> &str {
                "installed"
            }
            async fn is_satisfied(&self, _item: &str) -> Result<bool, BridgeError> {
                Ok(false)
            }
            async fn apply(&self, item: &str) -> Result<ExecOutcome, BridgeError> {
                // Interrupt arrives while the first item is in flight.
                if item == "a" {
                    self.cancel.store(true, Ordering::SeqCst);
                }
                Ok(ExecOutcome {
                    exit_code: 0,
                    stdout: String::new(),
                    stderr: String::new(),
                })
            }
        }

        let cancel = Arc::new(AtomicBool::new(false));
        let op = CancellingOperation {
            cancel: cancel.clone(),
        };
        let report = BatchRunner::new(cancel)
            .run(&items(&["a", "b", "c"]), &op)
            .await
            .unwrap();

        assert_eq!(report.succeeded, vec!["a"]);
        assert!(report.already_in_state.is_empty());
        assert!(report.failed.is_empty());
    }

    #[tokio::test]
    async fn test_report_counts_match_cardinalities() {
        let op = FakeOperation::new(&["a"], &[("c", 1)]);
        let report = runner().run(&items(&["a", "b", "c"]), &op).await.unwrap();

        let data = report.to_data();
        assert_eq!(data["succeeded_count"], 1);
        assert_eq!(data["already_in_state_count"], 1);
        assert_eq!(data["failed_count"], 1);
        assert_eq!(
            data["succeeded"].as_array().unwrap().len(),
            data["succeeded_count"].as_u64().unwrap() as usize
        );
    }
}
