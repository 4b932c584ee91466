use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::TargetId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchAction {
    Start,
    Stop,
    Delete,
}

impl BatchAction {
    pub fn as_str(self) -> &'static str {
        match self {
            BatchAction::Start => "start",
            BatchAction::Stop => "stop",
            BatchAction::Delete => "delete",
        }
    }
}

impl fmt::Display for BatchAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown batch action `{0}` (expected start, stop or delete)")]
pub struct UnknownBatchAction(pub String);

impl FromStr for BatchAction {
    type Err = UnknownBatchAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "start" => Ok(BatchAction::Start),
            "stop" => Ok(BatchAction::Stop),
            "delete" => Ok(BatchAction::Delete),
            _ => Err(UnknownBatchAction(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    pub target_id: TargetId,
    pub error: String,
}

/// Aggregate outcome of one batch run.
///
/// Every dispatched target is counted exactly once, so
/// `success_count + failed_count` always equals the number of targets given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOperationResult {
    pub action: BatchAction,
    pub success_count: usize,
    pub failed_count: usize,
    pub errors: Vec<BatchFailure>,
}

impl BatchOperationResult {
    pub fn new(action: BatchAction) -> Self {
        Self {
            action,
            success_count: 0,
            failed_count: 0,
            errors: Vec::new(),
        }
    }

    pub fn record<E: fmt::Display>(&mut self, target_id: &TargetId, outcome: Result<(), E>) {
        match outcome {
            Ok(()) => self.success_count += 1,
            Err(err) => {
                self.failed_count += 1;
                self.errors.push(BatchFailure {
                    target_id: target_id.clone(),
                    error: format!("Failed to {} {}: {}", self.action, target_id, err),
                });
            }
        }
    }

    pub fn total(&self) -> usize {
        self.success_count + self.failed_count
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed_count == 0
    }

    pub fn message(&self) -> String {
        format!(
            "Batch {}: {} successful, {} failed",
            self.action, self.success_count, self.failed_count
        )
    }
}
