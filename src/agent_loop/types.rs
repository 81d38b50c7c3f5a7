//! Core run types for the orchestration loop.

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::error::{ChatError, ErrorCategory};
use crate::types::Usage;

/// Where a run is in its turn-taking cycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LoopState {
    AwaitingModel,
    DispatchingTools,
    Done,
    Failed,
    Canceled,
}

impl LoopState {
    /// Terminal state a run ends in when it fails with `error`.
    pub fn for_error(error: &ChatError) -> Self {
        if error.category() == ErrorCategory::Canceled {
            Self::Canceled
        } else {
            Self::Failed
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Canceled)
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    /// Model steps taken.
    pub steps: usize,
    /// Tool calls requested by the model, including ones that failed.
    pub tool_calls: usize,
    pub usage: Usage,
    /// Text of the final model step.
    pub text: String,
    pub state: LoopState,
}

impl Default for RunSummary {
    fn default() -> Self {
        Self {
            steps: 0,
            tool_calls: 0,
            usage: Usage::default(),
            text: String::new(),
            state: LoopState::AwaitingModel,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canceled_errors_map_to_canceled_state() {
        assert_eq!(LoopState::for_error(&ChatError::Canceled), LoopState::Canceled);
        assert_eq!(
            LoopState::for_error(&ChatError::Overloaded { retries: 5 }),
            LoopState::Failed
        );
        assert!(LoopState::Done.is_terminal());
        assert!(!LoopState::DispatchingTools.is_terminal());
        assert_eq!(LoopState::AwaitingModel.to_string(), "awaiting_model");
    }
}
