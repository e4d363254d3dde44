//! Long-running task tracking (MCP 2025-11-25).

use crate::error::{McpError, McpResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskState {
    /// Completed, failed and cancelled are terminal: no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::Cancelled
        )
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TaskState::Pending => "pending",
            TaskState::Running => "running",
            TaskState::Completed => "completed",
            TaskState::Failed => "failed",
            TaskState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,

    pub state: TaskState,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,

    #[serde(rename = "progressToken", skip_serializing_if = "Option::is_none")]
    pub progress_token: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

impl Task {
    /// Apply a state transition, rejecting moves out of a terminal state.
    pub fn transition(&mut self, next: TaskState) -> McpResult<()> {
        if self.state.is_terminal() && next != self.state {
            return Err(McpError::TaskError(format!(
                "task '{}' is {} and cannot transition to {}",
                self.id, self.state, next
            )));
        }
        self.state = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(state: TaskState) -> Task {
        Task {
            id: "task-1".to_string(),
            state,
            progress: None,
            total: None,
            progress_token: None,
            message: None,
            result: None,
        }
    }

    #[test]
    fn state_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(TaskState::Running).unwrap(),
            serde_json::json!("running")
        );
    }

    #[test]
    fn terminal_states_reject_transitions() {
        for terminal in [TaskState::Completed, TaskState::Failed, TaskState::Cancelled] {
            let mut t = task(terminal);
            assert!(t.transition(TaskState::Running).is_err());
            // A no-op "transition" to the same state is tolerated.
            assert!(t.transition(terminal).is_ok());
        }
    }

    #[test]
    fn live_states_transition_freely() {
        let mut t = task(TaskState::Pending);
        t.transition(TaskState::Running).unwrap();
        t.transition(TaskState::Completed).unwrap();
        assert!(t.state.is_terminal());
    }
}
