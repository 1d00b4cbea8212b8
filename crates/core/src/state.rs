// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Task lifecycle state machine (spec §3 "Lifecycles").

use serde::{Deserialize, Serialize};

/// A task's current place in its lifecycle.
///
/// Transitions monotonically forward except through explicit adoption
/// from disk (spec invariant 1). Terminal states (`Terminated`, `Failed`)
/// are sticky.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Branching,
    Provisioning,
    Starting,
    Running,
    Waiting,
    Asking,
    Terminating,
    Terminated,
    Failed,
}

crate::simple_display! {
    TaskState {
        Branching => "branching",
        Provisioning => "provisioning",
        Starting => "starting",
        Running => "running",
        Waiting => "waiting",
        Asking => "asking",
        Terminating => "terminating",
        Terminated => "terminated",
        Failed => "failed",
    }
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Terminated | TaskState::Failed)
    }

    /// True when the task can accept `sendInput` (spec §6 `sendInput`:
    /// "legal only when state is waiting or asking").
    pub fn accepts_input(self) -> bool {
        matches!(self, TaskState::Waiting | TaskState::Asking)
    }

    /// Valid forward transitions, ignoring the adoption escape hatch.
    fn rank(self) -> u8 {
        match self {
            TaskState::Branching => 0,
            TaskState::Provisioning => 1,
            TaskState::Starting => 2,
            TaskState::Running => 3,
            TaskState::Waiting => 3,
            TaskState::Asking => 3,
            TaskState::Terminating => 4,
            TaskState::Terminated => 5,
            TaskState::Failed => 5,
        }
    }

    /// Whether moving from `self` to `next` respects monotonic progression
    /// (spec invariant 1). `Running`/`Waiting`/`Asking` form one rank and
    /// may freely cycle among each other.
    pub fn can_advance_to(self, next: TaskState) -> bool {
        if self.is_terminal() {
            return false;
        }
        if matches!(self, TaskState::Running | TaskState::Waiting | TaskState::Asking)
            && matches!(next, TaskState::Running | TaskState::Waiting | TaskState::Asking)
        {
            return true;
        }
        next.rank() >= self.rank()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_are_sticky() {
        assert!(!TaskState::Terminated.can_advance_to(TaskState::Running));
        assert!(!TaskState::Failed.can_advance_to(TaskState::Waiting));
    }

    #[test]
    fn running_waiting_asking_cycle_freely() {
        assert!(TaskState::Running.can_advance_to(TaskState::Waiting));
        assert!(TaskState::Waiting.can_advance_to(TaskState::Asking));
        assert!(TaskState::Asking.can_advance_to(TaskState::Running));
    }

    #[test]
    fn cannot_skip_backward_through_provisioning() {
        assert!(!TaskState::Running.can_advance_to(TaskState::Provisioning));
    }

    #[test]
    fn accepts_input_only_in_waiting_or_asking() {
        assert!(TaskState::Waiting.accepts_input());
        assert!(TaskState::Asking.accepts_input());
        assert!(!TaskState::Running.accepts_input());
        assert!(!TaskState::Terminated.accepts_input());
    }
}
