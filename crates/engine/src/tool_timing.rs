// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Tool-call timing tracker (spec §3 invariant 5, §8 testable property 2).
//!
//! Each `ToolUse.id` is pending at most once; a matching tool-result clears
//! it. A turn boundary (a `Result` message) implicitly completes every
//! still-pending tool-call from earlier turns — an agent that never emits
//! the matching tool-result (interrupted mid-call) must not leak pending
//! entries across turns forever.

use indexmap::IndexMap;

/// Tracks tool-uses awaiting their tool-result, in call order.
#[derive(Debug, Default)]
pub struct ToolTimingTracker {
    pending: IndexMap<String, String>,
}

impl ToolTimingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a new tool-use. Re-recording an id already pending is a
    /// no-op rather than a panic — a backend bug should not crash the
    /// dispatch loop (spec §7: parse/session errors never propagate as
    /// stream termination).
    pub fn record_tool_use(&mut self, id: impl Into<String>, tool_name: impl Into<String>) {
        self.pending.entry(id.into()).or_insert_with(|| tool_name.into());
    }

    /// Clears a tool-use on its matching tool-result. Returns the tool name
    /// if it was pending, so the caller can check `mutates_filesystem`.
    pub fn record_tool_result(&mut self, id: &str) -> Option<String> {
        self.pending.shift_remove(id)
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.pending.contains_key(id)
    }

    /// Looks up the tool name for a still-pending id without clearing it
    /// (used by the dispatch loop to decide whether a pending tool-result
    /// mutated the filesystem before calling `record_tool_result`).
    pub fn peek(&self, id: &str) -> Option<&str> {
        self.pending.get(id).map(String::as_str)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Force-completes every still-pending tool-call (spec invariant 5's
    /// turn-boundary rule). Returns what was force-completed, in the order
    /// the tool-uses were first seen.
    pub fn complete_turn(&mut self) -> Vec<(String, String)> {
        std::mem::take(&mut self.pending).into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_result_clears_pending_entry() {
        let mut t = ToolTimingTracker::new();
        t.record_tool_use("id-1", "Read");
        assert!(t.is_pending("id-1"));
        assert_eq!(t.record_tool_result("id-1"), Some("Read".to_string()));
        assert!(!t.is_pending("id-1"));
    }

    #[test]
    fn turn_boundary_completes_all_pending() {
        let mut t = ToolTimingTracker::new();
        t.record_tool_use("id-1", "Read");
        t.record_tool_use("id-2", "Bash");
        let completed = t.complete_turn();
        assert_eq!(completed.len(), 2);
        assert_eq!(t.pending_count(), 0);
    }

    #[test]
    fn duplicate_tool_use_id_is_recorded_once() {
        let mut t = ToolTimingTracker::new();
        t.record_tool_use("id-1", "Read");
        t.record_tool_use("id-1", "Write");
        assert_eq!(t.pending_count(), 1);
    }

    #[test]
    fn result_for_unknown_id_is_a_no_op() {
        let mut t = ToolTimingTracker::new();
        assert_eq!(t.record_tool_result("never-seen"), None);
    }
}
