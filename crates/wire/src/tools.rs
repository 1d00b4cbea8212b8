// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helper for the per-backend tool-name normalization tables
//! (spec §4.3: "a per-backend table is the sole site of this mapping").

use caic_core::CanonicalTool;

/// Look up `native_name` in a backend's normalization table; names absent
/// from the table pass through as an MCP tool (spec §4.3: "MCP tools are
/// passed through by name").
pub fn normalize(table: &[(&str, CanonicalTool)], native_name: &str) -> CanonicalTool {
    table
        .iter()
        .find(|(name, _)| *name == native_name)
        .map(|(_, tool)| tool.clone())
        .unwrap_or_else(|| CanonicalTool::Mcp(native_name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_name_maps_to_canonical_variant() {
        let table = [("str_replace", CanonicalTool::Edit)];
        assert_eq!(normalize(&table, "str_replace"), CanonicalTool::Edit);
    }

    #[test]
    fn unknown_name_passes_through_as_mcp() {
        let table = [("str_replace", CanonicalTool::Edit)];
        assert_eq!(normalize(&table, "mcp__github__create_issue"), CanonicalTool::Mcp("mcp__github__create_issue".into()));
    }
}
