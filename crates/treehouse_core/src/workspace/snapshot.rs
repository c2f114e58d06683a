//! Workspace file format and legacy migrations.
//!
//! # Invariants
//! - `version` is mirrored from `WORKSPACE_FILE_VERSION` on every save.
//! - Legacy renames are applied in table order, before import.

use crate::model::raw_node::{NodeId, RawNode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Latest workspace file version known by this binary.
pub const WORKSPACE_FILE_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy)]
struct NameMigration {
    from: &'static str,
    to: &'static str,
}

const NAME_MIGRATIONS: &[NameMigration] = &[NameMigration {
    from: "treehouse.SearchNode",
    to: "treehouse.SmartNode",
}];

/// Persisted workspace document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceFile {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lastopen: Option<NodeId>,
    #[serde(default)]
    pub expanded: ExpandedState,
    #[serde(default)]
    pub nodes: Vec<RawNode>,
    #[serde(default)]
    pub settings: Settings,
}

/// Per-panel expand/collapse flags: head node ID -> node ID -> expanded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpandedState(BTreeMap<NodeId, BTreeMap<NodeId, bool>>);

impl ExpandedState {
    pub fn get(&self, head_id: &str, node_id: &str) -> bool {
        self.0
            .get(head_id)
            .and_then(|nodes| nodes.get(node_id))
            .copied()
            .unwrap_or(false)
    }

    /// Stores one flag. Returns whether the stored state changed.
    pub fn set(&mut self, head_id: &str, node_id: &str, expanded: bool) -> bool {
        let nodes = self.0.entry(head_id.to_string()).or_default();
        nodes.insert(node_id.to_string(), expanded) != Some(expanded)
    }

    /// Drops flags for heads or nodes that `exists` rejects.
    pub fn retain_known(&mut self, exists: impl Fn(&str) -> bool) {
        self.0.retain(|head_id, _| exists(head_id));
        for nodes in self.0.values_mut() {
            nodes.retain(|node_id, _| exists(node_id));
        }
    }
}

/// User settings stored alongside the graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    /// Keys this version does not interpret, kept for round-trips.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Renames legacy component node names in place. Returns the rename count.
pub fn migrate_legacy_names(nodes: &mut [RawNode]) -> usize {
    let mut renamed = 0;
    for node in nodes.iter_mut() {
        for migration in NAME_MIGRATIONS {
            if node.name == migration.from {
                node.name = migration.to.to_string();
                renamed += 1;
            }
        }
    }
    renamed
}

#[cfg(test)]
mod tests {
    use super::{migrate_legacy_names, ExpandedState, Settings, WorkspaceFile};
    use crate::model::raw_node::RawNode;
    use serde_json::json;

    #[test]
    fn renames_search_node_components() {
        let mut nodes = vec![
            RawNode::new("n1", "treehouse.SearchNode"),
            RawNode::new("n2", "Plain"),
        ];
        assert_eq!(migrate_legacy_names(&mut nodes), 1);
        assert_eq!(nodes[0].name, "treehouse.SmartNode");
        assert_eq!(nodes[1].name, "Plain");
    }

    #[test]
    fn expanded_state_reports_changes() {
        let mut state = ExpandedState::default();
        assert!(!state.get("@root", "n1"));
        assert!(state.set("@root", "n1", true));
        assert!(!state.set("@root", "n1", true));
        assert!(state.get("@root", "n1"));

        state.retain_known(|id| id != "n1");
        assert!(!state.get("@root", "n1"));
    }

    #[test]
    fn parses_minimal_file_and_keeps_unknown_settings() {
        let file: WorkspaceFile = serde_json::from_value(json!({
            "version": 1,
            "settings": {"theme": "dark", "fontSize": 14}
        }))
        .expect("parse workspace file");

        assert!(file.nodes.is_empty());
        assert_eq!(file.lastopen, None);
        assert_eq!(file.settings.theme.as_deref(), Some("dark"));
        assert_eq!(file.settings.extra["fontSize"], json!(14));

        let encoded = serde_json::to_value(&file.settings).unwrap();
        assert_eq!(encoded, json!({"theme": "dark", "fontSize": 14}));
        assert_eq!(Settings::default().extra.len(), 0);
    }
}
