//! Serializable node record.
//!
//! # Responsibility
//! - Define the persisted shape of one graph node.
//! - Generate stable node identifiers.
//!
//! # Invariants
//! - `ID` is unique within one store and never reused for another node.
//! - IDs starting with `@` are system IDs and equal the node's name.
//! - `Rel` absent means the node hangs off its parent's `Children` relation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Stable graph node identifier.
pub type NodeId = String;

/// Relation holding ordinary outline children.
pub const REL_CHILDREN: &str = "Children";
/// Relation holding attached component nodes.
pub const REL_COMPONENTS: &str = "Components";
/// Relation holding field nodes, shown before children.
pub const REL_FIELDS: &str = "Fields";

/// Attribute naming the target of an alias node.
pub const ATTR_REF_TO: &str = "refTo";
/// Attribute marking session-only nodes that are never imported.
pub const ATTR_TEMP: &str = "temp";

const SYSTEM_ID_PREFIX: char = '@';
const RANDOM_SUFFIX_LEN: usize = 6;

/// Persisted node record.
///
/// Field names follow the workspace file format, not Rust naming.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawNode {
    #[serde(rename = "ID")]
    pub id: NodeId,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Value", default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    #[serde(rename = "Parent", default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<NodeId>,
    #[serde(rename = "Linked", default)]
    pub linked: BTreeMap<String, Vec<NodeId>>,
    #[serde(rename = "Attrs", default)]
    pub attrs: BTreeMap<String, String>,
    #[serde(rename = "Rel", default, skip_serializing_if = "Option::is_none")]
    pub rel: Option<String>,
}

impl RawNode {
    /// Creates an empty record with the default `Children`/`Components` lists.
    pub fn new(id: impl Into<NodeId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            value: None,
            parent: None,
            linked: default_linked(),
            attrs: BTreeMap::new(),
            rel: None,
        }
    }

    /// Relation name under the parent.
    pub fn rel_name(&self) -> &str {
        self.rel.as_deref().unwrap_or(REL_CHILDREN)
    }

    pub fn is_temp(&self) -> bool {
        self.attrs.contains_key(ATTR_TEMP)
    }
}

/// Returns the relation map every new record starts with.
pub fn default_linked() -> BTreeMap<String, Vec<NodeId>> {
    let mut linked = BTreeMap::new();
    linked.insert(REL_CHILDREN.to_string(), Vec::new());
    linked.insert(REL_COMPONENTS.to_string(), Vec::new());
    linked
}

/// Returns whether `id` is a reserved system ID such as `@root`.
pub fn is_system_id(id: &str) -> bool {
    id.starts_with(SYSTEM_ID_PREFIX)
}

/// Generates a new time-ordered node ID.
///
/// Format: base-36 epoch milliseconds followed by a short random suffix.
pub fn new_node_id() -> NodeId {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or(0);
    let random = Uuid::new_v4().simple().to_string();
    format!("{}{}", to_base36(millis), &random[..RANDOM_SUFFIX_LEN])
}

fn to_base36(mut value: u128) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    out.into_iter().map(char::from).collect()
}

#[cfg(test)]
mod tests {
    use super::{is_system_id, new_node_id, to_base36, RawNode, REL_CHILDREN, REL_COMPONENTS};

    #[test]
    fn generated_ids_are_unique_and_not_system() {
        let a = new_node_id();
        let b = new_node_id();
        assert_ne!(a, b);
        assert!(!is_system_id(&a));
    }

    #[test]
    fn base36_encodes_known_values() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }

    #[test]
    fn serializes_with_workspace_field_names() {
        let mut raw = RawNode::new("n1", "Alpha");
        raw.parent = Some("@root".to_string());
        let json = serde_json::to_value(&raw).expect("serialize raw node");

        assert_eq!(json["ID"], "n1");
        assert_eq!(json["Name"], "Alpha");
        assert_eq!(json["Parent"], "@root");
        assert!(json["Linked"][REL_CHILDREN].as_array().is_some());
        assert!(json["Linked"][REL_COMPONENTS].as_array().is_some());
        assert!(json.get("Value").is_none());
        assert!(json.get("Rel").is_none());
    }

    #[test]
    fn deserializes_sparse_records() {
        let raw: RawNode =
            serde_json::from_str(r#"{"ID":"@root","Name":"@root"}"#).expect("parse sparse node");
        assert_eq!(raw.rel_name(), REL_CHILDREN);
        assert!(raw.linked.is_empty());
        assert!(raw.attrs.is_empty());
    }
}
