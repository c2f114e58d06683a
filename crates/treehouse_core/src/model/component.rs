//! Typed node components.
//!
//! # Responsibility
//! - Define the closed set of component kinds a node can carry.
//! - Map persisted component names to typed payloads and back.
//!
//! # Invariants
//! - Every `ComponentKind` has exactly one persisted name.
//! - A component node's name equals its kind's persisted name.

use serde::{Deserialize, Serialize};

/// Explicit component type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ComponentKind {
    Checkbox,
    Page,
    SmartNode,
    Tag,
    Description,
}

impl ComponentKind {
    pub const ALL: [ComponentKind; 5] = [
        ComponentKind::Checkbox,
        ComponentKind::Page,
        ComponentKind::SmartNode,
        ComponentKind::Tag,
        ComponentKind::Description,
    ];

    /// Persisted node name for this kind.
    pub fn name(self) -> &'static str {
        match self {
            Self::Checkbox => "treehouse.Checkbox",
            Self::Page => "treehouse.Page",
            Self::SmartNode => "treehouse.SmartNode",
            Self::Tag => "treehouse.Tag",
            Self::Description => "treehouse.Description",
        }
    }

    /// Looks up a kind by persisted node name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

/// Task-style completion marker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkbox {
    #[serde(default)]
    pub checked: bool,
}

/// Long-form markdown body attached to a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub markdown: String,
}

/// Saved search whose results are rendered under the node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmartNode {
    #[serde(default)]
    pub query: String,
}

/// Marks a node as usable tag target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {}

/// Short description line shown under the node name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Description {
    #[serde(default)]
    pub text: String,
}

/// Typed component payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Component {
    Checkbox(Checkbox),
    Page(Page),
    SmartNode(SmartNode),
    Tag(Tag),
    Description(Description),
}

impl Component {
    pub fn kind(&self) -> ComponentKind {
        match self {
            Self::Checkbox(_) => ComponentKind::Checkbox,
            Self::Page(_) => ComponentKind::Page,
            Self::SmartNode(_) => ComponentKind::SmartNode,
            Self::Tag(_) => ComponentKind::Tag,
            Self::Description(_) => ComponentKind::Description,
        }
    }

    /// Persisted node name for this component.
    pub fn name(&self) -> &'static str {
        self.kind().name()
    }

    /// Inflates a persisted payload into the typed component.
    pub fn from_value(
        kind: ComponentKind,
        value: serde_json::Value,
    ) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            ComponentKind::Checkbox => Self::Checkbox(serde_json::from_value(value)?),
            ComponentKind::Page => Self::Page(serde_json::from_value(value)?),
            ComponentKind::SmartNode => Self::SmartNode(serde_json::from_value(value)?),
            ComponentKind::Tag => Self::Tag(serde_json::from_value(value)?),
            ComponentKind::Description => Self::Description(serde_json::from_value(value)?),
        })
    }

    /// Serializes the payload for the workspace file.
    pub fn to_value(&self) -> serde_json::Value {
        let encoded = match self {
            Self::Checkbox(inner) => serde_json::to_value(inner),
            Self::Page(inner) => serde_json::to_value(inner),
            Self::SmartNode(inner) => serde_json::to_value(inner),
            Self::Tag(inner) => serde_json::to_value(inner),
            Self::Description(inner) => serde_json::to_value(inner),
        };
        // Plain structs of strings/bools always encode.
        encoded.unwrap_or(serde_json::Value::Null)
    }
}

/// In-memory node value: opaque data or a typed component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeValue {
    Data(serde_json::Value),
    Component(Component),
}

impl NodeValue {
    /// Convenience constructor for plain text values.
    pub fn text(value: impl Into<String>) -> Self {
        Self::Data(serde_json::Value::String(value.into()))
    }

    pub fn as_component(&self) -> Option<&Component> {
        match self {
            Self::Component(component) => Some(component),
            Self::Data(_) => None,
        }
    }

    /// Text rendering used by search indexing.
    pub fn search_text(&self) -> Option<String> {
        match self {
            Self::Data(serde_json::Value::String(text)) => Some(text.clone()),
            Self::Data(serde_json::Value::Null) => None,
            Self::Data(other) => Some(other.to_string()),
            Self::Component(Component::Page(page)) => Some(page.markdown.clone()),
            Self::Component(Component::Description(description)) => {
                Some(description.text.clone())
            }
            Self::Component(Component::SmartNode(smart)) => Some(smart.query.clone()),
            Self::Component(_) => None,
        }
    }

    /// Persisted JSON payload.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Data(value) => value.clone(),
            Self::Component(component) => component.to_value(),
        }
    }
}

impl From<Component> for NodeValue {
    fn from(value: Component) -> Self {
        Self::Component(value)
    }
}

#[cfg(test)]
mod tests {
    use super::{Checkbox, Component, ComponentKind, NodeValue, SmartNode};
    use serde_json::json;

    #[test]
    fn kind_names_round_trip() {
        for kind in ComponentKind::ALL {
            assert_eq!(ComponentKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(ComponentKind::from_name("treehouse.SearchNode"), None);
    }

    #[test]
    fn inflates_typed_payload() {
        let component = Component::from_value(ComponentKind::Checkbox, json!({"checked": true}))
            .expect("checkbox payload");
        assert_eq!(component, Component::Checkbox(Checkbox { checked: true }));
        assert_eq!(component.to_value(), json!({"checked": true}));
    }

    #[test]
    fn rejects_mistyped_payload() {
        let result = Component::from_value(ComponentKind::SmartNode, json!({"query": 7}));
        assert!(result.is_err());
    }

    #[test]
    fn search_text_covers_data_and_text_components() {
        assert_eq!(
            NodeValue::text("hello").search_text().as_deref(),
            Some("hello")
        );
        let smart = NodeValue::from(Component::SmartNode(SmartNode {
            query: "todo".to_string(),
        }));
        assert_eq!(smart.search_text().as_deref(), Some("todo"));
        assert_eq!(
            NodeValue::from(Component::Checkbox(Checkbox::default())).search_text(),
            None
        );
    }
}
