use std::collections::BTreeMap;
use std::str::FromStr;

use serde::Deserialize;

use crate::connection::ConnectionDefinition;
use crate::error::DefinitionError;

/// Everything needed to instantiate one node: a name unique within the
/// graph, the registry key of its type, and a free-form settings payload.
#[derive(Debug, Clone)]
pub struct NodeDefinition {
    pub name: String,
    pub type_tag: String,
    /// Opaque settings made available to the node. Defaults to `Null`.
    pub settings: serde_json::Value,
}

impl NodeDefinition {
    pub fn new(name: impl Into<String>, type_tag: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_tag: type_tag.into(),
            settings: serde_json::Value::Null,
        }
    }

    pub fn with_settings(
        name: impl Into<String>,
        type_tag: impl Into<String>,
        settings: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            type_tag: type_tag.into(),
            settings,
        }
    }
}

/// An inert description of a whole graph. The order of `nodes` and
/// `connections` carries no meaning; ordering and deduplication are the
/// engine's concern.
#[derive(Debug, Clone, Default)]
pub struct GraphDefinition {
    pub name: String,
    pub nodes: Vec<NodeDefinition>,
    pub connections: Vec<ConnectionDefinition>,
}

/// Wire shape of a node entry in a graph document.
#[derive(Deserialize)]
struct NodeDoc {
    #[serde(rename = "type")]
    type_tag: String,
    #[serde(default)]
    settings: serde_json::Value,
}

/// Wire shape of a graph document:
///
/// ```json
/// {
///   "name": "example",
///   "nodes": { "A": { "type": "Source", "settings": { "seed": 42 } } },
///   "connections": [["A:out", "B:in"]]
/// }
/// ```
#[derive(Deserialize)]
struct GraphDoc {
    name: String,
    nodes: BTreeMap<String, NodeDoc>,
    connections: Vec<(String, String)>,
}

impl GraphDefinition {
    /// Interpret an already-parsed JSON document as a graph definition.
    pub fn from_json(document: serde_json::Value) -> Result<Self, DefinitionError> {
        let doc: GraphDoc = serde_json::from_value(document)?;

        let nodes = doc
            .nodes
            .into_iter()
            .map(|(name, node)| NodeDefinition::with_settings(name, node.type_tag, node.settings))
            .collect();

        let connections = doc
            .connections
            .iter()
            .map(|(src, dst)| ConnectionDefinition::parse(src, dst))
            .collect::<Result<_, _>>()?;

        Ok(Self {
            name: doc.name,
            nodes,
            connections,
        })
    }
}

impl FromStr for GraphDefinition {
    type Err = DefinitionError;

    fn from_str(document: &str) -> Result<Self, Self::Err> {
        Self::from_json(serde_json::from_str(document)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn abc_document() -> serde_json::Value {
        json!({
            "name": "Test ABC Graph",
            "nodes": {
                "A": { "type": "TestSource", "settings": { "seed": 42 } },
                "B": { "type": "DummyNode" },
                "C": { "type": "TestSink", "settings": { "expected": 42 } }
            },
            "connections": [["A:out", "B:in"], ["B:out", "C:in"]]
        })
    }

    #[test]
    fn parses_graph_document() {
        let def = GraphDefinition::from_json(abc_document()).unwrap();

        assert_eq!(def.name, "Test ABC Graph");
        assert_eq!(def.nodes.len(), 3);
        assert_eq!(def.nodes[0].name, "A");
        assert_eq!(def.nodes[0].type_tag, "TestSource");
        assert_eq!(def.nodes[0].settings["seed"], 42);
        assert_eq!(def.nodes[1].name, "B");
        assert_eq!(def.nodes[1].type_tag, "DummyNode");
        assert_eq!(def.nodes[1].settings, serde_json::Value::Null);
        assert_eq!(def.nodes[2].name, "C");
        assert_eq!(def.connections.len(), 2);
        assert_eq!(def.connections[0].name(), "A:out->B:in");
    }

    #[test]
    fn parses_from_str() {
        let def: GraphDefinition = abc_document().to_string().parse().unwrap();
        assert_eq!(def.nodes.len(), 3);
    }

    #[test]
    fn rejects_malformed_connection_id() {
        let document = json!({
            "name": "bad",
            "nodes": { "A": { "type": "T" } },
            "connections": [["A:out", "Bin"]]
        });
        assert!(matches!(
            GraphDefinition::from_json(document),
            Err(DefinitionError::InvalidPortId(id)) if id == "Bin"
        ));
    }

    #[test]
    fn rejects_missing_fields() {
        assert!(GraphDefinition::from_json(json!({ "name": "x" })).is_err());
        assert!(GraphDefinition::from_json(json!({ "nodes": {}, "connections": [] })).is_err());
    }
}
