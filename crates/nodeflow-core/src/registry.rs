use std::sync::Arc;

use ahash::AHashMap;

use crate::connector::Connector;
use crate::definition::NodeDefinition;
use crate::error::BoxError;
use crate::node::Node;

/// Builds a concrete node from its definition and a handle to the graph's
/// connector. Construction may fail, e.g. on a missing setting.
pub type NodeConstructor =
    Arc<dyn Fn(NodeDefinition, Arc<Connector>) -> Result<Box<dyn Node>, BoxError> + Send + Sync>;

/// Maps node type tags to constructors.
///
/// The registry is cheap to clone (constructors are shared), so one
/// registry can be used to build any number of graphs.
#[derive(Default, Clone)]
pub struct NodeRegistry {
    constructors: AHashMap<String, NodeConstructor>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor under a type tag. A previously registered
    /// constructor for the same tag is replaced.
    pub fn register<F>(&mut self, type_tag: impl Into<String>, constructor: F)
    where
        F: Fn(NodeDefinition, Arc<Connector>) -> Result<Box<dyn Node>, BoxError>
            + Send
            + Sync
            + 'static,
    {
        self.constructors
            .insert(type_tag.into(), Arc::new(constructor));
    }

    pub fn get(&self, type_tag: &str) -> Option<&NodeConstructor> {
        self.constructors.get(type_tag)
    }

    pub fn contains(&self, type_tag: &str) -> bool {
        self.constructors.contains_key(type_tag)
    }
}
