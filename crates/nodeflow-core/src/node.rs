use std::collections::BTreeSet;
use std::sync::Arc;

use downcast_rs::{impl_downcast, Downcast};
use serde::de::DeserializeOwned;

use crate::connection::{Port, PortKind};
use crate::connector::Connector;
use crate::definition::NodeDefinition;
use crate::error::{BoxError, NodeError};
use crate::value::PortValue;

/// A polymorphic computation unit.
///
/// Implementations embed a [`NodeContext`] (handed to their constructor by
/// the registry) and do all port and settings I/O through it:
///
/// ```ignore
/// struct Doubler {
///     ctx: NodeContext,
/// }
///
/// impl Node for Doubler {
///     fn context(&self) -> &NodeContext {
///         &self.ctx
///     }
///
///     fn execute(&mut self) -> Result<(), BoxError> {
///         let x: i32 = self.ctx.get_input("in")?;
///         self.ctx.set_output("out", x * 2)?;
///         Ok(())
///     }
/// }
/// ```
pub trait Node: Downcast + Send {
    fn context(&self) -> &NodeContext;

    /// Runs once per graph execution. May read any subset of the node's
    /// connected inputs and write any subset of its connected outputs.
    fn execute(&mut self) -> Result<(), BoxError>;
}

impl_downcast!(Node);

impl dyn Node {
    pub fn name(&self) -> &str {
        self.context().name()
    }

    pub fn node_type(&self) -> &str {
        self.context().node_type()
    }
}

/// The engine-facing half of a node: its identity, its settings, and a
/// shared handle to the connector it exchanges values through.
pub struct NodeContext {
    name: String,
    type_tag: String,
    settings: serde_json::Value,
    connector: Arc<Connector>,
}

impl NodeContext {
    pub fn new(definition: NodeDefinition, connector: Arc<Connector>) -> Self {
        Self {
            name: definition.name,
            type_tag: definition.type_tag,
            settings: definition.settings,
            connector,
        }
    }

    /// The node's name, unique within its graph.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The registry key this node was created from.
    pub fn node_type(&self) -> &str {
        &self.type_tag
    }

    /// Write a value to one of this node's output ports. Every input port
    /// connected to it will see the value. Writing to an output nothing
    /// listens on succeeds silently.
    pub fn set_output<T: PortValue>(&self, port: &str, value: T) -> Result<(), NodeError> {
        let port_id = Port::new(self.name.clone(), port).id();
        self.connector
            .set_value(&port_id, Box::new(value))
            .map_err(|source| self.port_error(source))
    }

    /// Whether a value is waiting on the given input port. Unconnected and
    /// unknown ports report `false` rather than failing.
    pub fn has_input(&self, port: &str) -> bool {
        let port_id = Port::new(self.name.clone(), port).id();
        self.connector.has_value(&port_id)
    }

    /// Read the value on the given input port, downcast to `T`.
    ///
    /// Fails when the port is unknown, not an input, unconnected, when the
    /// upstream node has not produced a value this execution, or when the
    /// produced value is not a `T`.
    pub fn get_input<T: PortValue>(&self, port: &str) -> Result<T, NodeError> {
        let port_id = Port::new(self.name.clone(), port).id();
        let value = self
            .connector
            .get_value(&port_id)
            .map_err(|source| self.port_error(source))?;

        match value.downcast::<T>() {
            Ok(value) => Ok(*value),
            Err(_) => Err(NodeError::TypeMismatch {
                node: self.name.clone(),
                node_type: self.type_tag.clone(),
                port: port.to_string(),
                expected: std::any::type_name::<T>(),
            }),
        }
    }

    /// Read a settings entry, coerced into `T`.
    pub fn setting<T: DeserializeOwned>(&self, key: &str) -> Result<T, NodeError> {
        let value = self
            .settings
            .get(key)
            .ok_or_else(|| NodeError::MissingSetting {
                node: self.name.clone(),
                node_type: self.type_tag.clone(),
                key: key.to_string(),
            })?;

        serde_json::from_value(value.clone()).map_err(|source| NodeError::SettingType {
            node: self.name.clone(),
            node_type: self.type_tag.clone(),
            key: key.to_string(),
            source,
        })
    }

    /// The names of this node's connected input ports. Reflects the live
    /// connection state, not a static declaration.
    pub fn input_port_names(&self) -> BTreeSet<String> {
        self.connector.connected_ports(&self.name, PortKind::Input)
    }

    /// The names of this node's connected output ports.
    pub fn output_port_names(&self) -> BTreeSet<String> {
        self.connector.connected_ports(&self.name, PortKind::Output)
    }

    fn port_error(&self, source: crate::error::ConnectorError) -> NodeError {
        NodeError::Port {
            node: self.name.clone(),
            node_type: self.type_tag.clone(),
            source,
        }
    }
}
