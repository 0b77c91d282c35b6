use std::fmt;

use crate::error::DefinitionError;

/// A named input or output slot on a named node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Port {
    /// The name of the node this port belongs to.
    pub node: String,
    /// The name of the port on that node.
    pub port: String,
}

impl Port {
    pub fn new(node: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            port: port.into(),
        }
    }

    /// Parse a canonical `"node:port"` string.
    ///
    /// Fails unless the string contains exactly one `:` separating two
    /// non-empty names.
    pub fn parse(id: &str) -> Result<Self, DefinitionError> {
        let mut parts = id.split(':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(node), Some(port), None) if !node.is_empty() && !port.is_empty() => {
                Ok(Self::new(node, port))
            }
            _ => Err(DefinitionError::InvalidPortId(id.to_string())),
        }
    }

    /// The canonical identifier of this port.
    pub fn id(&self) -> PortId {
        PortId(format!("{}:{}", self.node, self.port))
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.node, self.port)
    }
}

/// The canonical string identifier of a port: `"node:port"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortId(String);

impl PortId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether a port feeds values into a node or out of it.
///
/// A port's kind is established the first time it takes part in a
/// connection and never changes afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortKind {
    Input,
    Output,
}

impl fmt::Display for PortKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Input => "input",
            Self::Output => "output",
        })
    }
}

/// The canonical name of a connection: `"srcNode:srcPort->dstNode:dstPort"`.
pub type ConnectionName = String;

/// A directed edge from an output port to an input port.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionDefinition {
    pub src: Port,
    pub dst: Port,
}

impl ConnectionDefinition {
    pub fn new(src: Port, dst: Port) -> Self {
        Self { src, dst }
    }

    /// Build a connection from two canonical `"node:port"` strings.
    pub fn parse(src: &str, dst: &str) -> Result<Self, DefinitionError> {
        Ok(Self::new(Port::parse(src)?, Port::parse(dst)?))
    }

    pub fn name(&self) -> ConnectionName {
        format!("{}->{}", self.src.id(), self.dst.id())
    }
}

impl fmt::Display for ConnectionDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.src, self.dst)
    }
}

// Connections are totally ordered by their canonical name.
impl Ord for ConnectionDefinition {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.name().cmp(&other.name())
    }
}

impl PartialOrd for ConnectionDefinition {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
