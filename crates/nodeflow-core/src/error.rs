use crate::connection::{PortId, PortKind};

/// Boxed error type returned by user-written node code.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors produced while interpreting a graph document or port id.
#[derive(Debug, thiserror::Error)]
pub enum DefinitionError {
    #[error("invalid port id '{0}': expected exactly one ':' separating node and port names")]
    InvalidPortId(String),
    #[error("invalid graph document: {0}")]
    Document(#[from] serde_json::Error),
}

/// Errors produced by the connector while wiring ports or moving values.
#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    #[error("cannot connect port '{0}' to itself")]
    SelfConnection(PortId),
    #[error("port '{port}' is already classified as an {kind} port")]
    PortKindConflict { port: PortId, kind: PortKind },
    #[error("input port '{input}' is already connected to '{connected_to}'")]
    InputAlreadyConnected {
        input: PortId,
        connected_to: PortId,
    },
    #[error("port '{0}' is undefined")]
    UndefinedPort(PortId),
    #[error("port '{0}' is not an input port")]
    NotAnInput(PortId),
    #[error("port '{0}' is not an output port")]
    NotAnOutput(PortId),
    #[error("port '{0}' has no connection")]
    NoConnection(PortId),
    #[error("no value has been produced on the edge of port '{0}'")]
    NoValue(PortId),
}

/// Errors produced by the port and settings accessors available to node
/// implementations. Every message carries the node name and type so a
/// failure can be located without a debugger.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("node '{node}' of type '{node_type}': {source}")]
    Port {
        node: String,
        node_type: String,
        #[source]
        source: ConnectorError,
    },
    #[error(
        "type mismatch on port '{port}' in node '{node}' of type '{node_type}': \
         the value on the edge is not of type {expected}"
    )]
    TypeMismatch {
        node: String,
        node_type: String,
        port: String,
        expected: &'static str,
    },
    #[error("node '{node}' of type '{node_type}' has no setting with key '{key}'")]
    MissingSetting {
        node: String,
        node_type: String,
        key: String,
    },
    #[error("failed to read setting '{key}' of node '{node}' of type '{node_type}': {source}")]
    SettingType {
        node: String,
        node_type: String,
        key: String,
        #[source]
        source: serde_json::Error,
    },
}
