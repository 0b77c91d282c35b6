use nodeflow_core::{BoxError, ConnectorError, NodeError, PortId};

/// Errors surfaced by graph construction, mutation, and execution.
///
/// Mutations that fail leave the graph exactly as it was before the call;
/// partially applied changes are rolled back before the error is
/// returned. Execution failures leave whatever values were already
/// produced sitting in their edge cells.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("unable to create node '{node}': type '{type_tag}' cannot be found in the registry")]
    UnknownNodeType { node: String, type_tag: String },

    #[error("a node named '{0}' already exists in the graph")]
    DuplicateNodeName(String),

    #[error("connection '{connection}' references the {side} node '{node}' which does not exist")]
    UnknownNode {
        connection: String,
        side: &'static str,
        node: String,
    },

    #[error("cannot add node '{0}' without any connections")]
    EmptyConnectionList(String),

    #[error("connection '{connection}' does not involve node '{node}'")]
    ConnectionNotOnNode { connection: String, node: String },

    #[error("the nodes in this graph contain at least one cyclic dependency")]
    CyclicGraph,

    #[error(transparent)]
    Connector(#[from] ConnectorError),

    #[error(transparent)]
    Node(#[from] NodeError),

    #[error("type mismatch when reading output port '{port}': the value on the edge is not of type {expected}")]
    OutputTypeMismatch {
        port: PortId,
        expected: &'static str,
    },

    #[error("failed to create node '{node}' of type '{node_type}': {source}")]
    NodeConstruction {
        node: String,
        node_type: String,
        #[source]
        source: BoxError,
    },

    #[error("error when executing node '{node}' of type '{node_type}': {source}")]
    NodeExecution {
        node: String,
        node_type: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to build the worker thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
