mod error;
mod topo;

use std::collections::BTreeSet;
use std::sync::Arc;

use ahash::AHashMap;

use nodeflow_core::{
    ConnectionDefinition, Connector, GraphDefinition, Node, NodeDefinition, NodeRegistry, Port,
    PortValue,
};

use crate::executor::{self, ExecutionMode, WorkerPool};

pub use error::GraphError;
pub use topo::SortedNodes;

/// A dataflow graph: node instances held in linear execution order, the
/// edge set connecting their ports, and the machinery to run them.
///
/// The graph and every node share one [`Connector`]; all values flowing
/// between nodes live there. Structural mutations keep the execution
/// order consistent and roll themselves back when they would break an
/// invariant (unknown endpoint, duplicate name, cycle).
pub struct Graph {
    name: String,
    connector: Arc<Connector>,
    registry: NodeRegistry,
    /// Node instances, kept in linear execution order after every sort.
    nodes: Vec<Box<dyn Node>>,
    /// The canonical source of truth for topology.
    connections: BTreeSet<ConnectionDefinition>,
    /// Output of the last sort.
    order: SortedNodes,
    /// Node name -> position in `nodes`. The key set always mirrors
    /// `nodes`; positions are only meaningful right after a sort.
    node_index: AHashMap<String, usize>,
    pool: WorkerPool,
}

impl Graph {
    /// Build a graph from a definition, instantiating every node through
    /// the registry and wiring every connection.
    ///
    /// Fails on an unknown node type, a duplicate node name, an invalid
    /// connection, or a cyclic topology. Nodes without any connection are
    /// dropped by the initial sort.
    pub fn new(definition: &GraphDefinition, registry: NodeRegistry) -> Result<Self, GraphError> {
        let mut graph = Self {
            name: definition.name.clone(),
            connector: Arc::new(Connector::new()),
            registry,
            nodes: Vec::with_capacity(definition.nodes.len()),
            connections: BTreeSet::new(),
            order: SortedNodes::default(),
            node_index: AHashMap::new(),
            pool: WorkerPool::new(),
        };

        for node in &definition.nodes {
            graph.create_and_add_node(node.clone())?;
        }
        for connection in &definition.connections {
            graph.add_connection_inner(connection.clone(), false)?;
        }
        graph.sort_nodes()?;

        Ok(graph)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether a node with this name currently exists in the graph.
    pub fn has_node(&self, name: &str) -> bool {
        self.node_index.contains_key(name)
    }

    /// Add a node together with the connections that attach it to the
    /// rest of the graph.
    ///
    /// `connections` must be non-empty and every entry must involve the
    /// new node (a node that is connected to nothing would be dropped by
    /// the next sort). On any failure the node and any connections added
    /// so far are removed again.
    pub fn add_node(
        &mut self,
        definition: NodeDefinition,
        connections: &[ConnectionDefinition],
    ) -> Result<(), GraphError> {
        if connections.is_empty() {
            return Err(GraphError::EmptyConnectionList(definition.name.clone()));
        }
        for connection in connections {
            if connection.src.node != definition.name && connection.dst.node != definition.name {
                return Err(GraphError::ConnectionNotOnNode {
                    connection: connection.name(),
                    node: definition.name.clone(),
                });
            }
        }

        let name = definition.name.clone();
        self.create_and_add_node(definition)?;

        let mut added: Vec<&ConnectionDefinition> = Vec::with_capacity(connections.len());
        for connection in connections {
            match self.add_connection_inner(connection.clone(), false) {
                Ok(()) => added.push(connection),
                Err(error) => {
                    log::error!(
                        "failed to add connection {} while adding node '{}': {}",
                        connection,
                        name,
                        error
                    );
                    self.rollback_node(&name, &added);
                    return Err(error);
                }
            }
        }

        match self.sort_nodes() {
            Ok(()) => Ok(()),
            Err(error) => {
                self.rollback_node(&name, &added);
                let _ = self.sort_nodes();
                Err(error)
            }
        }
    }

    /// Remove a node and every connection touching it. Removing a node
    /// that does not exist logs a warning and returns.
    ///
    /// The surviving nodes keep their current order; no re-sort happens
    /// until the next structural change that asks for one.
    pub fn remove_node(&mut self, name: &str) {
        if !self.has_node(name) {
            log::warn!("attempted to remove node '{}' which does not exist", name);
            return;
        }

        let touching: Vec<ConnectionDefinition> = self
            .connections
            .iter()
            .filter(|c| c.src.node == name || c.dst.node == name)
            .cloned()
            .collect();
        for connection in &touching {
            let _ = self.remove_connection(connection, false);
        }

        self.erase_node(name);
        log::info!("removed node '{}'", name);
    }

    /// Add a connection between two existing nodes.
    ///
    /// Adding a connection that already exists logs a warning and is a
    /// no-op. With `reorder` the nodes are re-sorted afterwards; a cycle
    /// introduced by the connection rolls the insertion back.
    pub fn add_connection(
        &mut self,
        connection: ConnectionDefinition,
        reorder: bool,
    ) -> Result<(), GraphError> {
        self.add_connection_inner(connection, reorder)
    }

    /// Remove a connection. Removing one that does not exist logs a
    /// warning. With `reorder` the nodes are re-sorted, which also drops
    /// nodes the removal left without any connection.
    pub fn remove_connection(
        &mut self,
        connection: &ConnectionDefinition,
        reorder: bool,
    ) -> Result<(), GraphError> {
        if self.connections.remove(connection) {
            log::info!("removed connection {}", connection);
        } else {
            log::warn!(
                "attempted to remove connection {} which does not exist",
                connection
            );
        }
        self.connector.disconnect(&connection.src, &connection.dst);

        if reorder {
            self.sort_nodes()?;
        }
        Ok(())
    }

    /// Run every node once, honoring data dependencies.
    pub fn execute(&mut self, mode: ExecutionMode) -> Result<(), GraphError> {
        match mode {
            ExecutionMode::Serial => self.execute_serial(),
            ExecutionMode::Parallel => self.execute_parallel(),
        }
    }

    /// Run the nodes one at a time in linear execution order.
    ///
    /// All edge values are cleared first. A failing node aborts the
    /// execution; the error names the node and its type.
    pub fn execute_serial(&mut self) -> Result<(), GraphError> {
        log::debug!("executing graph '{}' serially", self.name);
        executor::run_serial(&mut self.nodes, &self.connector)
    }

    /// Run the nodes on the worker pool; a node starts as soon as all of
    /// its upstream nodes have finished. Nodes with no path between them
    /// may run concurrently in any order.
    pub fn execute_parallel(&mut self) -> Result<(), GraphError> {
        log::debug!("executing graph '{}' in parallel", self.name);
        let pool = self.pool.get()?;
        executor::run_parallel(&mut self.nodes, &self.order, &self.connector, pool)
    }

    /// Read the value a node produced on one of its output ports during
    /// the last execution, downcast to `T`.
    pub fn get_output<T: PortValue>(&self, port: &Port) -> Result<T, GraphError> {
        let value = self.connector.value_from_output(&port.id())?;
        match value.downcast::<T>() {
            Ok(value) => Ok(*value),
            Err(_) => Err(GraphError::OutputTypeMismatch {
                port: port.id(),
                expected: std::any::type_name::<T>(),
            }),
        }
    }

    /// Inject a value into an output port's edge, as if the owning node
    /// had produced it. Every connected input sees the value. A later
    /// execution of the producing node overwrites it.
    pub fn fake_output<T: PortValue>(&self, port: &Port, value: T) -> Result<(), GraphError> {
        self.connector.set_value(&port.id(), Box::new(value))?;
        log::debug!("faked output on port '{}'", port);
        Ok(())
    }

    /// Number of worker threads used by `execute_parallel`; `0` means the
    /// pool picks a default.
    pub fn parallel_thread_count(&self) -> usize {
        self.pool.threads()
    }

    pub fn set_parallel_thread_count(&mut self, threads: usize) {
        self.pool.set_threads(threads);
    }

    fn create_and_add_node(&mut self, definition: NodeDefinition) -> Result<(), GraphError> {
        if self.has_node(&definition.name) {
            return Err(GraphError::DuplicateNodeName(definition.name));
        }

        let constructor = self
            .registry
            .get(&definition.type_tag)
            .ok_or_else(|| GraphError::UnknownNodeType {
                node: definition.name.clone(),
                type_tag: definition.type_tag.clone(),
            })?
            .clone();

        let name = definition.name.clone();
        let type_tag = definition.type_tag.clone();
        let node = constructor(definition, Arc::clone(&self.connector)).map_err(|source| {
            GraphError::NodeConstruction {
                node: name.clone(),
                node_type: type_tag.clone(),
                source,
            }
        })?;

        log::info!("created node '{}' of type '{}'", name, type_tag);
        self.node_index.insert(name, self.nodes.len());
        self.nodes.push(node);
        Ok(())
    }

    fn add_connection_inner(
        &mut self,
        connection: ConnectionDefinition,
        reorder: bool,
    ) -> Result<(), GraphError> {
        self.check_connection_endpoints(&connection)?;

        if self.connections.contains(&connection) {
            log::warn!("attempted to add connection {} which already exists", connection);
            return Ok(());
        }

        self.connector.connect(&connection.src, &connection.dst)?;
        self.connections.insert(connection.clone());
        log::info!("added connection {}", connection);

        if reorder {
            if let Err(error) = self.sort_nodes() {
                self.connections.remove(&connection);
                self.connector.disconnect(&connection.src, &connection.dst);
                // The edge set was acyclic before the insertion.
                let _ = self.sort_nodes();
                return Err(error);
            }
        }
        Ok(())
    }

    fn check_connection_endpoints(
        &self,
        connection: &ConnectionDefinition,
    ) -> Result<(), GraphError> {
        if !self.has_node(&connection.src.node) {
            return Err(GraphError::UnknownNode {
                connection: connection.name(),
                side: "source",
                node: connection.src.node.clone(),
            });
        }
        if !self.has_node(&connection.dst.node) {
            return Err(GraphError::UnknownNode {
                connection: connection.name(),
                side: "destination",
                node: connection.dst.node.clone(),
            });
        }
        Ok(())
    }

    fn rollback_node(&mut self, name: &str, added: &[&ConnectionDefinition]) {
        for connection in added {
            self.connections.remove(*connection);
            self.connector.disconnect(&connection.src, &connection.dst);
        }
        self.erase_node(name);
    }

    fn erase_node(&mut self, name: &str) {
        if let Some(position) = self.nodes.iter().position(|node| node.name() == name) {
            self.nodes.remove(position);
        }
        self.node_index.remove(name);
    }

    /// Re-run the sorter and bring `nodes` into linear execution order.
    /// Nodes that no longer appear in any connection are dropped.
    fn sort_nodes(&mut self) -> Result<(), GraphError> {
        log::debug!("sorting nodes of graph '{}'", self.name);

        let order = topo::sort(&self.connections).map_err(|_| GraphError::CyclicGraph)?;

        let mut by_name: AHashMap<String, Box<dyn Node>> = self
            .nodes
            .drain(..)
            .map(|node| (node.name().to_string(), node))
            .collect();

        for name in &order.linear_order {
            if let Some(node) = by_name.remove(name) {
                self.nodes.push(node);
            }
        }
        for (name, _) in by_name {
            log::debug!("node '{}' has no connections and will be dropped", name);
        }

        self.node_index = self
            .nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (node.name().to_string(), index))
            .collect();
        self.order = order;

        log::debug!(
            "execution order: {}",
            self.order.linear_order.join(" -> ")
        );
        Ok(())
    }
}
