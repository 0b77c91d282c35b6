use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use ahash::AHashMap;

use crate::connection::{Port, PortId, PortKind};
use crate::error::ConnectorError;
use crate::value::BoxedValue;

/// The value-exchange fabric shared by every node of a graph.
///
/// The connector owns one value cell per edge, knows which port feeds
/// which edge, and is the single source of truth for whether a port is an
/// input or an output. Nodes never talk to each other directly; all port
/// I/O goes through here.
///
/// All state sits behind one mutex: node bodies running on worker threads
/// read and write edge values concurrently, and the maps they touch are
/// shared.
pub struct Connector {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    /// One cell per edge, keyed by the source port's id. A missing entry
    /// means no value has been produced on that edge yet.
    edge_values: AHashMap<PortId, BoxedValue>,
    /// Port id -> edge key. An output maps to its own id (which serves as
    /// the edge key for every downstream input); an input maps to the id
    /// of its connected output.
    port_to_edge: AHashMap<PortId, PortId>,
    /// Write-once classification of every port that ever took part in a
    /// connection.
    port_kind: AHashMap<PortId, PortKind>,
    /// Connected input port names per node, in name order.
    inputs_by_node: BTreeMap<String, BTreeSet<String>>,
    /// Connected output port names per node, in name order.
    outputs_by_node: BTreeMap<String, BTreeSet<String>>,
}

impl State {
    fn check_kind(&self, id: &PortId, kind: PortKind) -> Result<(), ConnectorError> {
        match self.port_kind.get(id) {
            Some(existing) if *existing != kind => Err(ConnectorError::PortKindConflict {
                port: id.clone(),
                kind: *existing,
            }),
            _ => Ok(()),
        }
    }
}

impl Connector {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    /// Wire an output port to an input port.
    ///
    /// Classifies both ports (an error if either was previously used with
    /// the opposite kind), assigns the edge key, and updates the per-node
    /// port indexes. Fails without touching any state when the connection
    /// is reflexive, a port kind conflicts, or the input is already fed by
    /// another output.
    pub fn connect(&self, out: &Port, input: &Port) -> Result<(), ConnectorError> {
        if out == input {
            log::error!("cannot connect port '{}' to itself", out);
            return Err(ConnectorError::SelfConnection(out.id()));
        }

        let out_id = out.id();
        let in_id = input.id();
        let mut state = self.state.lock().unwrap();

        state.check_kind(&out_id, PortKind::Output)?;
        state.check_kind(&in_id, PortKind::Input)?;

        if let Some(connected_to) = state.port_to_edge.get(&in_id) {
            return Err(ConnectorError::InputAlreadyConnected {
                input: in_id,
                connected_to: connected_to.clone(),
            });
        }

        state.port_kind.insert(out_id.clone(), PortKind::Output);
        state.port_kind.insert(in_id.clone(), PortKind::Input);
        state.port_to_edge.insert(out_id.clone(), out_id.clone());
        state.port_to_edge.insert(in_id, out_id);
        state
            .outputs_by_node
            .entry(out.node.clone())
            .or_default()
            .insert(out.port.clone());
        state
            .inputs_by_node
            .entry(input.node.clone())
            .or_default()
            .insert(input.port.clone());

        Ok(())
    }

    /// Undo a `connect`. Unknown entries are logged and skipped; the port
    /// kind classification is kept for the life of the port.
    ///
    /// The output's edge mapping survives as long as any other input still
    /// reads from it (an output may fan out to several inputs).
    pub fn disconnect(&self, out: &Port, input: &Port) {
        let out_id = out.id();
        let in_id = input.id();
        let mut state = self.state.lock().unwrap();

        if state.port_to_edge.remove(&in_id).is_none() {
            log::warn!("disconnect: input port '{}' has no connection entry", in_id);
        }
        if let Some(ports) = state.inputs_by_node.get_mut(&input.node) {
            ports.remove(&input.port);
        }

        let still_fanned_out = state
            .port_to_edge
            .iter()
            .any(|(port, edge)| *edge == out_id && *port != out_id);
        if !still_fanned_out {
            if state.port_to_edge.remove(&out_id).is_none() {
                log::warn!("disconnect: output port '{}' has no connection entry", out_id);
            }
            if let Some(ports) = state.outputs_by_node.get_mut(&out.node) {
                ports.remove(&out.port);
            }
        }
    }

    /// Store a value on an output port's edge.
    ///
    /// The port must be classified as an output. When the output has no
    /// downstream connection the call is a silent no-op; producers are not
    /// obliged to have consumers. A second write within the same execution
    /// silently overwrites the first.
    pub fn set_value(&self, port_id: &PortId, value: BoxedValue) -> Result<(), ConnectorError> {
        let mut state = self.state.lock().unwrap();
        match state.port_kind.get(port_id) {
            None => Err(ConnectorError::UndefinedPort(port_id.clone())),
            Some(PortKind::Input) => Err(ConnectorError::NotAnOutput(port_id.clone())),
            Some(PortKind::Output) => {
                if let Some(edge) = state.port_to_edge.get(port_id).cloned() {
                    state.edge_values.insert(edge, value);
                }
                Ok(())
            }
        }
    }

    /// Whether a value is waiting on the edge feeding this input port.
    ///
    /// Lenient by design: unknown and non-input ports report `false` with
    /// a warning instead of failing, so nodes can probe optional inputs.
    pub fn has_value(&self, port_id: &PortId) -> bool {
        let state = self.state.lock().unwrap();
        match state.port_kind.get(port_id) {
            Some(PortKind::Input) => state
                .port_to_edge
                .get(port_id)
                .is_some_and(|edge| state.edge_values.contains_key(edge)),
            Some(PortKind::Output) => {
                log::warn!("port '{}' is not an input port", port_id);
                false
            }
            None => {
                log::warn!("port '{}' is undefined", port_id);
                false
            }
        }
    }

    /// Read the value on the edge feeding this input port.
    pub fn get_value(&self, port_id: &PortId) -> Result<BoxedValue, ConnectorError> {
        let state = self.state.lock().unwrap();
        match state.port_kind.get(port_id) {
            None => Err(ConnectorError::UndefinedPort(port_id.clone())),
            Some(PortKind::Output) => Err(ConnectorError::NotAnInput(port_id.clone())),
            Some(PortKind::Input) => {
                let edge = state
                    .port_to_edge
                    .get(port_id)
                    .ok_or_else(|| ConnectorError::NoConnection(port_id.clone()))?;
                state
                    .edge_values
                    .get(edge)
                    .cloned()
                    .ok_or_else(|| ConnectorError::NoValue(port_id.clone()))
            }
        }
    }

    /// Read the value sitting on an output port's edge.
    ///
    /// Never called by nodes; this is how the host inspects produced
    /// values after an execution.
    pub fn value_from_output(&self, port_id: &PortId) -> Result<BoxedValue, ConnectorError> {
        let state = self.state.lock().unwrap();
        match state.port_kind.get(port_id) {
            None => Err(ConnectorError::UndefinedPort(port_id.clone())),
            Some(PortKind::Input) => Err(ConnectorError::NotAnOutput(port_id.clone())),
            Some(PortKind::Output) => {
                let edge = state
                    .port_to_edge
                    .get(port_id)
                    .ok_or_else(|| ConnectorError::NoConnection(port_id.clone()))?;
                state
                    .edge_values
                    .get(edge)
                    .cloned()
                    .ok_or_else(|| ConnectorError::NoValue(port_id.clone()))
            }
        }
    }

    /// Drop every edge value. Called at the start of each execution.
    pub fn clear_values(&self) {
        self.state.lock().unwrap().edge_values.clear();
    }

    /// The names of all connected ports of the given kind on a node.
    pub fn connected_ports(&self, node: &str, kind: PortKind) -> BTreeSet<String> {
        let state = self.state.lock().unwrap();
        let index = match kind {
            PortKind::Input => &state.inputs_by_node,
            PortKind::Output => &state.outputs_by_node,
        };
        index.get(node).cloned().unwrap_or_default()
    }
}

impl Default for Connector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connected() -> Connector {
        let connector = Connector::new();
        connector
            .connect(&Port::new("A", "out"), &Port::new("B", "in"))
            .unwrap();
        connector
    }

    #[test]
    fn connect_classifies_ports() {
        let connector = connected();
        assert_eq!(
            connector.connected_ports("A", PortKind::Output),
            std::iter::once("out".to_string()).collect()
        );
        assert_eq!(
            connector.connected_ports("B", PortKind::Input),
            std::iter::once("in".to_string()).collect()
        );
        assert!(connector.connected_ports("A", PortKind::Input).is_empty());
    }

    #[test]
    fn reflexive_connect_is_rejected() {
        let connector = Connector::new();
        let port = Port::new("A", "out");
        assert!(matches!(
            connector.connect(&port, &port),
            Err(ConnectorError::SelfConnection(_))
        ));
    }

    #[test]
    fn port_kind_cannot_flip() {
        let connector = connected();
        // B:in is classified as an input; using it as an output must fail.
        let result = connector.connect(&Port::new("B", "in"), &Port::new("C", "in"));
        assert!(matches!(
            result,
            Err(ConnectorError::PortKindConflict { .. })
        ));
    }

    #[test]
    fn input_accepts_only_one_output() {
        let connector = connected();
        let result = connector.connect(&Port::new("X", "out"), &Port::new("B", "in"));
        assert!(matches!(
            result,
            Err(ConnectorError::InputAlreadyConnected { .. })
        ));
    }

    #[test]
    fn set_and_get_value() {
        let connector = connected();
        let out = Port::new("A", "out").id();
        let input = Port::new("B", "in").id();

        assert!(!connector.has_value(&input));
        connector.set_value(&out, Box::new(42_i32)).unwrap();
        assert!(connector.has_value(&input));

        let value = connector.get_value(&input).unwrap();
        assert_eq!(*value.downcast::<i32>().unwrap(), 42);
    }

    #[test]
    fn output_fans_out_to_many_inputs() {
        let connector = Connector::new();
        connector
            .connect(&Port::new("A", "out"), &Port::new("B", "in"))
            .unwrap();
        connector
            .connect(&Port::new("A", "out"), &Port::new("C", "in"))
            .unwrap();

        connector
            .set_value(&Port::new("A", "out").id(), Box::new(7_i32))
            .unwrap();

        for node in ["B", "C"] {
            let value = connector.get_value(&Port::new(node, "in").id()).unwrap();
            assert_eq!(*value.downcast::<i32>().unwrap(), 7);
        }
    }

    #[test]
    fn disconnect_keeps_edge_for_remaining_consumers() {
        let connector = Connector::new();
        connector
            .connect(&Port::new("A", "out"), &Port::new("B", "in"))
            .unwrap();
        connector
            .connect(&Port::new("A", "out"), &Port::new("C", "in"))
            .unwrap();

        connector.disconnect(&Port::new("A", "out"), &Port::new("B", "in"));

        connector
            .set_value(&Port::new("A", "out").id(), Box::new(1_i32))
            .unwrap();
        assert!(connector.has_value(&Port::new("C", "in").id()));
        assert!(!connector.has_value(&Port::new("B", "in").id()));
    }

    #[test]
    fn set_value_on_input_port_fails() {
        let connector = connected();
        let result = connector.set_value(&Port::new("B", "in").id(), Box::new(1_i32));
        assert!(matches!(result, Err(ConnectorError::NotAnOutput(_))));
    }

    #[test]
    fn set_value_on_unknown_port_fails() {
        let connector = connected();
        let result = connector.set_value(&Port::new("A", "foo").id(), Box::new(1_i32));
        assert!(matches!(result, Err(ConnectorError::UndefinedPort(_))));
    }

    #[test]
    fn set_value_without_downstream_is_a_no_op() {
        let connector = connected();
        let out = Port::new("A", "out");
        connector.disconnect(&out, &Port::new("B", "in"));

        // A:out keeps its output classification but has no consumer left.
        connector.set_value(&out.id(), Box::new(5_i32)).unwrap();
        assert!(matches!(
            connector.value_from_output(&out.id()),
            Err(ConnectorError::NoConnection(_))
        ));
    }

    #[test]
    fn get_value_error_kinds_are_distinct() {
        let connector = connected();

        assert!(matches!(
            connector.get_value(&Port::new("Z", "zz").id()),
            Err(ConnectorError::UndefinedPort(_))
        ));
        assert!(matches!(
            connector.get_value(&Port::new("A", "out").id()),
            Err(ConnectorError::NotAnInput(_))
        ));
        assert!(matches!(
            connector.get_value(&Port::new("B", "in").id()),
            Err(ConnectorError::NoValue(_))
        ));

        connector.disconnect(&Port::new("A", "out"), &Port::new("B", "in"));
        assert!(matches!(
            connector.get_value(&Port::new("B", "in").id()),
            Err(ConnectorError::NoConnection(_))
        ));
    }

    #[test]
    fn clear_values_empties_every_edge() {
        let connector = connected();
        connector
            .set_value(&Port::new("A", "out").id(), Box::new(42_i32))
            .unwrap();
        connector.clear_values();
        assert!(!connector.has_value(&Port::new("B", "in").id()));
    }

    #[test]
    fn has_value_is_lenient_on_unclassified_ports() {
        let connector = connected();
        assert!(!connector.has_value(&Port::new("B", "zzz").id()));
        assert!(!connector.has_value(&Port::new("A", "out").id()));
    }
}
