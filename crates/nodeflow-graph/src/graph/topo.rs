use std::collections::{BTreeMap, BTreeSet, VecDeque};

use smallvec::SmallVec;

use nodeflow_core::ConnectionDefinition;

/// The sorter's output: a linear execution order plus, for every node
/// that appears in at least one edge, the set of its direct upstream
/// nodes (empty for sources).
#[derive(Debug, Clone, Default)]
pub struct SortedNodes {
    pub linear_order: Vec<String>,
    pub predecessors: BTreeMap<String, BTreeSet<String>>,
}

#[derive(Debug, thiserror::Error)]
#[error("the nodes in this graph contain at least one cyclic dependency")]
pub struct CycleError;

type Adjacency = BTreeMap<String, SmallVec<[String; 4]>>;

/// Depth-first topological sort (Cormen et al. §22.4) over the adjacency
/// view built from the edges.
///
/// Nodes that appear in no edge do not exist as far as the sorter is
/// concerned. The adjacency map is ordered by node name, so the order is
/// deterministic for a given edge set.
pub fn sort<'a, I>(edges: I) -> Result<SortedNodes, CycleError>
where
    I: IntoIterator<Item = &'a ConnectionDefinition>,
{
    let mut adjacency = Adjacency::new();
    let mut predecessors: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for edge in edges {
        let src = &edge.src.node;
        let dst = &edge.dst.node;
        adjacency.entry(src.clone()).or_default().push(dst.clone());
        adjacency.entry(dst.clone()).or_default();
        predecessors.entry(src.clone()).or_default();
        predecessors
            .entry(dst.clone())
            .or_default()
            .insert(src.clone());
    }

    let mut permanent = BTreeSet::new();
    let mut temporary = BTreeSet::new();
    let mut order = VecDeque::with_capacity(adjacency.len());

    for name in adjacency.keys() {
        if !permanent.contains(name) {
            visit(name, &adjacency, &mut permanent, &mut temporary, &mut order)?;
        }
    }

    Ok(SortedNodes {
        linear_order: order.into_iter().collect(),
        predecessors,
    })
}

fn visit(
    name: &str,
    adjacency: &Adjacency,
    permanent: &mut BTreeSet<String>,
    temporary: &mut BTreeSet<String>,
    order: &mut VecDeque<String>,
) -> Result<(), CycleError> {
    if permanent.contains(name) {
        return Ok(());
    }
    if temporary.contains(name) {
        return Err(CycleError);
    }

    temporary.insert(name.to_string());
    if let Some(descendants) = adjacency.get(name) {
        for next in descendants {
            visit(next, adjacency, permanent, temporary, order)?;
        }
    }
    temporary.remove(name);
    permanent.insert(name.to_string());
    order.push_front(name.to_string());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edges(pairs: &[(&str, &str)]) -> Vec<ConnectionDefinition> {
        pairs
            .iter()
            .map(|(src, dst)| {
                ConnectionDefinition::parse(&format!("{src}:out"), &format!("{dst}:in")).unwrap()
            })
            .collect()
    }

    fn position(order: &[String], name: &str) -> usize {
        order.iter().position(|n| n == name).unwrap()
    }

    #[test]
    fn linear_chain() {
        let edges = edges(&[("A", "B"), ("B", "C")]);
        let sorted = sort(&edges).unwrap();
        assert_eq!(sorted.linear_order, vec!["A", "B", "C"]);
    }

    #[test]
    fn diamond_respects_every_edge() {
        let edges = edges(&[("S", "L"), ("S", "R"), ("L", "J"), ("R", "J")]);
        let sorted = sort(&edges).unwrap();
        let order = &sorted.linear_order;

        assert_eq!(order.len(), 4);
        assert!(position(order, "S") < position(order, "L"));
        assert!(position(order, "S") < position(order, "R"));
        assert!(position(order, "L") < position(order, "J"));
        assert!(position(order, "R") < position(order, "J"));
    }

    #[test]
    fn predecessor_map() {
        let edges = edges(&[("S", "L"), ("S", "R"), ("L", "J"), ("R", "J")]);
        let sorted = sort(&edges).unwrap();

        assert!(sorted.predecessors["S"].is_empty());
        assert_eq!(
            sorted.predecessors["J"],
            ["L", "R"].iter().map(|s| s.to_string()).collect()
        );
        assert_eq!(
            sorted.predecessors["L"],
            std::iter::once("S".to_string()).collect()
        );
    }

    #[test]
    fn isolated_nodes_are_absent() {
        // The sorter only ever sees edges; a node without any connection
        // simply never shows up.
        let edges = edges(&[("A", "B")]);
        let sorted = sort(&edges).unwrap();
        assert_eq!(sorted.linear_order, vec!["A", "B"]);
    }

    #[test]
    fn cycle_is_an_error() {
        let edges = edges(&[("A", "B"), ("B", "C"), ("C", "A")]);
        assert!(sort(&edges).is_err());
    }

    #[test]
    fn deterministic_for_unrelated_nodes() {
        let edges = edges(&[("X", "Y"), ("A", "B")]);
        let first = sort(&edges).unwrap();
        for _ in 0..16 {
            assert_eq!(sort(&edges).unwrap().linear_order, first.linear_order);
        }
        // Roots are visited in name order and prepended, so the chain
        // visited last comes out first.
        assert_eq!(first.linear_order, vec!["X", "Y", "A", "B"]);
    }

    #[test]
    fn empty_edge_list() {
        let sorted = sort(&[]).unwrap();
        assert!(sorted.linear_order.is_empty());
        assert!(sorted.predecessors.is_empty());
    }
}
