use std::collections::BTreeSet;
use std::time::Instant;

use ahash::{AHashMap, AHashSet};
use crossbeam::channel;

use nodeflow_core::{BoxError, Connector, Node};

use crate::graph::{GraphError, SortedNodes};

/// How `Graph::execute` runs the nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// One node at a time, in linear execution order.
    Serial,
    /// Data-dependency-driven on a worker pool: a node runs as soon as
    /// all of its predecessors have finished.
    Parallel,
}

/// A lazily built, graph-scoped rayon pool.
///
/// Scoping the pool to the graph keeps tests hermetic and lets two graphs
/// execute concurrently without sharing scheduler state. The pool is
/// rebuilt when the configured thread count changes.
pub(crate) struct WorkerPool {
    threads: usize,
    pool: Option<rayon::ThreadPool>,
}

impl WorkerPool {
    pub(crate) fn new() -> Self {
        Self {
            threads: 0,
            pool: None,
        }
    }

    /// Number of worker threads; `0` lets rayon pick.
    pub(crate) fn threads(&self) -> usize {
        self.threads
    }

    pub(crate) fn set_threads(&mut self, threads: usize) {
        if threads != self.threads {
            self.threads = threads;
            self.pool = None;
        }
    }

    pub(crate) fn get(&mut self) -> Result<&rayon::ThreadPool, GraphError> {
        if self.pool.is_none() {
            let mut builder = rayon::ThreadPoolBuilder::new();
            if self.threads > 0 {
                builder = builder.num_threads(self.threads);
            }
            self.pool = Some(builder.build()?);
        }
        Ok(self.pool.as_ref().expect("pool was just built"))
    }
}

fn execution_error(node: &dyn Node, source: BoxError) -> GraphError {
    GraphError::NodeExecution {
        node: node.name().to_string(),
        node_type: node.node_type().to_string(),
        source,
    }
}

/// Walk the nodes in linear execution order, one at a time.
pub(crate) fn run_serial(
    nodes: &mut [Box<dyn Node>],
    connector: &Connector,
) -> Result<(), GraphError> {
    connector.clear_values();

    for node in nodes.iter_mut() {
        log::debug!("executing node '{}'", node.name());
        let started = Instant::now();
        node.execute()
            .map_err(|source| execution_error(&**node, source))?;
        log::debug!("node '{}' finished in {:?}", node.name(), started.elapsed());
    }

    Ok(())
}

type Completion = (usize, Box<dyn Node>, Result<(), BoxError>);

/// Data-dependency-driven execution on the worker pool.
///
/// Scheduling state is three disjoint sets over node names. Every round
/// submits the ready batch (queued nodes whose predecessors have all
/// finished), then blocks on the completion channel for at least one
/// result. Each submitted node is moved into its task and handed back
/// through the channel, so the graph always gets its nodes back.
///
/// On the first node failure no further nodes are submitted; everything
/// already running is drained before the wrapped error is returned.
pub(crate) fn run_parallel(
    nodes: &mut Vec<Box<dyn Node>>,
    order: &SortedNodes,
    connector: &Connector,
    pool: &rayon::ThreadPool,
) -> Result<(), GraphError> {
    connector.clear_values();

    let mut slots: Vec<Option<Box<dyn Node>>> = nodes.drain(..).map(Some).collect();
    let slot_index: AHashMap<String, usize> = slots
        .iter()
        .enumerate()
        .map(|(index, slot)| {
            let node = slot.as_ref().expect("slot is filled at start");
            (node.name().to_string(), index)
        })
        .collect();

    let mut queued: BTreeSet<String> = order.linear_order.iter().cloned().collect();
    let mut running: AHashSet<String> = AHashSet::with_capacity(slots.len());
    let mut finished: AHashSet<String> = AHashSet::with_capacity(slots.len());

    let (tx, rx) = channel::unbounded::<Completion>();
    let mut first_error: Option<GraphError> = None;

    while !queued.is_empty() && first_error.is_none() {
        let ready: Vec<String> = queued
            .iter()
            .filter(|name| {
                order
                    .predecessors
                    .get(*name)
                    .map_or(true, |preds| preds.iter().all(|p| finished.contains(p)))
            })
            .cloned()
            .collect();

        let made_progress = !ready.is_empty();
        for name in ready {
            queued.remove(&name);
            let Some(&index) = slot_index.get(&name) else {
                // Stale order entry: the node was removed after the last
                // sort. Count it as finished so its dependents still run.
                finished.insert(name);
                continue;
            };
            let Some(mut node) = slots[index].take() else {
                finished.insert(name);
                continue;
            };
            running.insert(name);

            let tx = tx.clone();
            pool.spawn(move || {
                log::debug!("executing node '{}'", node.name());
                let started = Instant::now();
                let result = node.execute();
                log::debug!("node '{}' finished in {:?}", node.name(), started.elapsed());
                let _ = tx.send((index, node, result));
            });
        }

        if running.is_empty() {
            if made_progress {
                continue;
            }
            // Unreachable for a DAG: some queued node must be ready or
            // have a running predecessor.
            break;
        }

        harvest(&rx, &mut slots, &mut running, &mut finished, &mut first_error);
    }

    while !running.is_empty() {
        harvest(&rx, &mut slots, &mut running, &mut finished, &mut first_error);
    }

    nodes.extend(slots.into_iter().flatten());

    match first_error {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

/// Block until one submitted node completes, then record the result and
/// hand the node back to its slot.
fn harvest(
    rx: &channel::Receiver<Completion>,
    slots: &mut [Option<Box<dyn Node>>],
    running: &mut AHashSet<String>,
    finished: &mut AHashSet<String>,
    first_error: &mut Option<GraphError>,
) {
    let Ok((index, node, result)) = rx.recv() else {
        // Unreachable while we hold a sender; bail out defensively.
        running.clear();
        return;
    };

    let name = node.name().to_string();
    running.remove(&name);
    finished.insert(name);

    if let Err(source) = result {
        if first_error.is_none() {
            *first_error = Some(execution_error(&*node, source));
        }
    }

    slots[index] = Some(node);
}
