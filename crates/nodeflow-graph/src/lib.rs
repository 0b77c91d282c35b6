mod executor;
mod graph;

pub use executor::ExecutionMode;
pub use graph::{Graph, GraphError, SortedNodes};
