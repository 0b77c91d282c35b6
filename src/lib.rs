pub use nodeflow_core::*;
pub use nodeflow_graph::*;
