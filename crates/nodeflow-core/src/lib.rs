pub mod connection;
pub mod connector;
pub mod definition;
pub mod error;
pub mod node;
pub mod registry;
pub mod value;

pub use connection::{ConnectionDefinition, ConnectionName, Port, PortId, PortKind};
pub use connector::Connector;
pub use definition::{GraphDefinition, NodeDefinition};
pub use error::{BoxError, ConnectorError, DefinitionError, NodeError};
pub use node::{Node, NodeContext};
pub use registry::{NodeConstructor, NodeRegistry};
pub use value::{BoxedValue, PortValue};
