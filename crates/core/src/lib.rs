// Declarative operation registry and dispatcher for MCP services
//
// A service declares its tools, prompts and resources once; the registry
// resolves their parameter schemas and the dispatcher routes named calls to
// them with coerced arguments.

pub mod coerce;
pub mod config;
pub mod declaration;
pub mod dispatch;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod schema;
pub mod signature;

pub use coerce::Arguments;
pub use config::DispatchConfig;
pub use declaration::{Declaration, OperationKind};
pub use dispatch::{Dispatcher, HandlerTable, RequestHandler};
pub use error::{CoercionError, DispatchError, ErrorKind, RegistryError};
pub use registry::{Handler, Registry, RegistryBuilder, Reply, Service};
pub use schema::{ParameterSpec, SemanticType};
pub use signature::{FormalParameter, NativeType, TypeHint};
