// tdlink-api: wire envelope, engine types, and transport boundary

pub mod error;
pub mod message;
pub mod methods;
pub mod transport;
pub mod types;

pub use error::Error;
pub use message::{ClientId, Message, Request};
pub use methods::Method;
pub use transport::{StdioTransport, Transport};
pub use types::{AuthorizationState, ConnectionState, EngineError, TdlibParameters, Update};
