// symphony-api: Async Rust client for the WaterFurnace Symphony cloud
//
// Three surfaces: the account web login, the endpoint configuration
// resource, and the streaming JSON protocol over WebSocket.

pub mod auth;
pub mod error;
pub mod protocol;
pub mod transport;
pub mod websocket;

pub use auth::{WebClient, WebEndpoints};
pub use error::Error;
pub use protocol::{Gateway, LoginResponse, ReadResponse, Request, ResponseHeader};
pub use transport::{CertificatePolicy, TransportConfig};
pub use websocket::{StreamingTransport, TransportConnector, WsConnector};
