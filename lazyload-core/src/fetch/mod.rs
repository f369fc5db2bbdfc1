//! Fetching: the transport seam, concrete transports, and the bounded pipe
//! pool every fetch goes through.

pub mod fs;
#[cfg(feature = "http")]
pub mod http;
pub mod pipes;
pub mod routing;
pub mod transport;

pub use fs::FileTransport;
#[cfg(feature = "http")]
pub use http::HttpTransport;
pub use pipes::{Pipe, PipePool};
pub use routing::RoutingTransport;
pub use transport::{FetchRequest, FetchResponse, Transport, TransportError};
