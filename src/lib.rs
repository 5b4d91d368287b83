pub mod config;
pub mod decision;
pub mod error;
pub mod forwarder;
pub mod headers;
pub mod logging;
pub mod proxy_url;
pub mod transport;

pub use config::{Config, GatewaySettings};
pub use error::{GatewayError, TransportError};
pub use forwarder::{ForwardRequest, ForwardResult, Forwarder};
pub use headers::HeaderList;
pub use proxy_url::{build_proxy_url, ProxyDescriptor, ProxySource};
pub use transport::{HttpTransport, HyperTransport, ResponseBody, ResponseType};
