// Copyright 2025-2026 the Headlamp authors. MIT license.

//! Wire-level client for the Chrome DevTools Protocol: the WebSocket
//! transport with request/response correlation, the typed subset of the
//! protocol the session layer consumes, and HTTP endpoint discovery.

mod browser;
mod errors;
pub mod protocol;
mod transport;

pub use browser::BrowserHttpClient;
pub use browser::TargetDescription;
pub use browser::VersionInfo;
pub use errors::CdpError;
pub use errors::RpcError;
pub use transport::CdpTransport;
pub use transport::DEFAULT_COMMAND_TIMEOUT;
pub use transport::DEFAULT_CONNECT_TIMEOUT;
pub use transport::TransportEvent;
pub use transport::TransportOptions;
