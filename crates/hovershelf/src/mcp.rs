//! Model Context Protocol tool servers.
//!
//! A tool server is a child process speaking newline-delimited JSON-RPC 2.0 over stdio. Each
//! connected server is exposed to the agent as one [`System`](crate::systems::System).

mod client;
mod config;
mod protocol;
mod system;
mod transport;

pub use client::{McpClient, McpError};
pub use config::{McpServerConfig, McpServerRegistry, PUPPETEER_SERVER};
pub use protocol::{McpToolDef, ToolCallContent, ToolCallResult};
pub use system::{McpConnector, McpSystem};
pub use transport::{McpTransport, StdioTransport, TransportError};
