use serde_json::Value;
use thiserror::Error;

use super::config::McpServerConfig;
use super::protocol::{
    initialize_params, tool_call_params, JsonRpcError, McpToolDef, ToolCallResult,
    ToolsListResult,
};
use super::transport::{McpTransport, StdioTransport, TransportError};

#[derive(Debug, Error)]
pub enum McpError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("{method} failed: {source}")]
    Rpc {
        method: String,
        #[source]
        source: JsonRpcError,
    },

    #[error("unexpected {method} result: {source}")]
    Decode {
        method: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown tool server: {0}")]
    UnknownServer(String),
}

/// An initialized connection to one tool server
pub struct McpClient {
    transport: Box<dyn McpTransport>,
    server_info: Value,
}

impl McpClient {
    /// Spawn the server and complete the handshake
    pub async fn connect(config: &McpServerConfig) -> Result<Self, McpError> {
        let transport = StdioTransport::spawn(config)?;
        Self::initialize(Box::new(transport)).await
    }

    /// Run the `initialize` handshake over an already open transport
    pub async fn initialize(transport: Box<dyn McpTransport>) -> Result<Self, McpError> {
        let response = transport
            .send_request("initialize", Some(initialize_params()))
            .await?;
        let result = response.into_result().map_err(|source| McpError::Rpc {
            method: "initialize".to_string(),
            source,
        })?;
        transport
            .send_notification("notifications/initialized")
            .await?;

        let server_info = result.get("serverInfo").cloned().unwrap_or(Value::Null);
        tracing::debug!(server = %server_info, "tool server initialized");
        Ok(Self {
            transport,
            server_info,
        })
    }

    /// `serverInfo` from the handshake, `null` when the server sent none
    pub fn server_info(&self) -> &Value {
        &self.server_info
    }

    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, McpError> {
        self.transport
            .send_request(method, params)
            .await?
            .into_result()
            .map_err(|source| McpError::Rpc {
                method: method.to_string(),
                source,
            })
    }

    pub async fn list_tools(&self) -> Result<Vec<McpToolDef>, McpError> {
        let result = self.request("tools/list", None).await?;
        let list: ToolsListResult =
            serde_json::from_value(result).map_err(|source| McpError::Decode {
                method: "tools/list".to_string(),
                source,
            })?;
        Ok(list.tools)
    }

    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolCallResult, McpError> {
        let result = self
            .request("tools/call", Some(tool_call_params(name, arguments)))
            .await?;
        serde_json::from_value(result).map_err(|source| McpError::Decode {
            method: "tools/call".to_string(),
            source,
        })
    }

    pub fn is_alive(&self) -> bool {
        self.transport.is_alive()
    }

    pub async fn shutdown(&self) {
        self.transport.shutdown().await;
    }
}
