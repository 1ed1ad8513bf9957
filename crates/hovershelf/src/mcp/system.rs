use anyhow::Result;
use async_trait::async_trait;

use super::client::{McpClient, McpError};
use super::config::McpServerRegistry;
use super::protocol::{ToolCallContent, ToolCallResult};
use crate::errors::{AgentError, AgentResult};
use crate::models::content::Content;
use crate::models::tool::{Tool, ToolCall};
use crate::session::SystemConnector;
use crate::systems::System;

/// One connected tool server, seen by the agent as a system
pub struct McpSystem {
    name: String,
    description: String,
    instructions: String,
    tools: Vec<Tool>,
    client: McpClient,
}

impl McpSystem {
    pub async fn new<S: Into<String>>(name: S, client: McpClient) -> Result<Self, McpError> {
        let name = name.into();
        let tools = client
            .list_tools()
            .await?
            .into_iter()
            .map(|def| Tool::new(def.name, def.description, def.input_schema))
            .collect();

        let instructions = client
            .server_info()
            .get("instructions")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        Ok(Self {
            description: format!("Tools provided by the {} server", name),
            name,
            instructions,
            tools,
            client,
        })
    }
}

fn into_contents(result: ToolCallResult) -> AgentResult<Vec<Content>> {
    let contents: Vec<Content> = result
        .content
        .into_iter()
        .filter_map(|item| match item {
            ToolCallContent::Text { text } => Some(Content::text(text)),
            ToolCallContent::Image { data, mime_type } => Some(Content::image(data, mime_type)),
            ToolCallContent::Resource { resource } => resource
                .get("text")
                .or_else(|| resource.get("uri"))
                .and_then(|v| v.as_str())
                .map(Content::text),
            ToolCallContent::Unsupported => None,
        })
        .collect();

    if result.is_error {
        let message = contents
            .iter()
            .filter_map(Content::as_text)
            .collect::<Vec<_>>()
            .join("\n");
        return Err(AgentError::ExecutionError(message));
    }
    Ok(contents)
}

#[async_trait]
impl System for McpSystem {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn instructions(&self) -> &str {
        &self.instructions
    }

    fn tools(&self) -> &[Tool] {
        &self.tools
    }

    async fn call(&self, tool_call: ToolCall) -> AgentResult<Vec<Content>> {
        if !self.tools.iter().any(|tool| tool.name == tool_call.name) {
            return Err(AgentError::ToolNotFound(tool_call.name));
        }

        tracing::debug!(system = %self.name, tool = %tool_call.name, "calling tool");
        let result = self
            .client
            .call_tool(&tool_call.name, tool_call.arguments)
            .await
            .map_err(|e| AgentError::ExecutionError(e.to_string()))?;
        into_contents(result)
    }
}

/// Spawns tool servers by name from a registry
pub struct McpConnector {
    registry: McpServerRegistry,
}

impl McpConnector {
    pub fn new(registry: McpServerRegistry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl SystemConnector for McpConnector {
    async fn connect(&self, server_name: &str) -> Result<Box<dyn System>> {
        let config = self
            .registry
            .get(server_name)
            .ok_or_else(|| McpError::UnknownServer(server_name.to_string()))?;

        tracing::info!(server = server_name, command = %config.command, "starting tool server");
        let client = McpClient::connect(config).await?;
        let system = McpSystem::new(server_name, client).await?;
        Ok(Box::new(system))
    }
}
