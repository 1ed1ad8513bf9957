use anyhow::Result;
use futures::stream::BoxStream;
use serde::Serialize;
use serde_json::json;

use crate::errors::{AgentError, AgentResult};
use crate::models::content::Content;
use crate::models::message::{Message, ToolRequest};
use crate::models::tool::{Tool, ToolCall};
use crate::prompt_template::load_prompt_file;
use crate::providers::base::Provider;
use crate::session::SystemConnector;
use crate::systems::System;

/// What an agent is: its name, its standing instruction and the tool servers it uses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSpec {
    pub name: String,
    pub instruction: String,
    pub server_names: Vec<String>,
}

impl AgentSpec {
    pub fn new<N, I>(name: N, instruction: I, server_names: Vec<String>) -> Self
    where
        N: Into<String>,
        I: Into<String>,
    {
        Self {
            name: name.into(),
            instruction: instruction.into(),
            server_names,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
struct SystemInfo {
    name: String,
    description: String,
    instructions: String,
}

impl SystemInfo {
    fn new(name: &str, description: &str, instructions: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            instructions: instructions.to_string(),
        }
    }
}

/// Agent pairs an instruction with the systems whose tools it may call
pub struct Agent {
    spec: AgentSpec,
    systems: Vec<Box<dyn System>>,
}

impl Agent {
    pub fn new(spec: AgentSpec) -> Self {
        Self {
            spec,
            systems: Vec::new(),
        }
    }

    /// Connect every server the spec names. Nothing is kept if any connection fails.
    pub async fn initialize(spec: AgentSpec, connector: &dyn SystemConnector) -> Result<Self> {
        let mut agent = Self::new(spec);
        for server_name in agent.spec.server_names.clone() {
            let system = connector.connect(&server_name).await?;
            agent.add_system(system);
        }
        tracing::info!(agent = %agent.spec.name, systems = agent.systems.len(), "agent initialized");
        Ok(agent)
    }

    pub fn spec(&self) -> &AgentSpec {
        &self.spec
    }

    pub fn add_system(&mut self, system: Box<dyn System>) {
        self.systems.push(system);
    }

    /// Every tool the model may call, named `{system}__{tool}`
    pub fn list_tools(&self) -> Vec<Tool> {
        let mut tools = Vec::new();
        for system in &self.systems {
            for tool in system.tools() {
                tools.push(Tool::new(
                    format!("{}__{}", system.name(), tool.name),
                    &tool.description,
                    tool.input_schema.clone(),
                ));
            }
        }
        tools
    }

    fn get_system_for_tool(&self, prefixed_name: &str) -> Option<&dyn System> {
        let (system_name, _) = prefixed_name.split_once("__")?;
        self.systems
            .iter()
            .find(|sys| sys.name() == system_name)
            .map(|v| &**v)
    }

    async fn dispatch_tool_call(
        &self,
        tool_call: AgentResult<ToolCall>,
    ) -> AgentResult<Vec<Content>> {
        let call = tool_call?;
        let system = self
            .get_system_for_tool(&call.name)
            .ok_or_else(|| AgentError::ToolNotFound(call.name.clone()))?;

        let (_, tool_name) = call
            .name
            .split_once("__")
            .ok_or_else(|| AgentError::InvalidToolName(call.name.clone()))?;
        let system_tool_call = ToolCall::new(tool_name, call.arguments);

        system.call(system_tool_call).await
    }

    fn get_system_prompt(&self) -> AgentResult<String> {
        let systems: Vec<SystemInfo> = self
            .systems
            .iter()
            .map(|system| {
                SystemInfo::new(system.name(), system.description(), system.instructions())
            })
            .collect();

        let context = json!({
            "instruction": self.spec.instruction,
            "systems": systems,
        });
        load_prompt_file("system.md", &context).map_err(|e| AgentError::Internal(e.to_string()))
    }

    /// Stream every message of one turn: each model response, and after each response that
    /// requested tools, the message carrying their results.
    ///
    /// The turn ends when the model answers without requesting tools or after
    /// `max_iterations` completions.
    pub async fn reply<'a>(
        &'a self,
        provider: &'a dyn Provider,
        messages: &[Message],
        max_iterations: usize,
    ) -> Result<BoxStream<'a, Result<Message>>> {
        let mut messages = messages.to_vec();
        let tools = self.list_tools();
        let system_prompt = self.get_system_prompt()?;

        Ok(Box::pin(async_stream::try_stream! {
            let mut iteration = 0;
            loop {
                iteration += 1;
                let (response, usage) = provider.complete(
                    &system_prompt,
                    &messages,
                    &tools,
                ).await?;
                tracing::debug!(iteration, total_tokens = ?usage.total_tokens, "completion");

                yield response.clone();

                // Let the consumer see the response before long tool calls start
                tokio::task::yield_now().await;

                let tool_requests: Vec<&ToolRequest> = response.tool_requests();
                if tool_requests.is_empty() {
                    break;
                }

                let futures: Vec<_> = tool_requests
                    .iter()
                    .map(|request| self.dispatch_tool_call(request.tool_call.clone()))
                    .collect();
                let outputs = futures::future::join_all(futures).await;

                let mut message_tool_response = Message::user();
                for (request, output) in tool_requests.iter().zip(outputs.into_iter()) {
                    if let Err(e) = &output {
                        tracing::warn!(error = %e, "tool call failed");
                    }
                    message_tool_response = message_tool_response.with_tool_response(
                        request.id.clone(),
                        output,
                    );
                }

                yield message_tool_response.clone();

                messages.push(response.clone());
                messages.push(message_tool_response);

                if iteration >= max_iterations {
                    tracing::warn!(max_iterations, "stopping tool loop at the iteration limit");
                    break;
                }
            }
        }))
    }
}
