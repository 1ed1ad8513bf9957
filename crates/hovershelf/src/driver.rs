use anyhow::Result;
use futures::TryStreamExt;
use std::sync::Arc;

use crate::agent::Agent;
use crate::models::message::Message;
use crate::models::role::Role;
use crate::providers::base::Provider;

pub const DEFAULT_MAX_ITERATIONS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestParams {
    /// Prepend earlier turns and record this one
    pub use_history: bool,
    pub max_iterations: usize,
}

impl Default for RequestParams {
    fn default() -> Self {
        Self {
            use_history: true,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

/// A language model attached to an agent, with the conversation so far
pub struct LlmDriver {
    agent: Arc<Agent>,
    provider: Box<dyn Provider>,
    history: Vec<Message>,
}

impl LlmDriver {
    pub fn new(agent: Arc<Agent>, provider: Box<dyn Provider>) -> Self {
        Self {
            agent,
            provider,
            history: Vec::new(),
        }
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Run one turn and return every message it produced.
    ///
    /// History is only updated when the whole turn succeeds.
    pub async fn generate(&mut self, message: &str, params: RequestParams) -> Result<Vec<Message>> {
        let request = Message::user().with_text(message);
        let mut conversation = if params.use_history {
            self.history.clone()
        } else {
            Vec::new()
        };
        conversation.push(request.clone());

        let produced: Vec<Message> = self
            .agent
            .reply(self.provider.as_ref(), &conversation, params.max_iterations)
            .await?
            .try_collect()
            .await?;

        if params.use_history {
            self.history.push(request);
            self.history.extend(produced.iter().cloned());
        }
        Ok(produced)
    }

    /// Run one turn and return the assistant's text from every response, one per line
    pub async fn generate_str(&mut self, message: &str, params: RequestParams) -> Result<String> {
        let produced = self.generate(message, params).await?;
        Ok(produced
            .iter()
            .filter(|message| message.role == Role::Assistant)
            .map(Message::text)
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("\n"))
    }
}
