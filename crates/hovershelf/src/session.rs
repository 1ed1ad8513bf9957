//! The browser assistant session.
//!
//! A session starts empty and bootstraps its agent on the first command: enter the application
//! context, connect the agent's tool servers, attach a language model, and list the tools.
//! Later commands reuse the same handles. A failed bootstrap leaves the session empty so the
//! next command starts over, and no command ever returns an error to its caller; failures come
//! back as text.

use anyhow::Result;
use async_trait::async_trait;
use indoc::indoc;
use std::sync::Arc;

use crate::agent::{Agent, AgentSpec};
use crate::driver::{LlmDriver, RequestParams};
use crate::mcp::PUPPETEER_SERVER;
use crate::providers::base::Provider;
use crate::providers::configs::OpenAiProviderConfig;
use crate::providers::openai::OpenAiProvider;
use crate::systems::System;

pub const MISSING_OPENAI_KEY: &str = "Error: OpenAI API key not provided";

const BROWSER_INSTRUCTION: &str = indoc! {r#"
    You are a helpful web browsing assistant that can interact with websites using puppeteer.
    - Navigate to websites and perform browser actions (click, scroll, type)
    - Extract information from web pages
    - Take screenshots of page elements when useful
    - Provide concise summaries of web content using markdown
    - Follow multi-step browsing sequences to complete tasks

    When navigating, start with "www.lastmileai.dev" unless instructed otherwise."#};

pub fn browser_agent_spec() -> AgentSpec {
    AgentSpec::new(
        "browser",
        BROWSER_INSTRUCTION,
        vec![PUPPETEER_SERVER.to_string()],
    )
}

/// Opens named tool servers
#[async_trait]
pub trait SystemConnector: Send + Sync {
    async fn connect(&self, server_name: &str) -> Result<Box<dyn System>>;
}

/// Builds the language model a driver talks to
pub trait ProviderFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn Provider>>;
}

/// OpenAI configured from `OPENAI_*` variables, with optional overrides
#[derive(Debug, Clone, Default)]
pub struct EnvProviderFactory {
    pub host: Option<String>,
    pub model: Option<String>,
}

impl ProviderFactory for EnvProviderFactory {
    fn create(&self) -> Result<Box<dyn Provider>> {
        let mut config = OpenAiProviderConfig::from_env()?;
        if let Some(host) = &self.host {
            config = config.with_host(host.clone());
        }
        if let Some(model) = &self.model {
            config = config.with_model(model.clone());
        }
        Ok(Box::new(OpenAiProvider::new(config)?))
    }
}

/// An application: a name and the collaborators its agents are built from
#[derive(Clone)]
pub struct App {
    name: String,
    connector: Arc<dyn SystemConnector>,
    providers: Arc<dyn ProviderFactory>,
}

impl App {
    pub fn new<S: Into<String>>(
        name: S,
        connector: Arc<dyn SystemConnector>,
        providers: Arc<dyn ProviderFactory>,
    ) -> Self {
        Self {
            name: name.into(),
            connector,
            providers,
        }
    }

    /// Enter the application context. It lives as long as the returned handle.
    pub fn run(&self) -> Result<AppContext> {
        tracing::info!(app = %self.name, "entering application context");
        Ok(AppContext {
            name: self.name.clone(),
            connector: self.connector.clone(),
            providers: self.providers.clone(),
        })
    }
}

pub struct AppContext {
    name: String,
    connector: Arc<dyn SystemConnector>,
    providers: Arc<dyn ProviderFactory>,
}

impl AppContext {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn connector(&self) -> &dyn SystemConnector {
        self.connector.as_ref()
    }

    pub fn provider_factory(&self) -> &dyn ProviderFactory {
        self.providers.as_ref()
    }
}

impl Drop for AppContext {
    fn drop(&mut self) {
        tracing::debug!(app = %self.name, "leaving application context");
    }
}

struct Initialized {
    driver: LlmDriver,
    agent: Arc<Agent>,
    // Dropped last
    _context: AppContext,
}

enum SessionState {
    Uninitialized,
    Initialized(Box<Initialized>),
}

pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

pub struct BrowserSession {
    app: App,
    spec: AgentSpec,
    state: SessionState,
    env: EnvLookup,
}

impl BrowserSession {
    pub fn new(app: App) -> Self {
        Self {
            app,
            spec: browser_agent_spec(),
            state: SessionState::Uninitialized,
            env: Arc::new(|key: &str| std::env::var(key).ok()),
        }
    }

    pub fn with_spec(mut self, spec: AgentSpec) -> Self {
        self.spec = spec;
        self
    }

    pub fn with_env_lookup(mut self, env: EnvLookup) -> Self {
        self.env = env;
        self
    }

    pub fn is_initialized(&self) -> bool {
        matches!(self.state, SessionState::Initialized(_))
    }

    /// The agent once bootstrapped
    pub fn agent(&self) -> Option<&Agent> {
        match &self.state {
            SessionState::Initialized(state) => Some(state.agent.as_ref()),
            SessionState::Uninitialized => None,
        }
    }

    async fn bootstrap(&self) -> Result<Initialized> {
        let context = self.app.run()?;
        let agent = Agent::initialize(self.spec.clone(), context.connector()).await?;
        let agent = Arc::new(agent);
        let provider = context.provider_factory().create()?;
        let driver = LlmDriver::new(agent.clone(), provider);

        let tools: Vec<String> = agent.list_tools().into_iter().map(|tool| tool.name).collect();
        tracing::info!(?tools, "Tools available");

        Ok(Initialized {
            driver,
            agent,
            _context: context,
        })
    }

    async fn ensure_initialized(&mut self) -> Result<&mut Initialized> {
        if let SessionState::Uninitialized = self.state {
            let initialized = self.bootstrap().await?;
            self.state = SessionState::Initialized(Box::new(initialized));
        }
        match &mut self.state {
            SessionState::Initialized(state) => Ok(state.as_mut()),
            SessionState::Uninitialized => Err(anyhow::anyhow!("session is not initialized")),
        }
    }

    /// Run one natural-language command and return the agent's answer or an error text
    pub async fn run_command(&mut self, command: &str) -> String {
        let has_key = (self.env)("OPENAI_API_KEY").is_some_and(|key| !key.is_empty());
        if !has_key {
            return MISSING_OPENAI_KEY.to_string();
        }

        let state = match self.ensure_initialized().await {
            Ok(state) => state,
            Err(e) => {
                tracing::error!(error = %e, "browser agent initialization failed");
                return format!("Error during initialization: {:#}", e);
            }
        };

        match state
            .driver
            .generate_str(command, RequestParams::default())
            .await
        {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, "browser command failed");
                format!("Error: {:#}", e)
            }
        }
    }
}
