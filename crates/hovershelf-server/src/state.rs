use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use hovershelf::arxiv::{ArxivEndpoints, ArxivResearcher};
use hovershelf::credentials::{CredentialGate, Credentials};
use hovershelf::mcp::{McpConnector, McpServerRegistry};
use hovershelf::session::{App, BrowserSession, EnvProviderFactory};

use crate::configuration::Settings;

pub const APP_NAME: &str = "hovershelfd_browser";
pub const DEFAULT_MAX_SESSIONS: usize = 8;

pub type ResearcherBuilder = Arc<dyn Fn(&Credentials) -> Result<ArxivResearcher> + Send + Sync>;
pub type SessionBuilder = Arc<dyn Fn() -> BrowserSession + Send + Sync>;

struct SessionSlot {
    session: Arc<Mutex<BrowserSession>>,
    last_used: u64,
}

/// Live browser sessions by id, at most `max` of them
struct SessionTable {
    slots: HashMap<String, SessionSlot>,
    clock: u64,
    max: usize,
}

impl SessionTable {
    fn new(max: usize) -> Self {
        Self {
            slots: HashMap::new(),
            clock: 0,
            max: max.max(1),
        }
    }

    fn get_or_create(
        &mut self,
        id: &str,
        create: impl FnOnce() -> BrowserSession,
    ) -> Arc<Mutex<BrowserSession>> {
        self.clock += 1;
        let now = self.clock;
        if let Some(slot) = self.slots.get_mut(id) {
            slot.last_used = now;
            return slot.session.clone();
        }

        if self.slots.len() >= self.max {
            self.evict_least_recent();
        }
        tracing::info!(session = id, "new browser session");
        let session = Arc::new(Mutex::new(create()));
        self.slots.insert(
            id.to_string(),
            SessionSlot {
                session: session.clone(),
                last_used: now,
            },
        );
        session
    }

    /// Dropping the session stops its tool servers once no request still holds it
    fn evict_least_recent(&mut self) {
        let oldest = self
            .slots
            .iter()
            .min_by_key(|(_, slot)| slot.last_used)
            .map(|(id, _)| id.clone());
        if let Some(id) = oldest {
            tracing::info!(session = %id, "evicting browser session");
            self.slots.remove(&id);
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    researchers: ResearcherBuilder,
    sessions: SessionBuilder,
    gate: CredentialGate,
    browser_sessions: Arc<Mutex<SessionTable>>,
}

impl AppState {
    pub fn new(researchers: ResearcherBuilder, sessions: SessionBuilder) -> Self {
        Self {
            researchers,
            sessions,
            gate: CredentialGate::arxiv(),
            browser_sessions: Arc::new(Mutex::new(SessionTable::new(DEFAULT_MAX_SESSIONS))),
        }
    }

    pub fn with_gate(mut self, gate: CredentialGate) -> Self {
        self.gate = gate;
        self
    }

    /// Cap the number of live browser sessions; the least recently used one makes room
    pub fn with_max_sessions(mut self, max: usize) -> Self {
        self.browser_sessions = Arc::new(Mutex::new(SessionTable::new(max)));
        self
    }

    /// State wired to the hosted services and real tool servers
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let endpoints: ArxivEndpoints = settings.arxiv_endpoints();
        let gate = endpoints.gate();
        let registry = match &settings.tools.registry {
            Some(path) => McpServerRegistry::load(path)?,
            None => McpServerRegistry::load_default()?,
        };
        let providers = EnvProviderFactory {
            host: Some(settings.openai.host.clone()),
            model: Some(settings.openai.model.clone()),
        };

        let researchers: ResearcherBuilder = Arc::new(move |credentials: &Credentials| {
            ArxivResearcher::connect(credentials, &endpoints)
        });
        let sessions: SessionBuilder = Arc::new(move || {
            BrowserSession::new(App::new(
                APP_NAME,
                Arc::new(McpConnector::new(registry.clone())),
                Arc::new(providers.clone()),
            ))
        });
        Ok(Self::new(researchers, sessions)
            .with_gate(gate)
            .with_max_sessions(settings.server.max_sessions))
    }

    /// The credentials each arXiv request has to carry
    pub fn gate(&self) -> &CredentialGate {
        &self.gate
    }

    pub fn researcher(&self, credentials: &Credentials) -> Result<ArxivResearcher> {
        (self.researchers)(credentials)
    }

    /// The browser session for an id, created empty on first use
    pub async fn browser_session(&self, id: &str) -> Arc<Mutex<BrowserSession>> {
        let mut table = self.browser_sessions.lock().await;
        table.get_or_create(id, || (self.sessions)())
    }

    #[cfg(test)]
    pub async fn session_ids(&self) -> Vec<String> {
        let table = self.browser_sessions.lock().await;
        let mut ids: Vec<String> = table.slots.keys().cloned().collect();
        ids.sort();
        ids
    }
}
