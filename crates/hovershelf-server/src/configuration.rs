use crate::error::{to_env_var, ConfigError};
use crate::state::DEFAULT_MAX_SESSIONS;
use config::{Config, Environment};
use hovershelf::arxiv::ArxivEndpoints;
use hovershelf::browse::MULTION_DEFAULT_HOST;
use hovershelf::memory::MEM0_DEFAULT_HOST;
use hovershelf::providers::configs::{OPENAI_DEFAULT_HOST, OPENAI_DEFAULT_MODEL};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Browser sessions kept alive at once
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_sessions: default_max_sessions(),
        }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let address = format!("{}:{}", self.host, self.port);
        address
            .parse()
            .map_err(|_| ConfigError::InvalidAddress(address))
    }
}

/// The language model behind the browser agent and the result formatter
#[derive(Debug, Deserialize)]
pub struct OpenAiSettings {
    #[serde(default = "default_openai_host")]
    pub host: String,
    #[serde(default = "default_model")]
    pub model: String,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            host: default_openai_host(),
            model: default_model(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MultiOnSettings {
    #[serde(default = "default_multion_host")]
    pub host: String,
}

impl Default for MultiOnSettings {
    fn default() -> Self {
        Self {
            host: default_multion_host(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MemorySettings {
    #[serde(default = "default_memory_host")]
    pub host: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            host: default_memory_host(),
            api_key: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ToolSettings {
    /// YAML registry of extra tool servers
    #[serde(default)]
    pub registry: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub openai: OpenAiSettings,
    #[serde(default)]
    pub multion: MultiOnSettings,
    #[serde(default)]
    pub memory: MemorySettings,
    #[serde(default)]
    pub tools: ToolSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load_and_validate()
    }

    /// Hosts for the arXiv researcher. API keys for OpenAI and MultiOn come with each request.
    pub fn arxiv_endpoints(&self) -> ArxivEndpoints {
        ArxivEndpoints {
            openai_host: self.openai.host.clone(),
            multion_host: self.multion.host.clone(),
            memory_host: self.memory.host.clone(),
            memory_api_key: self.memory.api_key.clone().filter(|key| !key.is_empty()),
        }
    }

    fn load_and_validate() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?
            .set_default("server.max_sessions", default_max_sessions() as u64)?
            .set_default("openai.host", default_openai_host())?
            .set_default("openai.model", default_model())?
            .set_default("multion.host", default_multion_host())?
            .set_default("memory.host", default_memory_host())?
            .add_source(
                Environment::with_prefix("HOVERSHELF")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        match config.try_deserialize::<Self>() {
            Ok(settings) => Ok(settings),
            Err(err) => {
                tracing::debug!("Configuration error: {:?}", &err);

                let error_str = err.to_string();
                if error_str.starts_with("missing field") {
                    let field = error_str
                        .trim_start_matches("missing field `")
                        .trim_end_matches('`');
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    })
                } else if let config::ConfigError::NotFound(field) = &err {
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    })
                } else {
                    Err(ConfigError::Other(err))
                }
            }
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_max_sessions() -> usize {
    DEFAULT_MAX_SESSIONS
}

fn default_model() -> String {
    OPENAI_DEFAULT_MODEL.to_string()
}

fn default_openai_host() -> String {
    OPENAI_DEFAULT_HOST.to_string()
}

fn default_multion_host() -> String {
    MULTION_DEFAULT_HOST.to_string()
}

fn default_memory_host() -> String {
    MEM0_DEFAULT_HOST.to_string()
}
