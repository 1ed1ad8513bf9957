use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

pub const PUPPETEER_SERVER: &str = "puppeteer";

/// How to launch one tool server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpServerConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Per-request limit; requests wait indefinitely when unset
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl McpServerConfig {
    pub fn new<S: Into<String>>(command: S, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            env: HashMap::new(),
            request_timeout_secs: None,
        }
    }

    pub fn puppeteer() -> Self {
        Self::new(
            "npx",
            vec![
                "-y".to_string(),
                "@modelcontextprotocol/server-puppeteer".to_string(),
            ],
        )
    }
}

#[derive(Debug, Default, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    servers: BTreeMap<String, McpServerConfig>,
}

/// Named tool-server launch configurations
#[derive(Debug, Clone, PartialEq)]
pub struct McpServerRegistry {
    servers: BTreeMap<String, McpServerConfig>,
}

impl Default for McpServerRegistry {
    fn default() -> Self {
        let mut servers = BTreeMap::new();
        servers.insert(PUPPETEER_SERVER.to_string(), McpServerConfig::puppeteer());
        Self { servers }
    }
}

impl McpServerRegistry {
    pub fn empty() -> Self {
        Self {
            servers: BTreeMap::new(),
        }
    }

    /// `$CONFIG_DIR/hovershelf/servers.yaml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("hovershelf").join("servers.yaml"))
    }

    /// The built-in servers overlaid with the entries in a YAML file, if it exists
    pub fn load(path: &Path) -> Result<Self> {
        let mut registry = Self::default();
        if !path.exists() {
            return Ok(registry);
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let file: RegistryFile = serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid server registry {}", path.display()))?;
        // Tool names are `<server>__<tool>` and split at the first `__`
        if let Some(name) = file.servers.keys().find(|name| name.contains("__")) {
            bail!(
                "Invalid server registry {}: server name '{}' must not contain '__'",
                path.display(),
                name
            );
        }
        registry.servers.extend(file.servers);
        Ok(registry)
    }

    /// Load from the default path, or fall back to the built-in servers
    pub fn load_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn insert<S: Into<String>>(&mut self, name: S, config: McpServerConfig) {
        self.servers.insert(name.into(), config);
    }

    pub fn get(&self, name: &str) -> Option<&McpServerConfig> {
        self.servers.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.servers.keys().map(String::as_str)
    }
}
