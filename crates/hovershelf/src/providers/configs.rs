use anyhow::{anyhow, Result};
use std::env;

pub const OPENAI_DEFAULT_HOST: &str = "https://api.openai.com";
pub const OPENAI_DEFAULT_MODEL: &str = "gpt-4o";

#[derive(Clone)]
pub struct OpenAiProviderConfig {
    pub host: String,
    pub api_key: String,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<i32>,
}

impl OpenAiProviderConfig {
    pub fn new<S: Into<String>>(api_key: S) -> Self {
        Self {
            host: OPENAI_DEFAULT_HOST.to_string(),
            api_key: api_key.into(),
            model: OPENAI_DEFAULT_MODEL.to_string(),
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_host<S: Into<String>>(mut self, host: S) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_model<S: Into<String>>(mut self, model: S) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Load configuration from `OPENAI_API_KEY`, `OPENAI_HOST` and `OPENAI_MODEL`
    pub fn from_env() -> Result<Self> {
        let api_key = get_env("OPENAI_API_KEY", true, None)?
            .filter(|key| !key.is_empty())
            .ok_or_else(|| anyhow!("OpenAI API key should be present"))?;
        let host = get_env("OPENAI_HOST", false, Some(OPENAI_DEFAULT_HOST.to_string()))?
            .unwrap_or_else(|| OPENAI_DEFAULT_HOST.to_string());
        let model = get_env("OPENAI_MODEL", false, Some(OPENAI_DEFAULT_MODEL.to_string()))?
            .unwrap_or_else(|| OPENAI_DEFAULT_MODEL.to_string());

        Ok(Self::new(api_key).with_host(host).with_model(model))
    }
}

/// Helper to read an environment variable, failing only when a required one is absent
fn get_env(key: &str, required: bool, default: Option<String>) -> Result<Option<String>> {
    match env::var(key) {
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) if !required => Ok(default),
        Err(env::VarError::NotPresent) => Err(anyhow!(
            "Environment variable '{}' is required but not set.",
            key
        )),
        Err(e) => Err(e.into()),
    }
}
