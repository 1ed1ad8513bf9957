use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {env_var}")]
    MissingEnvVar { env_var: String },
    #[error("Invalid server address {0}")]
    InvalidAddress(String),
    #[error("Configuration error: {0}")]
    Other(#[from] config::ConfigError),
}

/// The environment variable that sets a dotted settings key, e.g. `memory.api_key`
pub fn to_env_var(field: &str) -> String {
    format!("HOVERSHELF_{}", field.to_uppercase().replace('.', "__"))
}
