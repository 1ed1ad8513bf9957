pub mod agent;
pub mod arxiv;
pub mod browse;
pub mod credentials;
pub mod driver;
pub mod errors;
pub mod mcp;
pub mod memory;
pub mod models;
pub mod prompt_template;
pub mod providers;
pub mod session;
pub mod systems;
