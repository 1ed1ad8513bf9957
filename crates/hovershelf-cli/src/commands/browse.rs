use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hovershelf::mcp::{McpConnector, McpServerRegistry};
use hovershelf::session::{App, BrowserSession, EnvProviderFactory};

use crate::prompt::cliclack::CliclackPrompt;
use crate::session::BrowseSession;

pub const APP_NAME: &str = "hovershelf_browser";

pub(crate) fn load_registry(servers: Option<&Path>) -> Result<McpServerRegistry> {
    match servers {
        Some(path) => McpServerRegistry::load(path)
            .with_context(|| format!("Could not load tool servers from {}", path.display())),
        None => McpServerRegistry::load_default(),
    }
}

/// A browser session wired to real tool servers and the OpenAI provider
pub(crate) fn build_session(servers: Option<&Path>) -> Result<BrowserSession> {
    let registry = load_registry(servers)?;
    let names: Vec<&str> = registry.names().collect();
    tracing::info!(servers = ?names, "tool servers configured");
    let app = App::new(
        APP_NAME,
        Arc::new(McpConnector::new(registry)),
        Arc::new(EnvProviderFactory::default()),
    );
    Ok(BrowserSession::new(app))
}

pub async fn execute(servers: Option<PathBuf>) -> Result<()> {
    let session = build_session(servers.as_deref())?;
    let mut prompt = CliclackPrompt::new("Command", &[]);
    BrowseSession::new(&mut prompt, session).start().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use hovershelf::mcp::PUPPETEER_SERVER;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_registry_from_file_keeps_puppeteer() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "servers:\n  fetch:\n    command: uvx\n    args: [mcp-server-fetch]"
        )
        .unwrap();

        let registry = load_registry(Some(file.path())).unwrap();
        assert!(registry.get(PUPPETEER_SERVER).is_some());
        assert_eq!(registry.get("fetch").unwrap().command, "uvx");
    }

    #[test]
    fn test_bad_registry_names_the_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "servers: [not, a, map]").unwrap();

        let err = load_registry(Some(file.path())).unwrap_err();
        assert!(format!("{:#}", err).contains("Could not load tool servers from"));
    }
}
