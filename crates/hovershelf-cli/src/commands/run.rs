use anyhow::Result;
use std::path::PathBuf;

use super::browse::build_session;

/// Run a single command headless and print what the agent answered
pub async fn execute(command: String, servers: Option<PathBuf>) -> Result<()> {
    let mut session = build_session(servers.as_deref())?;
    let result = session.run_command(&command).await;
    println!("{}", result);
    Ok(())
}
