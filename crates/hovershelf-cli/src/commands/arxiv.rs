use anyhow::Result;

use hovershelf::arxiv::ArxivEndpoints;
use hovershelf::credentials::{Credentials, MULTION_KEY, OPENAI_KEY};

use crate::prompt::cliclack::CliclackPrompt;
use crate::session::{ArxivSession, ARXIV_COMMANDS};

pub struct ArxivArgs {
    pub user: Option<String>,
    pub openai_key: Option<String>,
    pub multion_key: Option<String>,
    pub memory_host: Option<String>,
    pub memory_key: Option<String>,
}

impl ArxivArgs {
    fn credentials(&self) -> Credentials {
        [
            (OPENAI_KEY, self.openai_key.clone()),
            (MULTION_KEY, self.multion_key.clone()),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|value| (key.to_string(), value)))
        .collect()
    }

    fn endpoints(&self) -> ArxivEndpoints {
        let mut endpoints = ArxivEndpoints {
            memory_api_key: self.memory_key.clone().filter(|key| !key.is_empty()),
            ..ArxivEndpoints::default()
        };
        if let Some(host) = &self.memory_host {
            endpoints.memory_host = host.clone();
        }
        endpoints
    }
}

pub async fn execute(args: ArxivArgs) -> Result<()> {
    let mut prompt = CliclackPrompt::new("Research query", ARXIV_COMMANDS);
    let mut session = ArxivSession::new(
        &mut prompt,
        args.credentials(),
        args.endpoints(),
        args.user.clone(),
    );
    session.start().await
}
