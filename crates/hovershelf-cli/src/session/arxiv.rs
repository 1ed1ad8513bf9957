use anyhow::Result;

use hovershelf::arxiv::{ArxivEndpoints, ArxivResearcher, EMPTY_QUERY_WARNING};
use hovershelf::credentials::{CredentialGate, Credentials, GateStatus};

use crate::prompt::{InputType, Prompt};

pub const ARXIV_COMMANDS: &[(&str, &str)] = &[
    ("/memories", "List what is remembered about you"),
    ("/remember <text>", "Remember something about you"),
];

/// What a line typed in the search session asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArxivCommand {
    Search(String),
    ListMemories,
    Remember(String),
}

impl ArxivCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.eq_ignore_ascii_case("/memories") {
            return ArxivCommand::ListMemories;
        }
        match line.split_once(char::is_whitespace) {
            Some((command, rest)) if command.eq_ignore_ascii_case("/remember") => {
                ArxivCommand::Remember(rest.trim().to_string())
            }
            _ if line.eq_ignore_ascii_case("/remember") => ArxivCommand::Remember(String::new()),
            _ => ArxivCommand::Search(line.to_string()),
        }
    }
}

pub struct ArxivSession<'a> {
    prompt: &'a mut dyn Prompt,
    gate: CredentialGate,
    credentials: Credentials,
    endpoints: ArxivEndpoints,
    user: Option<String>,
    researcher: Option<ArxivResearcher>,
}

impl<'a> ArxivSession<'a> {
    pub fn new(
        prompt: &'a mut dyn Prompt,
        credentials: Credentials,
        endpoints: ArxivEndpoints,
        user: Option<String>,
    ) -> Self {
        Self {
            prompt,
            gate: endpoints.gate(),
            credentials,
            endpoints,
            user,
            researcher: None,
        }
    }

    /// Use an already built researcher instead of connecting to the hosted services
    pub fn with_researcher(mut self, researcher: ArxivResearcher) -> Self {
        self.researcher = Some(researcher);
        self
    }

    pub async fn start(&mut self) -> Result<()> {
        self.prompt.render(
            "# ARXIV Search\nAI-powered research assistant with memory for academic paper discovery",
        );

        self.collect_credentials()?;
        let researcher = match self.researcher.take() {
            Some(researcher) => researcher,
            None => ArxivResearcher::connect(&self.credentials, &self.endpoints)?,
        };

        let user = match self.user.clone() {
            Some(user) => user,
            None => self.prompt.ask_text("Username", "Enter your username")?,
        };
        self.prompt.render(&format!(
            "Searching as **{}**. Type `/?` for commands.",
            if user.is_empty() { "(anonymous)" } else { user.as_str() }
        ));

        loop {
            let input = self.prompt.get_input()?;
            let line = match input.input_type {
                InputType::Exit => break,
                InputType::AskAgain => continue,
                InputType::Message => input.content.unwrap_or_default(),
            };
            self.handle(&researcher, &user, ArxivCommand::parse(&line))
                .await;
        }

        self.prompt.close();
        Ok(())
    }

    /// Ask for missing credentials until the gate opens
    fn collect_credentials(&mut self) -> Result<()> {
        loop {
            let GateStatus::Missing(keys) = self.gate.check(&self.credentials) else {
                return Ok(());
            };
            self.prompt.render(&self.gate.instructions());
            for key in keys {
                let label = self
                    .gate
                    .requirements()
                    .iter()
                    .find(|requirement| requirement.key == key)
                    .map(|requirement| requirement.label.clone())
                    .unwrap_or_else(|| key.clone());
                let value = self.prompt.ask_secret(&label)?;
                self.credentials.set(key, value);
            }
        }
    }

    async fn handle(&mut self, researcher: &ArxivResearcher, user: &str, command: ArxivCommand) {
        match command {
            ArxivCommand::Search(query) if query.is_empty() => {
                self.prompt.warn(EMPTY_QUERY_WARNING);
            }
            ArxivCommand::Search(query) => {
                self.prompt.show_busy("Searching and processing papers...");
                let outcome = researcher.search(&query, user).await;
                self.prompt.hide_busy();
                match outcome {
                    // A malformed table carries its own warning line
                    Ok(outcome) => self
                        .prompt
                        .render(&format!("---\n### Search Results\n\n{}", outcome.render())),
                    Err(e) => self.prompt.render(&format!("Error: {:#}", e)),
                }
            }
            ArxivCommand::ListMemories => match researcher.list_memories(user).await {
                Ok(listing) => self.prompt.render(&listing.to_string()),
                Err(e) => self.prompt.render(&format!("Error: {:#}", e)),
            },
            ArxivCommand::Remember(text) if text.is_empty() => {
                self.prompt.warn("Tell me what to remember, e.g. /remember I work on robotics");
            }
            ArxivCommand::Remember(text) => match researcher.remember(&text, user).await {
                Ok(created) if created.is_empty() => {
                    self.prompt.render("Nothing new to remember.")
                }
                Ok(created) => {
                    let lines: Vec<String> = created
                        .iter()
                        .map(|record| format!("- {}", record.text))
                        .collect();
                    self.prompt
                        .render(&format!("Remembered:\n{}", lines.join("\n")));
                }
                Err(e) => self.prompt.render(&format!("Error: {:#}", e)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::mock::MockPrompt;
    use crate::prompt::Input;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use hovershelf::browse::Browser;
    use hovershelf::arxiv::TABLE_SHAPE_WARNING;
    use hovershelf::credentials::{MULTION_KEY, OPENAI_KEY};
    use hovershelf::memory::{MemoryRecord, MemoryStore};
    use hovershelf::models::message::Message;
    use hovershelf::models::tool::Tool;
    use hovershelf::providers::base::{Provider, Usage};
    use std::sync::Arc;

    struct Memories(Vec<&'static str>);

    #[async_trait]
    impl MemoryStore for Memories {
        async fn search(&self, _: &str, _: &str, limit: usize) -> Result<Vec<MemoryRecord>> {
            Ok(self.0.iter().take(limit).map(|t| MemoryRecord::new(*t)).collect())
        }

        async fn get_all(&self, _: &str) -> Result<Vec<MemoryRecord>> {
            Ok(self.0.iter().map(|t| MemoryRecord::new(*t)).collect())
        }

        async fn add(&self, text: &str, _: &str) -> Result<Vec<MemoryRecord>> {
            Ok(vec![MemoryRecord::new(text)])
        }
    }

    struct EchoBrowser;

    #[async_trait]
    impl Browser for EchoBrowser {
        async fn browse(&self, cmd: &str, _url: &str) -> Result<String> {
            if cmd.contains("fail") {
                return Err(anyhow!("browsing service unavailable"));
            }
            Ok(cmd.to_string())
        }
    }

    /// Answers every request with the same one-row table
    struct TableFormatter;

    #[async_trait]
    impl Provider for TableFormatter {
        async fn complete(
            &self,
            _system: &str,
            _messages: &[Message],
            _tools: &[Tool],
        ) -> Result<(Message, Usage)> {
            let table = "| title | authors | abstract | link |\n|---|---|---|---|\n| A | B | C | D |";
            Ok((Message::assistant().with_text(table), Usage::default()))
        }
    }

    /// Answers with prose instead of a table
    struct ProseFormatter;

    #[async_trait]
    impl Provider for ProseFormatter {
        async fn complete(
            &self,
            _system: &str,
            _messages: &[Message],
            _tools: &[Tool],
        ) -> Result<(Message, Usage)> {
            Ok((
                Message::assistant().with_text("I found a few papers about robots."),
                Usage::default(),
            ))
        }
    }

    fn researcher(memories: Vec<&'static str>) -> ArxivResearcher {
        ArxivResearcher::new(
            Arc::new(Memories(memories)),
            Arc::new(EchoBrowser),
            Arc::new(TableFormatter),
        )
    }

    fn endpoints() -> ArxivEndpoints {
        ArxivEndpoints {
            memory_api_key: Some("m0".to_string()),
            ..Default::default()
        }
    }

    fn ready_credentials() -> Credentials {
        Credentials::new()
            .with(OPENAI_KEY, "sk")
            .with(MULTION_KEY, "mo")
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(ArxivCommand::parse("/memories"), ArxivCommand::ListMemories);
        assert_eq!(
            ArxivCommand::parse("/remember  I like robotics "),
            ArxivCommand::Remember("I like robotics".to_string())
        );
        assert_eq!(
            ArxivCommand::parse("/remember"),
            ArxivCommand::Remember(String::new())
        );
        assert_eq!(
            ArxivCommand::parse(" diffusion models "),
            ArxivCommand::Search("diffusion models".to_string())
        );
    }

    #[tokio::test]
    async fn test_gate_asks_for_missing_keys_before_anything_else() {
        let mut prompt = MockPrompt::new(vec![], vec!["", "sk"]);
        let mut session = ArxivSession::new(
            &mut prompt,
            Credentials::new().with(MULTION_KEY, "mo"),
            endpoints(),
            Some("ada".to_string()),
        )
        .with_researcher(researcher(vec![]));
        session.start().await.unwrap();

        // The first answer was empty, so the gate stayed closed and asked again
        assert_eq!(prompt.asked, vec!["OpenAI API Key", "OpenAI API Key"]);
        let instructions = prompt
            .rendered
            .iter()
            .filter(|r| r.contains("Configuration Required"))
            .count();
        assert_eq!(instructions, 2);
    }

    #[tokio::test]
    async fn test_search_memories_and_warnings() {
        let mut prompt = MockPrompt::new(
            vec![
                Input::message(""),
                Input::message("vision transformers"),
                Input::message("/memories"),
                Input::message("/remember I work on robotics"),
                Input::message("please fail"),
            ],
            vec![],
        );
        let mut session = ArxivSession::new(
            &mut prompt,
            ready_credentials(),
            endpoints(),
            Some("ada".to_string()),
        )
        .with_researcher(researcher(vec!["likes CV", "works in NLP"]));
        session.start().await.unwrap();

        assert_eq!(prompt.warnings, vec![EMPTY_QUERY_WARNING]);
        assert_eq!(prompt.busy.len(), 2);
        assert!(prompt.asked.is_empty());

        let shown = prompt.rendered.join("\n====\n");
        assert!(shown.contains("### Search Results\n\n| title | authors | abstract | link |"));
        assert!(shown.contains("**Stored Information:**\n1. likes CV\n2. works in NLP"));
        assert!(shown.contains("Remembered:\n- I work on robotics"));
        assert!(shown.contains("Error: browsing service unavailable"));
    }

    #[tokio::test]
    async fn test_empty_memory_listing_notice() {
        let mut prompt = MockPrompt::new(vec![Input::message("/memories")], vec!["ada"]);
        let mut session = ArxivSession::new(
            &mut prompt,
            ready_credentials(),
            endpoints(),
            None,
        )
        .with_researcher(researcher(vec![]));
        session.start().await.unwrap();

        assert_eq!(prompt.asked, vec!["Username"]);
        assert_eq!(prompt.rendered.last().unwrap(), "No memories stored yet.");
    }

    #[tokio::test]
    async fn test_malformed_table_is_flagged_once() {
        let mut prompt = MockPrompt::new(vec![Input::message("robots")], vec![]);
        let researcher = ArxivResearcher::new(
            Arc::new(Memories(vec![])),
            Arc::new(EchoBrowser),
            Arc::new(ProseFormatter),
        );
        let mut session = ArxivSession::new(
            &mut prompt,
            ready_credentials(),
            endpoints(),
            Some("ada".to_string()),
        )
        .with_researcher(researcher);
        session.start().await.unwrap();

        assert!(prompt.warnings.is_empty());
        let shown = prompt.rendered.join("\n");
        assert_eq!(shown.matches(TABLE_SHAPE_WARNING).count(), 1);
        assert!(shown.contains("I found a few papers about robots."));
    }

    #[tokio::test]
    async fn test_hosted_memory_key_is_asked_for() {
        let mut prompt = MockPrompt::new(vec![], vec!["m0"]);
        let mut session = ArxivSession::new(
            &mut prompt,
            ready_credentials(),
            ArxivEndpoints::default(),
            Some("ada".to_string()),
        )
        .with_researcher(researcher(vec![]));
        session.start().await.unwrap();

        assert_eq!(prompt.asked, vec!["Mem0 API Key"]);
        assert!(prompt
            .rendered
            .iter()
            .any(|r| r.contains("**Mem0 API Key:** Required by the hosted memory service")));
    }
}
