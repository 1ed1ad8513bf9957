//! Memory-augmented arXiv paper search.
//!
//! A search pulls a few relevant memories for the user, folds them into the browsing command,
//! lets the browsing service read arxiv.org, and asks a chat model to reshape the raw result
//! into a markdown table of papers.

use anyhow::{bail, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::browse::{Browser, MultiOnClient, MULTION_DEFAULT_HOST};
use crate::credentials::{
    CredentialGate, Credentials, Requirement, MEM0_KEY, MULTION_KEY, OPENAI_KEY,
};
use crate::memory::{Mem0Client, Mem0Config, MemoryRecord, MemoryStore, MEM0_DEFAULT_HOST};
use crate::models::message::Message;
use crate::prompt_template::load_prompt_file;
use crate::providers::base::Provider;
use crate::providers::configs::{OpenAiProviderConfig, OPENAI_DEFAULT_HOST};
use crate::providers::openai::OpenAiProvider;

pub const ARXIV_URL: &str = "https://arxiv.org/";
pub const MEMORY_SEARCH_LIMIT: usize = 3;
pub const FORMAT_MODEL: &str = "gpt-4o-mini";
pub const FORMAT_TEMPERATURE: f32 = 0.2;

pub const EMPTY_QUERY_WARNING: &str = "Please enter a search query.";
pub const NO_MEMORIES_NOTICE: &str = "No memories stored yet.";
pub const TABLE_SHAPE_WARNING: &str =
    "The results below did not come back as the expected paper table and are shown as returned.";

const PAPER_COLUMNS: [&str; 4] = ["title", "authors", "abstract", "link"];

/// The browsing command for `query`, with the user's background appended
pub fn build_search_prompt(query: &str, memories: &[MemoryRecord]) -> String {
    let background = memories
        .iter()
        .map(|memory| memory.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "Search for arXiv papers: {}\nUser background: {}",
        query, background
    )
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paper {
    pub title: String,
    pub authors: String,
    #[serde(rename = "abstract")]
    pub summary: String,
    pub link: String,
}

pub struct PaperTable;

impl PaperTable {
    /// Parse the first markdown table in `markdown` into papers.
    ///
    /// Returns `None` unless the header names exactly the four paper columns, a separator row
    /// follows, there is at least one data row, and every data row has four cells.
    pub fn parse(markdown: &str) -> Option<Vec<Paper>> {
        let mut rows = markdown
            .lines()
            .map(str::trim)
            .skip_while(|line| !line.starts_with('|'))
            .take_while(|line| line.starts_with('|'));

        let header: Vec<String> = split_row(rows.next()?)
            .into_iter()
            .map(|cell| cell.trim_matches('*').to_lowercase())
            .collect();
        if header.len() != PAPER_COLUMNS.len() {
            return None;
        }
        let positions: Vec<usize> = PAPER_COLUMNS
            .iter()
            .map(|column| header.iter().position(|cell| cell == column))
            .collect::<Option<_>>()?;

        if !separator_row().is_match(rows.next()?) {
            return None;
        }

        let mut papers = Vec::new();
        for row in rows {
            let cells = split_row(row);
            if cells.len() != PAPER_COLUMNS.len() {
                return None;
            }
            papers.push(Paper {
                title: cells[positions[0]].clone(),
                authors: cells[positions[1]].clone(),
                summary: cells[positions[2]].clone(),
                link: cells[positions[3]].clone(),
            });
        }

        if papers.is_empty() {
            None
        } else {
            Some(papers)
        }
    }
}

fn separator_row() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\|(\s*:?-{3,}:?\s*\|)+$").expect("separator regex is valid")
    })
}

fn split_row(line: &str) -> Vec<String> {
    let inner = line.trim();
    let inner = inner.strip_prefix('|').unwrap_or(inner);
    let inner = inner.strip_suffix('|').unwrap_or(inner);
    inner.split('|').map(|cell| cell.trim().to_string()).collect()
}

/// What a search produced. The markdown is always shown; `papers` is set only when it parsed
/// as the expected table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub markdown: String,
    pub papers: Option<Vec<Paper>>,
}

impl SearchOutcome {
    pub fn from_markdown(markdown: String) -> Self {
        let papers = PaperTable::parse(&markdown);
        if papers.is_none() {
            tracing::warn!("formatted search result is not a paper table");
        }
        Self { markdown, papers }
    }

    pub fn is_well_formed(&self) -> bool {
        self.papers.is_some()
    }

    /// The text a front end displays, flagged when the shape check failed
    pub fn render(&self) -> String {
        if self.is_well_formed() {
            self.markdown.clone()
        } else {
            format!("> {}\n\n{}", TABLE_SHAPE_WARNING, self.markdown)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "entries", rename_all = "lowercase")]
pub enum MemoryListing {
    Empty,
    Entries(Vec<String>),
}

impl MemoryListing {
    pub fn from_records(records: Vec<MemoryRecord>) -> Self {
        if records.is_empty() {
            MemoryListing::Empty
        } else {
            MemoryListing::Entries(records.into_iter().map(|record| record.text).collect())
        }
    }
}

impl fmt::Display for MemoryListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryListing::Empty => write!(f, "{}", NO_MEMORIES_NOTICE),
            MemoryListing::Entries(entries) => {
                write!(f, "**Stored Information:**")?;
                for (i, entry) in entries.iter().enumerate() {
                    write!(f, "\n{}. {}", i + 1, entry)?;
                }
                Ok(())
            }
        }
    }
}

/// Service endpoints for a researcher; credentials are supplied separately
#[derive(Debug, Clone)]
pub struct ArxivEndpoints {
    pub openai_host: String,
    pub multion_host: String,
    pub memory_host: String,
    pub memory_api_key: Option<String>,
}

impl Default for ArxivEndpoints {
    fn default() -> Self {
        Self {
            openai_host: OPENAI_DEFAULT_HOST.to_string(),
            multion_host: MULTION_DEFAULT_HOST.to_string(),
            memory_host: MEM0_DEFAULT_HOST.to_string(),
            memory_api_key: None,
        }
    }
}

impl ArxivEndpoints {
    /// The hosted memory service refuses anonymous requests; self-hosted ones usually do not
    pub fn needs_memory_key(&self) -> bool {
        self.memory_api_key.is_none()
            && self.memory_host.trim_end_matches('/') == MEM0_DEFAULT_HOST
    }

    /// The credential gate for these endpoints. The memory key is asked for only when no
    /// configured key covers the hosted memory service.
    pub fn gate(&self) -> CredentialGate {
        let gate = CredentialGate::arxiv();
        if self.needs_memory_key() {
            gate.with_requirement(Requirement::new(
                MEM0_KEY,
                "Mem0 API Key",
                "Required by the hosted memory service",
            ))
        } else {
            gate
        }
    }
}

pub struct ArxivResearcher {
    memory: Arc<dyn MemoryStore>,
    browser: Arc<dyn Browser>,
    formatter: Arc<dyn Provider>,
}

impl ArxivResearcher {
    pub fn new(
        memory: Arc<dyn MemoryStore>,
        browser: Arc<dyn Browser>,
        formatter: Arc<dyn Provider>,
    ) -> Self {
        Self {
            memory,
            browser,
            formatter,
        }
    }

    /// Build the real clients. Callers check the credential gate first.
    pub fn connect(credentials: &Credentials, endpoints: &ArxivEndpoints) -> Result<Self> {
        let (Some(openai_key), Some(multion_key)) =
            (credentials.get(OPENAI_KEY), credentials.get(MULTION_KEY))
        else {
            bail!("OpenAI and MultiOn API keys are required");
        };

        let formatter = OpenAiProvider::new(
            OpenAiProviderConfig::new(openai_key)
                .with_host(endpoints.openai_host.clone())
                .with_model(FORMAT_MODEL)
                .with_temperature(FORMAT_TEMPERATURE),
        )?;
        let browser = MultiOnClient::with_host(endpoints.multion_host.clone(), multion_key)?;
        let memory_key = endpoints
            .memory_api_key
            .clone()
            .or_else(|| credentials.get(MEM0_KEY).map(String::from));
        if memory_key.is_none() && endpoints.needs_memory_key() {
            bail!(
                "The hosted memory service at {} needs an API key (MEM0_API_KEY)",
                MEM0_DEFAULT_HOST
            );
        }
        let memory = Mem0Client::new(Mem0Config::new(endpoints.memory_host.clone(), memory_key))?;

        Ok(Self::new(
            Arc::new(memory),
            Arc::new(browser),
            Arc::new(formatter),
        ))
    }

    pub async fn search(&self, query: &str, user_id: &str) -> Result<SearchOutcome> {
        if query.trim().is_empty() {
            bail!(EMPTY_QUERY_WARNING);
        }

        let memories = self
            .memory
            .search(query, user_id, MEMORY_SEARCH_LIMIT)
            .await?;
        let prompt = build_search_prompt(query, &memories);
        tracing::info!(user_id, memories = memories.len(), "searching arXiv");

        let raw = self.browser.browse(&prompt, ARXIV_URL).await?;
        let markdown = self.format_results(&raw).await?;
        Ok(SearchOutcome::from_markdown(markdown))
    }

    async fn format_results(&self, raw: &str) -> Result<String> {
        let prompt = load_prompt_file("arxiv_format.md", &json!({ "result": raw }))?;
        let (message, _usage) = self
            .formatter
            .complete("", &[Message::user().with_text(prompt)], &[])
            .await?;
        Ok(message.text())
    }

    pub async fn list_memories(&self, user_id: &str) -> Result<MemoryListing> {
        let records = self.memory.get_all(user_id).await?;
        Ok(MemoryListing::from_records(records))
    }

    pub async fn remember(&self, text: &str, user_id: &str) -> Result<Vec<MemoryRecord>> {
        self.memory.add(text, user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::GateStatus;
    use crate::providers::mock::MockProvider;
    use async_trait::async_trait;
    use indoc::indoc;
    use serial_test::serial;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeMemory {
        records: Vec<MemoryRecord>,
        searches: Mutex<Vec<(String, String, usize)>>,
        added: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl MemoryStore for FakeMemory {
        async fn search(
            &self,
            query: &str,
            user_id: &str,
            limit: usize,
        ) -> Result<Vec<MemoryRecord>> {
            self.searches
                .lock()
                .unwrap()
                .push((query.to_string(), user_id.to_string(), limit));
            Ok(self.records.iter().take(limit).cloned().collect())
        }

        async fn get_all(&self, _user_id: &str) -> Result<Vec<MemoryRecord>> {
            Ok(self.records.clone())
        }

        async fn add(&self, text: &str, user_id: &str) -> Result<Vec<MemoryRecord>> {
            self.added
                .lock()
                .unwrap()
                .push((text.to_string(), user_id.to_string()));
            Ok(vec![MemoryRecord::new(text)])
        }
    }

    struct FakeBrowser {
        reply: Result<String, String>,
        commands: Mutex<Vec<(String, String)>>,
    }

    impl FakeBrowser {
        fn replying(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                commands: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Browser for FakeBrowser {
        async fn browse(&self, cmd: &str, url: &str) -> Result<String> {
            self.commands
                .lock()
                .unwrap()
                .push((cmd.to_string(), url.to_string()));
            self.reply.clone().map_err(anyhow::Error::msg)
        }
    }

    const TABLE: &str = indoc! {"
        Here are the papers:

        | Title | Authors | Abstract | Link |
        |-------|---------|----------|------|
        | Attention Is All You Need | Vaswani et al. | Transformers. | https://arxiv.org/abs/1706.03762 |
        | ViT | Dosovitskiy et al. | Images as patches. | https://arxiv.org/abs/2010.11929 |
    "};

    #[test]
    fn test_prompt_without_memories_ends_with_empty_background() {
        let prompt = build_search_prompt("graph neural networks", &[]);
        assert_eq!(
            prompt,
            "Search for arXiv papers: graph neural networks\nUser background: "
        );
    }

    #[test]
    fn test_prompt_joins_memories_with_spaces() {
        let memories = vec![MemoryRecord::new("likes CV"), MemoryRecord::new("works in NLP")];
        let prompt = build_search_prompt("transformers", &memories);
        assert!(prompt.ends_with("User background: likes CV works in NLP"));
    }

    #[test]
    fn test_parse_valid_table() {
        let papers = PaperTable::parse(TABLE).unwrap();
        assert_eq!(papers.len(), 2);
        assert_eq!(papers[0].title, "Attention Is All You Need");
        assert_eq!(papers[1].link, "https://arxiv.org/abs/2010.11929");
    }

    #[test]
    fn test_parse_accepts_reordered_columns() {
        let table = indoc! {"
            | link | title | abstract | authors |
            | :--- | :---: | --- | ---: |
            | http://x | T | A | B |
        "};
        let papers = PaperTable::parse(table).unwrap();
        assert_eq!(papers[0].title, "T");
        assert_eq!(papers[0].authors, "B");
        assert_eq!(papers[0].summary, "A");
        assert_eq!(papers[0].link, "http://x");
    }

    #[test]
    fn test_parse_rejects_malformed_tables() {
        assert!(PaperTable::parse("No papers were found.").is_none());
        // header only
        assert!(PaperTable::parse("| title | authors | abstract | link |\n|---|---|---|---|").is_none());
        // wrong columns
        assert!(PaperTable::parse("| title | year | abstract | link |\n|---|---|---|---|\n| a | b | c | d |").is_none());
        // short row
        assert!(PaperTable::parse("| title | authors | abstract | link |\n|---|---|---|---|\n| a | b | c |").is_none());
        // no separator
        assert!(PaperTable::parse("| title | authors | abstract | link |\n| a | b | c | d |").is_none());
    }

    #[test]
    fn test_memory_listing_rendering() {
        assert_eq!(MemoryListing::from_records(vec![]).to_string(), NO_MEMORIES_NOTICE);

        let listing = MemoryListing::from_records(vec![
            MemoryRecord::new("likes CV"),
            MemoryRecord::new("works in NLP"),
        ]);
        assert_eq!(
            listing.to_string(),
            "**Stored Information:**\n1. likes CV\n2. works in NLP"
        );
    }

    #[tokio::test]
    async fn test_search_runs_memory_browse_and_format_in_order() {
        let memory = Arc::new(FakeMemory {
            records: vec![MemoryRecord::new("likes CV"), MemoryRecord::new("works in NLP")],
            ..Default::default()
        });
        let browser = Arc::new(FakeBrowser::replying("raw arxiv listing"));
        let formatter = MockProvider::new(vec![Message::assistant().with_text(TABLE)]);
        let researcher =
            ArxivResearcher::new(memory.clone(), browser.clone(), Arc::new(formatter.clone()));

        let outcome = researcher.search("vision transformers", "ada").await.unwrap();

        assert_eq!(
            memory.searches.lock().unwrap()[0],
            ("vision transformers".to_string(), "ada".to_string(), 3)
        );
        let (cmd, url) = browser.commands.lock().unwrap()[0].clone();
        assert_eq!(
            cmd,
            "Search for arXiv papers: vision transformers\nUser background: likes CV works in NLP"
        );
        assert_eq!(url, ARXIV_URL);

        let sent = formatter.received.lock().unwrap()[0].clone();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].text().contains("Search Result: raw arxiv listing"));

        assert_eq!(outcome.markdown, TABLE);
        assert!(outcome.is_well_formed());
        assert_eq!(outcome.render(), TABLE);
    }

    #[tokio::test]
    #[serial(cwd)]
    async fn test_formatter_instruction_is_fixed_regardless_of_working_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::write(
            temp_dir.path().join("arxiv_format.md"),
            "Write a poem about {{ result }}",
        )
        .unwrap();
        let previous = std::env::current_dir().unwrap();
        std::env::set_current_dir(temp_dir.path()).unwrap();

        let formatter = MockProvider::new(vec![Message::assistant().with_text(TABLE)]);
        let researcher = ArxivResearcher::new(
            Arc::new(FakeMemory::default()),
            Arc::new(FakeBrowser::replying("raw listing")),
            Arc::new(formatter.clone()),
        );
        let outcome = researcher.search("q", "u").await;
        std::env::set_current_dir(previous).unwrap();

        assert!(outcome.unwrap().is_well_formed());
        let sent = formatter.received.lock().unwrap()[0][0].text();
        assert!(sent.starts_with("Based on the following arXiv search result"));
        assert!(sent.contains("Search Result: raw listing"));
        assert!(!sent.contains("poem"));
    }

    #[tokio::test]
    async fn test_malformed_output_is_flagged_not_hidden() {
        let researcher = ArxivResearcher::new(
            Arc::new(FakeMemory::default()),
            Arc::new(FakeBrowser::replying("raw")),
            Arc::new(MockProvider::new(vec![
                Message::assistant().with_text("Sorry, nothing matched.")
            ])),
        );

        let outcome = researcher.search("q", "u").await.unwrap();
        assert!(!outcome.is_well_formed());
        let shown = outcome.render();
        assert!(shown.contains(TABLE_SHAPE_WARNING));
        assert!(shown.ends_with("Sorry, nothing matched."));
    }

    #[tokio::test]
    async fn test_browse_failure_propagates() {
        let browser = FakeBrowser {
            reply: Err("quota exhausted".to_string()),
            commands: Mutex::new(Vec::new()),
        };
        let formatter = MockProvider::new(vec![]);
        let researcher = ArxivResearcher::new(
            Arc::new(FakeMemory::default()),
            Arc::new(browser),
            Arc::new(formatter.clone()),
        );

        let err = researcher.search("q", "u").await.unwrap_err();
        assert_eq!(err.to_string(), "quota exhausted");
        assert!(formatter.received.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_query_makes_no_calls() {
        let memory = Arc::new(FakeMemory::default());
        let browser = Arc::new(FakeBrowser::replying("raw"));
        let researcher = ArxivResearcher::new(
            memory.clone(),
            browser.clone(),
            Arc::new(MockProvider::new(vec![])),
        );

        let err = researcher.search("   ", "u").await.unwrap_err();
        assert_eq!(err.to_string(), EMPTY_QUERY_WARNING);
        assert!(memory.searches.lock().unwrap().is_empty());
        assert!(browser.commands.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remember_and_list() {
        let memory = Arc::new(FakeMemory::default());
        let researcher = ArxivResearcher::new(
            memory.clone(),
            Arc::new(FakeBrowser::replying("")),
            Arc::new(MockProvider::new(vec![])),
        );

        researcher.remember("I study robotics", "ada").await.unwrap();
        assert_eq!(
            memory.added.lock().unwrap()[0],
            ("I study robotics".to_string(), "ada".to_string())
        );
        assert_eq!(
            researcher.list_memories("ada").await.unwrap(),
            MemoryListing::Empty
        );
    }

    fn self_hosted() -> ArxivEndpoints {
        ArxivEndpoints {
            memory_host: "http://localhost:8888".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_connect_requires_both_keys() {
        let credentials = Credentials::new().with(OPENAI_KEY, "sk");
        assert!(ArxivResearcher::connect(&credentials, &self_hosted()).is_err());

        let credentials = credentials.with(MULTION_KEY, "mo");
        assert!(ArxivResearcher::connect(&credentials, &self_hosted()).is_ok());
    }

    #[test]
    fn test_hosted_memory_needs_a_key_before_connecting() {
        let credentials = Credentials::new()
            .with(OPENAI_KEY, "sk")
            .with(MULTION_KEY, "mo");
        let hosted = ArxivEndpoints::default();
        let err = ArxivResearcher::connect(&credentials, &hosted)
            .err()
            .unwrap();
        assert!(err.to_string().contains("MEM0_API_KEY"));

        let credentials = credentials.with(MEM0_KEY, "m0");
        assert!(ArxivResearcher::connect(&credentials, &hosted).is_ok());

        let configured = ArxivEndpoints {
            memory_api_key: Some("m0".to_string()),
            ..Default::default()
        };
        assert!(!configured.needs_memory_key());
    }

    #[test]
    fn test_gate_asks_for_memory_key_only_for_hosted_service() {
        let hosted = ArxivEndpoints {
            memory_host: format!("{}/", MEM0_DEFAULT_HOST),
            ..Default::default()
        };
        let gate = hosted.gate();
        let keys = Credentials::new()
            .with(OPENAI_KEY, "sk")
            .with(MULTION_KEY, "mo");
        assert_eq!(
            gate.check(&keys),
            GateStatus::Missing(vec![MEM0_KEY.to_string()])
        );
        let instructions = gate.instructions();
        assert!(instructions.contains(
            "Please enter OpenAI API Key, MultiOn API Key, and Mem0 API Key to use ARXIV Search."
        ));
        assert!(instructions.contains("**Mem0 API Key:** Required by the hosted memory service"));

        assert!(self_hosted().gate().check(&keys).is_ready());
    }
}
