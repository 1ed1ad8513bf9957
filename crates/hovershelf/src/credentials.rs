//! Credential gate guarding every external call.
//!
//! Credentials are plain named strings held in memory for the lifetime of a session. The gate
//! reports ready only when every required one is non-empty, and otherwise produces the
//! instructions shown to the user in place of the application.

use std::collections::BTreeMap;

pub const OPENAI_KEY: &str = "openai";
pub const MULTION_KEY: &str = "multion";
pub const MEM0_KEY: &str = "mem0";

/// A credential the application cannot run without
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub key: String,
    pub label: String,
    pub purpose: String,
}

impl Requirement {
    pub fn new(key: &str, label: &str, purpose: &str) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            purpose: purpose.to_string(),
        }
    }
}

/// Named secret strings supplied by the user
#[derive(Clone, Default)]
pub struct Credentials {
    values: BTreeMap<String, String>,
}

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.set(key, value);
        self
    }

    pub fn set<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.values.insert(key.into(), value.into());
    }

    /// The value for `key`, if present and non-empty
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Credentials {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut credentials = Credentials::new();
        for (key, value) in iter {
            credentials.set(key, value);
        }
        credentials
    }
}

// Secrets never show up in logs
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.values.keys()).finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateStatus {
    Ready,
    /// Keys of the required credentials that are absent or empty
    Missing(Vec<String>),
}

impl GateStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, GateStatus::Ready)
    }
}

#[derive(Debug, Clone)]
pub struct CredentialGate {
    application: String,
    requirements: Vec<Requirement>,
}

impl CredentialGate {
    pub fn new<S: Into<String>>(application: S, requirements: Vec<Requirement>) -> Self {
        Self {
            application: application.into(),
            requirements,
        }
    }

    /// The gate for the arXiv search assistant
    pub fn arxiv() -> Self {
        Self::new(
            "ARXIV Search",
            vec![
                Requirement::new(
                    OPENAI_KEY,
                    "OpenAI API Key",
                    "Required for AI processing of search results",
                ),
                Requirement::new(
                    MULTION_KEY,
                    "MultiOn API Key",
                    "Required for web browsing capabilities",
                ),
            ],
        )
    }

    pub fn with_requirement(mut self, requirement: Requirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    pub fn check(&self, credentials: &Credentials) -> GateStatus {
        let missing: Vec<String> = self
            .requirements
            .iter()
            .filter(|requirement| credentials.get(&requirement.key).is_none())
            .map(|requirement| requirement.key.clone())
            .collect();

        if missing.is_empty() {
            GateStatus::Ready
        } else {
            GateStatus::Missing(missing)
        }
    }

    /// The message shown while the gate is closed, naming every credential and why it is needed
    pub fn instructions(&self) -> String {
        let labels: Vec<&str> = self
            .requirements
            .iter()
            .map(|requirement| requirement.label.as_str())
            .collect();

        let mut text = format!(
            "#### Configuration Required\n\nPlease enter {} to use {}.\n\n",
            join_labels(&labels),
            self.application
        );
        for requirement in &self.requirements {
            text.push_str(&format!(
                "- **{}:** {}\n",
                requirement.label, requirement.purpose
            ));
        }
        text
    }
}

fn join_labels(labels: &[&str]) -> String {
    match labels {
        [] => "the required credentials".to_string(),
        [only] => only.to_string(),
        [first, second] => format!("both {} and {}", first, second),
        [rest @ .., last] => format!("{}, and {}", rest.join(", "), last),
    }
}
