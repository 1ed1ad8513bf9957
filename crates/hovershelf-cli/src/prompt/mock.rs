use anyhow::{anyhow, Result};
use std::collections::VecDeque;

use super::{Input, Prompt};

/// Feeds scripted answers and records everything shown
#[derive(Default)]
pub struct MockPrompt {
    inputs: VecDeque<Input>,
    answers: VecDeque<String>,
    pub rendered: Vec<String>,
    pub warnings: Vec<String>,
    pub asked: Vec<String>,
    pub busy: Vec<String>,
}

impl MockPrompt {
    pub fn new(inputs: Vec<Input>, answers: Vec<&str>) -> Self {
        Self {
            inputs: inputs.into(),
            answers: answers.into_iter().map(String::from).collect(),
            ..Default::default()
        }
    }

    fn next_answer(&mut self, label: &str) -> Result<String> {
        self.asked.push(label.to_string());
        self.answers
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted answer for {}", label))
    }
}

impl Prompt for MockPrompt {
    fn render(&mut self, markdown: &str) {
        self.rendered.push(markdown.to_string());
    }

    fn warn(&mut self, message: &str) {
        self.warnings.push(message.to_string());
    }

    fn get_input(&mut self) -> Result<Input> {
        Ok(self.inputs.pop_front().unwrap_or_else(Input::exit))
    }

    fn ask_secret(&mut self, label: &str) -> Result<String> {
        self.next_answer(label)
    }

    fn ask_text(&mut self, label: &str, _placeholder: &str) -> Result<String> {
        self.next_answer(label)
    }

    fn show_busy(&mut self, message: &str) {
        self.busy.push(message.to_string());
    }

    fn hide_busy(&mut self) {}

    fn close(&self) {}
}
