use anyhow::Result;

pub mod cliclack;
#[cfg(test)]
pub mod mock;

pub trait Prompt {
    /// Show markdown to the user
    fn render(&mut self, markdown: &str);
    fn warn(&mut self, message: &str);
    fn get_input(&mut self) -> Result<Input>;
    /// Ask for a value that must not be echoed
    fn ask_secret(&mut self, label: &str) -> Result<String>;
    fn ask_text(&mut self, label: &str, placeholder: &str) -> Result<String>;
    fn show_busy(&mut self, message: &str);
    fn hide_busy(&mut self);
    fn close(&self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Input {
    pub input_type: InputType,
    pub content: Option<String>, // None for control commands such as Exit
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputType {
    AskAgain, // Ask the user for input again. Control flow command.
    Message,  // User sent a message
    Exit,     // User wants to exit the session
}

impl Input {
    pub fn message<S: Into<String>>(content: S) -> Self {
        Self {
            input_type: InputType::Message,
            content: Some(content.into()),
        }
    }

    pub fn exit() -> Self {
        Self {
            input_type: InputType::Exit,
            content: None,
        }
    }

    pub fn ask_again() -> Self {
        Self {
            input_type: InputType::AskAgain,
            content: None,
        }
    }
}

pub enum Theme {
    Light,
    Dark,
}
