use std::io::{self, Write};

use anyhow::Result;
use bat::WrappingMode;
use cliclack::{input, password, spinner};
use console::style;

use super::{Input, Prompt, Theme};

pub struct CliclackPrompt {
    spinner: Option<cliclack::ProgressBar>,
    label: String,
    commands: Vec<(String, String)>,
    theme: Theme,
}

impl CliclackPrompt {
    /// `commands` are extra slash commands the session understands, listed by `/?`
    pub fn new<S: Into<String>>(label: S, commands: &[(&str, &str)]) -> Self {
        CliclackPrompt {
            spinner: None,
            label: label.into(),
            commands: commands
                .iter()
                .map(|(name, help)| (name.to_string(), help.to_string()))
                .collect(),
            theme: Theme::Dark,
        }
    }

    fn theme_name(&self) -> &'static str {
        match self.theme {
            Theme::Light => "GitHub",
            Theme::Dark => "zenburn",
        }
    }

    fn print_help(&self) {
        println!("Commands:");
        for (name, help) in &self.commands {
            println!("{} - {}", name, help);
        }
        println!("/t - Toggle Light/Dark theme");
        println!("/exit - Exit the session");
        println!("/? - Display this help message");
    }
}

fn print(content: &str, theme: &str) {
    let printed = bat::PrettyPrinter::new()
        .input(bat::Input::from_bytes(content.as_bytes()))
        .theme(theme)
        .language("Markdown")
        .wrapping_mode(WrappingMode::Character)
        .print();
    if printed.is_err() {
        println!("{}", content);
    }
}

impl Prompt for CliclackPrompt {
    fn render(&mut self, markdown: &str) {
        print(markdown, self.theme_name());
        println!();
        let _ = io::stdout().flush();
    }

    fn warn(&mut self, message: &str) {
        if cliclack::log::warning(message).is_err() {
            eprintln!("{}", style(message).yellow());
        }
    }

    fn get_input(&mut self) -> Result<Input> {
        let message_text: String = input(&self.label)
            .placeholder("")
            .required(false)
            .interact()?;
        let message_text = message_text.trim();

        if message_text.eq_ignore_ascii_case("/exit") || message_text.eq_ignore_ascii_case("/quit")
        {
            Ok(Input::exit())
        } else if message_text.eq_ignore_ascii_case("/t") {
            self.theme = match self.theme {
                Theme::Light => {
                    println!("Switching to Dark theme");
                    Theme::Dark
                }
                Theme::Dark => {
                    println!("Switching to Light theme");
                    Theme::Light
                }
            };
            Ok(Input::ask_again())
        } else if message_text == "/?" {
            self.print_help();
            Ok(Input::ask_again())
        } else {
            Ok(Input::message(message_text))
        }
    }

    fn ask_secret(&mut self, label: &str) -> Result<String> {
        let value: String = password(label).mask('▪').interact()?;
        Ok(value.trim().to_string())
    }

    fn ask_text(&mut self, label: &str, placeholder: &str) -> Result<String> {
        let value: String = input(label)
            .placeholder(placeholder)
            .required(false)
            .interact()?;
        Ok(value.trim().to_string())
    }

    fn show_busy(&mut self, message: &str) {
        let spin = spinner();
        spin.start(message);
        self.spinner = Some(spin);
    }

    fn hide_busy(&mut self) {
        if let Some(spin) = self.spinner.take() {
            spin.stop("");
        }
    }

    fn close(&self) {
        println!("{}", style("Goodbye.").dim());
    }
}
