use anyhow::Result;

use hovershelf::session::BrowserSession;

use crate::prompt::{InputType, Prompt};

pub const EXAMPLE_COMMANDS: &[(&str, &[&str])] = &[
    ("Navigation", &["Go to wikipedia.org/wiki/computer_vision"]),
    (
        "Interactions",
        &[
            "Click on the link to object detection and take a screenshot",
            "Scroll down to view more content",
        ],
    ),
    (
        "Multi-step Tasks",
        &[
            "Navigate to wikipedia.org/wiki/computer_vision, scroll down, and report details",
            "Scroll down and summarize the wikipedia page",
        ],
    ),
];

fn example_commands() -> String {
    let mut text = String::from("### Example Commands\n");
    for (group, commands) in EXAMPLE_COMMANDS {
        text.push_str(&format!("\n**{}**\n", group));
        for command in *commands {
            text.push_str(&format!("- {}\n", command));
        }
    }
    text.push_str("\n_The agent uses Puppeteer to control a real browser._");
    text
}

pub struct BrowseSession<'a> {
    prompt: &'a mut dyn Prompt,
    session: BrowserSession,
}

impl<'a> BrowseSession<'a> {
    pub fn new(prompt: &'a mut dyn Prompt, session: BrowserSession) -> Self {
        Self { prompt, session }
    }

    pub async fn start(&mut self) -> Result<()> {
        self.prompt
            .render("# Pumpernickel\nIntelligent web browsing agent");
        self.prompt.render(&example_commands());

        loop {
            let input = self.prompt.get_input()?;
            let command = match input.input_type {
                InputType::Exit => break,
                InputType::AskAgain => continue,
                InputType::Message => input.content.unwrap_or_default(),
            };

            self.prompt.show_busy("Processing your request...");
            let result = self.session.run_command(&command).await;
            self.prompt.hide_busy();
            self.prompt.render(&format!("#### Response\n\n{}", result));
        }

        self.prompt.close();
        Ok(())
    }
}
