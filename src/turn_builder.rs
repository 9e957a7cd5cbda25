//! Message assembly for the next turn
//!
//! The prompt template is fixed per process: one system instruction carrying
//! the content rules and a style band, one scenario message, the prior turns,
//! then the stance for whichever provider speaks next.

use crate::llm::{ChatMessage, Provider};
use crate::session::Turn;
use std::fmt::Write;

/// Reply that tells the loop to halt the session
pub const STOP_SENTINEL: &str = "STOP_SESSION";

const DEFAULT_SCENARIO: &str = "Topic: Nazi Germany (1933-1945). An informal conversation between two \
acquaintances: how the story was sold, propaganda, political maneuvering, complicity, \
the war economy, persecution and its consequences. Keep it close and conversational, \
direct, with concrete examples, without lecturing.";

const CONTENT_RULES: &str = "Informal conversation between two acquaintances. \
Never glorify, justify or spread propaganda for Nazism. \
Do not use its symbols or slogans. Do not deny or downplay its crimes. \
If misinformation or apologia appears, correct it and steer the conversation back.";

const FORMAT_RULES: &str = "Reply ONLY with the text of your turn, without speaker prefixes such as 'OLLAMA:' or 'OPENAI:'. \
Format: 1-3 short sentences per turn, at most about 350 characters.";

/// Style band derived from the aggression level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleBand {
    Calm,
    Firm,
    Intense,
}

impl StyleBand {
    pub fn from_aggression(level: f32) -> Self {
        if level < 0.34 {
            StyleBand::Calm
        } else if level < 0.67 {
            StyleBand::Firm
        } else {
            StyleBand::Intense
        }
    }

    fn clause(self) -> &'static str {
        match self {
            StyleBand::Calm => "Calm tone, little confrontation.",
            StyleBand::Firm => "Firm tone, direct counterarguments.",
            StyleBand::Intense => {
                "Intense tone: take fallacies apart quickly and with punch, but never with personal insults."
            }
        }
    }
}

fn role_instruction(provider: Provider) -> &'static str {
    match provider {
        Provider::Ollama => {
            "Role: street-level political analyst. Point out maneuvers, incentives, propaganda, pacts and power games. Brief and to the point."
        }
        Provider::OpenAI => {
            "Role: critical historian. Ground the discussion, add context, dismantle myths and point out the human consequences. Brief and to the point."
        }
    }
}

/// Builds the message list sent to a provider
#[derive(Debug, Clone)]
pub struct TurnBuilder {
    scenario: String,
}

impl Default for TurnBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_SCENARIO)
    }
}

impl TurnBuilder {
    pub fn new(scenario: impl Into<String>) -> Self {
        Self {
            scenario: scenario.into(),
        }
    }

    /// Scenario from `CROSSTALK_SCENARIO`, else the built-in one
    pub fn from_env() -> Self {
        std::env::var("CROSSTALK_SCENARIO")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map_or_else(Self::default, Self::new)
    }

    pub fn scenario(&self) -> &str {
        &self.scenario
    }

    /// Assemble the messages for `provider`'s next turn.
    ///
    /// Prior turns are all mapped to the assistant role regardless of which
    /// provider produced them.
    pub fn build(&self, provider: Provider, history: &[Turn], aggression: f32) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(history.len() + 3);
        messages.push(ChatMessage::system(system_instruction(aggression)));
        messages.push(ChatMessage::user(self.scenario.as_str()));
        messages.extend(
            history
                .iter()
                .map(|turn| ChatMessage::assistant(turn.full_text())),
        );
        messages.push(ChatMessage::user(role_instruction(provider)));
        messages
    }
}

fn system_instruction(aggression: f32) -> String {
    let mut prompt = String::from(CONTENT_RULES);
    let _ = write!(
        prompt,
        " If you cannot continue safely, reply exactly: {STOP_SENTINEL}. {FORMAT_RULES} {}",
        StyleBand::from_aggression(aggression).clause()
    );
    prompt
}
