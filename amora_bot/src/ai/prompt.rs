//! Prompt assembly: character template plus trimmed history, oldest first.

use crate::entitlements::dto::{Direction, StoredMessage};

/// Steering text used when no character is active yet; the chosen
/// free-tier persona label is substituted in.
pub fn persona_prompt(persona: &str) -> String {
    format!(
        "You are a {} AI girlfriend. Keep replies seductive, emotional, and engaging.",
        persona
    )
}

/// History entries sent to generation per request.
pub const HISTORY_WINDOW: usize = 10;

pub fn build_prompt(character_prompt: &str, history: &[StoredMessage], incoming: &str) -> String {
    let mut lines = String::new();
    for message in history {
        let speaker = match message.direction {
            Direction::FromUser => "User",
            Direction::FromBot => "Bot",
        };
        lines.push_str(speaker);
        lines.push_str(": ");
        lines.push_str(&message.text);
        lines.push('\n');
    }
    lines.push_str("User: ");
    lines.push_str(incoming);

    format!(
        "{}\n\nChat history:\n{}\n\nReply as the girlfriend:",
        character_prompt, lines
    )
}
