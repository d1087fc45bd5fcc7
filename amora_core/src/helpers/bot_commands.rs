use teloxide::utils::command::BotCommands;

#[derive(BotCommands, Clone)]
#[command(
    rename_rule = "lowercase",
    description = "These commands are supported:"
)]
pub enum Command {
    #[command(description = "Meet your companion and pick her vibe.")]
    Start,
    #[command(description = "Browse characters and switch who you chat with.")]
    Characters,
    #[command(description = "Unlock unlimited access.")]
    Pay,
    #[command(description = "Show your free messages, unlocks and active character.")]
    Status,
    #[command(description = "Display this text.")]
    Help,
    #[command(
        description = "Confirm a checkout-link payment: <user_id> <reference> (operator only).",
        rename = "confirmpayment"
    )]
    ConfirmPayment(String),
}

/// Dialogue state for the persona-choice conversation started by /start.
#[derive(Debug, Clone, Default)]
pub enum ChatState {
    #[default]
    Chat,
    ChoosingPersona,
}
