use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::prelude::Dialogue;

use amora_core::helpers::bot_commands::ChatState;

pub mod answers;
pub mod handler;
pub mod handler_tree;

pub type ChatDialogue = Dialogue<ChatState, InMemStorage<ChatState>>;
