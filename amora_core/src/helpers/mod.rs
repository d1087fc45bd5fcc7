pub mod bot_commands;
pub mod dto;
