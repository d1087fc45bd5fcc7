pub mod dto;
pub mod handler;
pub mod models;
pub mod prompt;
