pub mod dto;
pub mod gate;
pub mod handler;
