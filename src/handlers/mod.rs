pub mod bot;
pub mod commands;
