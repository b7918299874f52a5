pub mod commands;
pub mod extract;
