pub mod admin;
pub mod args;
pub mod auth;
pub mod boxes;
pub mod bulk;
pub mod commands;
pub mod completions;
pub mod leases;
pub mod secrets;

pub use args::Cli;
pub use commands::{handle_command, VaultContext};
