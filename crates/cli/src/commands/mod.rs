//! CLI subcommands

pub mod fetch;
pub mod verify;
pub mod window;
