//! Subcommand implementations.

pub mod check;
pub mod info;
pub mod process;
