//! CLI module for unlockr - command-line interface and subcommands.
//!
//! Provides the entry point for scheduled runs, natural-language commands,
//! schedule administration, content seeding and the daemon.

pub mod commands;

pub use commands::Cli;
