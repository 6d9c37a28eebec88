//! CLI module for codemax - command-line interface and subcommands.
//!
//! Provides the main entry point with subcommands for generating, repairing
//! and working with code through a local model.

pub mod commands;

pub use commands::Cli;
