//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - generate: run the repair loop for an instruction or a program brief
//! - instructions: draft step-by-step instructions from a brief
//! - modify / document / unit-tests: one-shot actions on a code file
//! - ask: question about the last working program
//! - last: print the last working program

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Codemax - generate code with a local model, run it, and repair it until it works
#[derive(Parser, Debug)]
#[command(name = "codemax")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a program and repair it until it runs
    Generate {
        /// What the program should do (omit when using --brief)
        #[arg(required_unless_present = "brief")]
        instruction: Option<String>,

        /// Target language (python, javascript, java, cpp, go, shell)
        #[arg(short, long)]
        language: Option<String>,

        /// Maximum number of generate/execute rounds
        #[arg(short, long)]
        rounds: Option<u32>,

        /// Draft instructions from a YAML program brief first
        #[arg(long, conflicts_with = "instruction")]
        brief: Option<PathBuf>,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Draft step-by-step instructions from a program brief
    Instructions {
        /// YAML file with context, personas, stories and instructions
        #[arg(long)]
        brief: PathBuf,
    },

    /// Rewrite a code file according to instructions
    Modify {
        /// How the code should change
        #[arg(short, long)]
        instructions: String,

        /// Code file to modify
        file: PathBuf,
    },

    /// Document a code file
    Document {
        /// Code file to document
        file: PathBuf,
    },

    /// Generate unit tests for a code file
    UnitTests {
        /// Code file to test
        file: PathBuf,
    },

    /// Ask a question about the last program that ran successfully
    Ask {
        /// The question
        question: String,
    },

    /// Show the last program that ran successfully
    Last,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_generate_with_instruction() {
        let cli = Cli::try_parse_from(["codemax", "generate", "print hello", "-l", "go", "-r", "3"]).unwrap();
        match cli.command {
            Commands::Generate {
                instruction,
                language,
                rounds,
                brief,
                json,
            } => {
                assert_eq!(instruction.as_deref(), Some("print hello"));
                assert_eq!(language.as_deref(), Some("go"));
                assert_eq!(rounds, Some(3));
                assert!(brief.is_none());
                assert!(!json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_generate_with_brief() {
        let cli = Cli::try_parse_from(["codemax", "generate", "--brief", "brief.yml", "--json"]).unwrap();
        match cli.command {
            Commands::Generate {
                instruction, brief, json, ..
            } => {
                assert!(instruction.is_none());
                assert_eq!(brief, Some(PathBuf::from("brief.yml")));
                assert!(json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_generate_requires_instruction_or_brief() {
        assert!(Cli::try_parse_from(["codemax", "generate"]).is_err());
    }

    #[test]
    fn test_generate_rejects_instruction_and_brief() {
        assert!(Cli::try_parse_from(["codemax", "generate", "x", "--brief", "b.yml"]).is_err());
    }

    #[test]
    fn test_modify_command() {
        let cli = Cli::try_parse_from(["codemax", "modify", "-i", "use a loop", "main.py"]).unwrap();
        match cli.command {
            Commands::Modify { instructions, file } => {
                assert_eq!(instructions, "use a loop");
                assert_eq!(file, PathBuf::from("main.py"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_unit_tests_command_name() {
        let cli = Cli::try_parse_from(["codemax", "unit-tests", "lib.js"]).unwrap();
        assert!(matches!(cli.command, Commands::UnitTests { .. }));
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::try_parse_from(["codemax", "last", "--verbose", "--config", "/tmp/c.yml"]).unwrap();
        assert!(cli.is_verbose());
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.yml")));
        assert!(matches!(cli.command, Commands::Last));
    }

    #[test]
    fn test_ask_command() {
        let cli = Cli::try_parse_from(["codemax", "ask", "why does it print 3?"]).unwrap();
        match cli.command {
            Commands::Ask { question } => assert_eq!(question, "why does it print 3?"),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["codemax"]).is_err());
    }
}
