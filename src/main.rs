use clap::Parser;
use colored::*;
use eyre::{Context, Result, eyre};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;

use codemax::domain::{GenerationRequest, LoopReport, LoopResult, TargetLanguage};
use codemax::CodemaxError;
use codemax::llm::{LlmClient, OllamaClient};
use codemax::runner::{CancelFlag, LoopEvent};
use codemax::sandbox::ProcessSandbox;
use codemax::session::{JsonlResultStore, ResultStore};
use codemax::workbench::{ProgramBrief, Workbench};

mod cli;
mod config;

use cli::Cli;
use cli::commands::Commands;
use config::Config;

type LocalWorkbench = Workbench<OllamaClient, ProcessSandbox>;

fn setup_logging(level: Option<&str>) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("codemax")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("codemax.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    // RUST_LOG wins over the configured level
    let env = env_logger::Env::default().default_filter_or(level.unwrap_or("info"));
    env_logger::Builder::from_env(env)
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn build_workbench(config: &Config) -> Result<LocalWorkbench> {
    let llm = OllamaClient::new(config.ollama_config()).context("Failed to create Ollama client")?;
    let sandbox = ProcessSandbox::new(config.sandbox_config()?);
    let store: Arc<dyn ResultStore> = Arc::new(
        JsonlResultStore::new(&config.session.store_dir).context("Failed to open session store")?,
    );
    Ok(Workbench::with_config(
        Arc::new(llm),
        Arc::new(sandbox),
        store,
        config.repair_loop_config(),
    ))
}

/// Returns false when the command ran but did not produce what was asked for
async fn run_application(cli: &Cli, config: &Config) -> Result<bool> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        Commands::Generate {
            instruction,
            language,
            rounds,
            brief,
            json,
        } => {
            let language = language.as_deref().unwrap_or(&config.repair.language);
            let max_rounds = rounds.unwrap_or(config.repair.max_rounds);
            handle_generate(cli, config, instruction.as_deref(), brief.as_deref(), language, max_rounds, *json).await
        }
        Commands::Instructions { brief } => handle_instructions(brief, config).await,
        Commands::Modify { instructions, file } => {
            let code = read_code(file)?;
            let revised = build_workbench(config)?.modify_code(instructions, &code).await?;
            println!("{}", revised);
            Ok(true)
        }
        Commands::Document { file } => {
            let code = read_code(file)?;
            println!("{}", build_workbench(config)?.document_code(&code).await?);
            Ok(true)
        }
        Commands::UnitTests { file } => {
            let code = read_code(file)?;
            println!("{}", build_workbench(config)?.unit_tests(&code).await?);
            Ok(true)
        }
        Commands::Ask { question } => {
            println!("{}", build_workbench(config)?.explain(question).await?);
            Ok(true)
        }
        Commands::Last => handle_last(config),
    }
}

async fn handle_generate(
    cli: &Cli,
    config: &Config,
    instruction: Option<&str>,
    brief: Option<&Path>,
    language: &str,
    max_rounds: u32,
    json: bool,
) -> Result<bool> {
    let target: TargetLanguage = language.parse()?;
    let (tx, rx) = mpsc::channel(32);
    let workbench = build_workbench(config)?.with_events(tx);

    let printer = if json {
        drop(rx);
        None
    } else {
        Some(tokio::spawn(print_events(rx, cli.is_verbose())))
    };

    let cancel = CancelFlag::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{}", "Interrupted, stopping after the current round...".yellow());
            on_interrupt.cancel();
        }
    });

    let report = match (brief, instruction) {
        (Some(path), _) => {
            let brief = load_brief(path)?;
            let run = workbench
                .generate_from_brief_with_cancel(&brief, target, max_rounds, &cancel)
                .await?;
            if !json {
                println!("{}\n{}\n", "Instructions:".cyan().bold(), run.instructions);
            }
            run.report
        }
        (None, Some(instruction)) => {
            let request = GenerationRequest::new(instruction, target, max_rounds)?;
            info!("Generating {} code in at most {} round(s)", target, max_rounds);
            workbench.run_with_cancel(&request, &cancel).await?
        }
        (None, None) => return Err(eyre!("Either an instruction or --brief is required")),
    };

    if cli.is_verbose() {
        let usage = workbench.llm().total_usage();
        eprintln!(
            "{} {} prompt + {} completion tokens on {}",
            "Usage:".dimmed(),
            usage.prompt_tokens,
            usage.completion_tokens,
            workbench.llm().model()
        );
    }

    // Closes the event channel so the printer finishes
    drop(workbench);
    if let Some(printer) = printer {
        let _ = printer.await;
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report).context("Failed to serialize report")?);
    } else {
        print_report(&report);
    }
    Ok(report.result.is_converged())
}

async fn handle_instructions(brief: &Path, config: &Config) -> Result<bool> {
    let brief = load_brief(brief)?;
    let instructions = build_workbench(config)?.draft_instructions(&brief).await?;
    println!("{}", instructions);
    Ok(true)
}

fn handle_last(config: &Config) -> Result<bool> {
    let store = JsonlResultStore::new(&config.session.store_dir).context("Failed to open session store")?;
    match store.get_last_success()? {
        Some(last) => {
            println!(
                "{} {} ({} round(s), {})",
                "Last success:".green().bold(),
                last.language,
                last.rounds_used,
                last.recorded_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
            if !last.instruction.is_empty() {
                println!("{} {}", "Instruction:".cyan(), last.instruction);
            }
            println!("{}\n{}", "Code:".cyan(), last.code);
            println!("{}\n{}", "Output:".cyan(), last.stdout);
            Ok(true)
        }
        None => {
            println!("{}", "No program has run successfully yet".yellow());
            Ok(false)
        }
    }
}

async fn print_events(mut rx: mpsc::Receiver<LoopEvent>, verbose: bool) {
    while let Some(event) = rx.recv().await {
        match event {
            LoopEvent::RoundStarted {
                round,
                max_rounds,
                language,
            } => {
                eprintln!("{} round {}/{} ({})", "▶".cyan(), round, max_rounds, language.label());
            }
            LoopEvent::RoundFailed { round, error_message } => {
                let first = error_message.lines().next().unwrap_or("");
                eprintln!("  {} round {} failed: {}", "✗".red(), round, first);
                if verbose {
                    for line in error_message.lines().skip(1) {
                        eprintln!("    {}", line.dimmed());
                    }
                }
            }
            LoopEvent::Converged { .. } | LoopEvent::Exhausted { .. } => {}
        }
    }
}

fn print_report(report: &LoopReport) {
    match &report.result {
        LoopResult::Converged {
            code,
            stdout,
            rounds_used,
        } => {
            println!("{} in {} round(s)", "✓ Converged".green().bold(), rounds_used);
            println!("{}\n{}", "Code:".cyan().bold(), code.trim_end());
            println!("{}\n{}", "Output:".cyan().bold(), stdout);
        }
        LoopResult::Exhausted {
            last_code,
            last_error,
            rounds_used,
        } => {
            println!(
                "{} after {} round(s) without a working program",
                "✗ Exhausted".red().bold(),
                rounds_used
            );
            for line in report.diagnostics() {
                println!("  {}", line.dimmed());
            }
            println!("{}\n{}", "Last attempt:".cyan().bold(), last_code.trim_end());
            println!("{}\n{}", "Last error:".red().bold(), last_error);
        }
    }
}

fn read_code(path: &Path) -> Result<String> {
    fs::read_to_string(path).context(format!("Failed to read {}", path.display()))
}

fn load_brief(path: &Path) -> Result<ProgramBrief> {
    let text = fs::read_to_string(path).context(format!("Failed to read brief {}", path.display()))?;
    let brief = ProgramBrief::from_yaml(&text)?;
    Ok(brief)
}

/// Whether `err` comes from a completion service that could not be reached
fn backend_unreachable(err: &eyre::Report) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<CodemaxError>(),
            Some(CodemaxError::Completion { source, .. }) if source.is_unreachable()
        )
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    // Setup logging once the configured level is known
    setup_logging(config.log_level.as_deref()).context("Failed to setup logging")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    let succeeded = match run_application(&cli, &config).await {
        Ok(succeeded) => succeeded,
        Err(e) => {
            if backend_unreachable(&e) {
                eprintln!(
                    "{} is Ollama running at {} with model '{}' pulled?",
                    "Hint:".yellow().bold(),
                    config.llm.base_url,
                    config.llm.model
                );
            }
            return Err(e.wrap_err("Application failed"));
        }
    };
    if !succeeded {
        std::process::exit(1);
    }

    Ok(())
}
