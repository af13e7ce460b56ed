mod config;
mod context;
mod report;
mod run;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use futures_util::StreamExt;
use humantime_serde::re::humantime;

use redraft_agent::{create_agent, AgentConfig, AgentType};
use redraft_core::{DocumentContext, LoopConfig};
use redraft_logging::{init_tracing, LogFormat, Logger};

use config::ProjectConfig;
use run::{Backends, RunSettings};

#[derive(Parser, Debug)]
#[command(
    name = "redraft",
    about = "Critique-and-refine loop for generated documents",
    version,
    author
)]
struct Cli {
    /// Documents to refine ("-" reads stdin)
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Document context file (.toml or .json)
    #[arg(short, long)]
    context: Option<PathBuf>,

    /// Override the context's document type
    #[arg(long)]
    document_type: Option<String>,

    /// Directory for refined documents (default: stdout for a single input)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Config file (default: ./redraft.toml if present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Agent to use for both critic and refiner
    #[arg(short, long, value_enum)]
    agent: Option<AgentChoice>,

    /// Agent to use specifically for the critic role
    #[arg(long, value_enum)]
    critic_agent: Option<AgentChoice>,

    /// Agent to use specifically for the refiner role
    #[arg(long, value_enum)]
    refiner_agent: Option<AgentChoice>,

    /// Model to use (if agent supports it)
    #[arg(short, long)]
    model: Option<String>,

    /// Maximum critique passes (default: 3)
    #[arg(short = 'n', long)]
    max_iterations: Option<usize>,

    /// Score at which a document is accepted (default: 0.85)
    #[arg(long)]
    quality_threshold: Option<f64>,

    /// Smallest score gain that counts as progress (default: 0.05)
    #[arg(long)]
    min_improvement: Option<f64>,

    /// Limit on each critic or refiner call, e.g. "90s"
    #[arg(long, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    /// Documents processed at once
    #[arg(short, long, default_value_t = 1)]
    jobs: usize,

    /// Log output format
    #[arg(long, value_enum, default_value = "pretty")]
    log_format: LogFormatChoice,

    /// Tracing level (RUST_LOG overrides)
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Also write daily-rolling JSON logs to this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Append loop events as JSON lines to this file
    #[arg(long)]
    event_log: Option<PathBuf>,

    /// Output final results as JSON
    #[arg(long)]
    json_output: bool,

    /// Critique each document once without refining it
    #[arg(long)]
    critique_only: bool,

    /// Do not record a session log
    #[arg(long)]
    no_session: bool,

    /// Dry run: show what would happen without executing
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AgentChoice {
    Claude,
    Opencode,
    Cursor,
    Http,
}

impl From<AgentChoice> for AgentType {
    fn from(choice: AgentChoice) -> Self {
        match choice {
            AgentChoice::Claude => AgentType::ClaudeCode,
            AgentChoice::Opencode => AgentType::OpenCode,
            AgentChoice::Cursor => AgentType::Cursor,
            AgentChoice::Http => AgentType::Http,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatChoice {
    Pretty,
    Json,
    Compact,
}

impl From<LogFormatChoice> for LogFormat {
    fn from(choice: LogFormatChoice) -> Self {
        match choice {
            LogFormatChoice::Pretty => LogFormat::Pretty,
            LogFormatChoice::Json => LogFormat::Json,
            LogFormatChoice::Compact => LogFormat::Compact,
        }
    }
}

/// Pick an agent: CLI flag > config file > Claude Code
fn resolve_agent(cli_choice: Option<AgentChoice>, configured: Option<&str>) -> Result<AgentType> {
    if let Some(choice) = cli_choice {
        return Ok(choice.into());
    }
    match configured {
        Some(name) => name
            .parse::<AgentType>()
            .map_err(|e| anyhow::anyhow!("{} in config file", e)),
        None => Ok(AgentType::ClaudeCode),
    }
}

fn resolve_loop_config(cli: &Cli, project: &ProjectConfig) -> Result<LoopConfig> {
    let mut config = project.loop_config();
    if let Some(max) = cli.max_iterations {
        config.max_iterations = max;
    }
    if let Some(threshold) = cli.quality_threshold {
        config.quality_threshold = threshold;
    }
    if let Some(min_improvement) = cli.min_improvement {
        config.min_improvement = min_improvement;
    }
    if let Some(timeout) = cli.timeout {
        config.call_timeout = Some(timeout);
    }
    config.validate().context("Invalid loop settings")?;
    Ok(config)
}

fn build_logger(cli: &Cli, format: LogFormat) -> Result<Logger> {
    match cli.event_log {
        Some(ref path) => Logger::with_file(format, path)
            .with_context(|| format!("Failed to open event log {}", path.display())),
        None => Ok(Logger::new(format)),
    }
}

fn resolve_context(cli: &Cli) -> Result<DocumentContext> {
    let mut context = match cli.context {
        Some(ref path) => context::load_context(path)?,
        None => DocumentContext::default(),
    };
    if let Some(ref document_type) = cli.document_type {
        context.document_type = document_type.clone();
    }
    Ok(context)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_format: LogFormat = cli.log_format.into();
    let log_guard = init_tracing(&cli.log_level, log_format, cli.log_dir.as_deref());

    let working_dir = std::env::current_dir().context("Failed to get current directory")?;
    let project = match cli.config {
        Some(ref path) => ProjectConfig::load_file(path)?,
        None => ProjectConfig::load(&working_dir)?.unwrap_or_default(),
    };

    let critic_type = resolve_agent(cli.critic_agent.or(cli.agent), project.critic_agent())?;
    let refiner_type = resolve_agent(cli.refiner_agent.or(cli.agent), project.refiner_agent())?;
    let critic_model = cli.model.clone().or(project.critic_model().map(String::from));
    let refiner_model = cli.model.clone().or(project.refiner_model().map(String::from));

    let loop_config = resolve_loop_config(&cli, &project)?;
    let document_context = resolve_context(&cli)?;
    let jobs = cli.jobs.max(1);

    if cli.dry_run {
        println!("=== Dry Run ===");
        for input in &cli.inputs {
            println!("Input: {}", run::input_label(input));
        }
        println!("Document type: {}", document_context.label());
        println!(
            "Critic: {}{}",
            critic_type,
            critic_model
                .as_deref()
                .map(|m| format!(" ({})", m))
                .unwrap_or_default()
        );
        println!(
            "Refiner: {}{}",
            refiner_type,
            refiner_model
                .as_deref()
                .map(|m| format!(" ({})", m))
                .unwrap_or_default()
        );
        println!("Max iterations: {}", loop_config.max_iterations);
        println!("Quality threshold: {:.2}", loop_config.quality_threshold);
        println!("Min improvement: {:.2}", loop_config.min_improvement);
        if let Some(timeout) = loop_config.call_timeout {
            println!("Call timeout: {}", humantime::format_duration(timeout));
        }
        println!("Jobs: {}", jobs);
        return Ok(());
    }

    let backend_options = project.backend_options();
    let critic = create_agent(critic_type, &backend_options)
        .with_context(|| format!("Failed to set up critic agent '{}'", critic_type))?;
    let refiner = create_agent(refiner_type, &backend_options)
        .with_context(|| format!("Failed to set up refiner agent '{}'", refiner_type))?;

    if !critic.is_available().await {
        anyhow::bail!(
            "Critic agent '{}' is not available. Make sure it's installed and in PATH.",
            critic.name()
        );
    }
    if !cli.critique_only && !refiner.is_available().await {
        anyhow::bail!(
            "Refiner agent '{}' is not available. Make sure it's installed and in PATH.",
            refiner.name()
        );
    }

    let agent_config = |model: Option<String>| {
        let mut config = AgentConfig::new(working_dir.clone());
        config.model = model;
        config.timeout = loop_config.call_timeout;
        config
    };
    let backends = Backends {
        critic,
        refiner,
        critic_config: agent_config(critic_model),
        refiner_config: agent_config(refiner_model),
    };

    let logger = build_logger(&cli, log_format)?;
    let settings = RunSettings {
        backends: &backends,
        context: &document_context,
        loop_config: &loop_config,
        logger: &logger,
        write_sessions: !cli.no_session,
    };

    if cli.critique_only {
        let mut reports: Vec<_> = futures_util::stream::iter(cli.inputs.iter().enumerate())
            .map(|(index, input)| run::critique_document(index, input, &settings))
            .buffer_unordered(jobs)
            .collect()
            .await;
        reports.sort_by_key(|r| r.index);

        if cli.json_output {
            print_json(&reports)?;
        } else {
            reports.iter().for_each(report::print_critique);
        }
        drop(log_guard);
        std::process::exit(report::critique_exit_code(&reports));
    }

    let to_stdout = cli.inputs.len() == 1 && cli.output_dir.is_none();
    let mut reports: Vec<_> = futures_util::stream::iter(cli.inputs.iter().enumerate())
        .map(|(index, input)| {
            let write_to = if to_stdout {
                None
            } else {
                Some(run::refined_path(input, cli.output_dir.as_deref()))
            };
            run::process_document(index, input, write_to, &settings)
        })
        .buffer_unordered(jobs)
        .collect()
        .await;
    reports.sort_by_key(|r| r.index);

    if cli.json_output {
        print_json(&reports)?;
    } else {
        reports.iter().for_each(report::print_report);
        if to_stdout {
            if let Some(result) = reports.first().and_then(|r| r.result.as_ref()) {
                print!("{}", result.final_text);
                if !result.final_text.ends_with('\n') {
                    println!();
                }
            }
        }
    }

    // exit() skips destructors; flush file logs first
    drop(log_guard);
    std::process::exit(report::exit_code(&reports));
}

/// One object for a single report, an array otherwise
fn print_json<T: serde::Serialize>(reports: &[T]) -> Result<()> {
    let json = match reports {
        [single] => serde_json::to_string_pretty(single)?,
        _ => serde_json::to_string_pretty(reports)?,
    };
    println!("{}", json);
    Ok(())
}
