//! gembot CLI - run and manage the Telegram/Gemini relay bot.

#![allow(clippy::print_stdout)] // CLI program intentionally uses stdout

use clap::{Args, Parser, Subcommand};
use gembot::channels::cli::{CliChannelConfig, run_interactive};
use gembot::config::{self, BotConfig, GEMINI_API_KEY_ENV, TELEGRAM_TOKEN_ENV};
use gembot::error::{BotError, Result};
use gembot::events::{ChatKind, InboundMessage, MessageBody};
use gembot::gateway::Gateway;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// gembot - Telegram bot relaying conversations to Gemini
#[derive(Parser)]
#[command(name = "gembot")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file path
    #[arg(short, long, env = "GEMBOT_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the configuration file
    Init(InitArgs),

    /// Run the bot (Telegram channel + relay loop)
    Run(RunArgs),

    /// Chat with the bot locally, without Telegram
    Chat(ChatArgs),

    /// Show configuration and environment status
    Status,

    /// Manage configuration
    Config(ConfigArgs),
}

/// Arguments for the init command
#[derive(Args)]
struct InitArgs {
    /// Overwrite an existing configuration
    #[arg(short, long)]
    force: bool,
}

/// Arguments for the run command
#[derive(Args)]
struct RunArgs {
    /// Disable the Telegram channel
    #[arg(long)]
    no_telegram: bool,

    /// Also attach the local CLI output channel
    #[arg(long)]
    cli: bool,

    /// Model to use (overrides config)
    #[arg(short, long, env = "GEMBOT_MODEL")]
    model: Option<String>,
}

/// Arguments for the chat command
#[derive(Args)]
struct ChatArgs {
    /// Initial message to send
    #[arg(short, long)]
    message: Option<String>,

    /// Model to use (overrides config)
    #[arg(short = 'M', long, env = "GEMBOT_MODEL")]
    model: Option<String>,

    /// Conversation id for this session
    #[arg(short, long, default_value = "cli")]
    session: String,
}

/// Arguments for the config command
#[derive(Args)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the current configuration
    Show,
    /// Show the configuration file path
    Path,
    /// Validate the configuration
    Validate,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let rt = tokio::runtime::Runtime::new().expect("failed to create tokio runtime");
    match rt.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// Initialize logging with the given verbosity level.
fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "gembot={level},{}",
            if verbosity >= 2 { "debug" } else { "warn" }
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbosity >= 2)
        .init();
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init(args) => cmd_init(args).await,
        Commands::Run(args) => cmd_run(args, cli.config).await,
        Commands::Chat(args) => cmd_chat(args, cli.config).await,
        Commands::Status => cmd_status(cli.config).await,
        Commands::Config(args) => cmd_config(args, cli.config).await,
    }
}

/// Load configuration: an explicitly given path must exist; the default path
/// falls back to defaults when absent.
async fn load_bot_config(path: Option<PathBuf>) -> Result<BotConfig> {
    match path {
        Some(path) => config::load_config_from(&path)
            .await
            .map_err(BotError::Config),
        None => Ok(config::load_config().await.unwrap_or_default()),
    }
}

/// Initialize configuration.
async fn cmd_init(args: InitArgs) -> Result<()> {
    let config_file = config::config_path();

    if config_file.exists() && !args.force {
        println!("Configuration already exists at: {}", config_file.display());
        println!("Use --force to overwrite.");
        return Ok(());
    }

    let path = config::init_config().await?;
    println!("Configuration created: {}", path.display());
    println!();
    println!("Next steps:");
    println!("  1. export {TELEGRAM_TOKEN_ENV}=<token from @BotFather>");
    println!("  2. export {GEMINI_API_KEY_ENV}=<key>");
    println!("  3. gembot run");

    Ok(())
}

/// Report validation issues; returns an error when any is fatal.
fn check_config(config: &BotConfig) -> Result<()> {
    let issues = config.validate();
    for issue in &issues {
        match issue.level {
            config::IssueLevel::Error => tracing::error!("{}", issue.message),
            config::IssueLevel::Warning => tracing::warn!("{}", issue.message),
        }
    }
    if issues
        .iter()
        .any(|i| i.level == config::IssueLevel::Error)
    {
        return Err(BotError::config(
            "configuration errors prevent startup (see log above)",
        ));
    }
    Ok(())
}

/// Run the bot.
async fn cmd_run(args: RunArgs, config_path: Option<PathBuf>) -> Result<()> {
    let mut config = load_bot_config(config_path).await?;

    if let Some(model) = args.model {
        config.gemini.model = model;
    }
    if args.no_telegram {
        config.channels.telegram.enabled = false;
    }
    if args.cli {
        config.channels.cli.enabled = true;
    }

    check_config(&config)?;

    let gateway = Gateway::new(config);
    println!("gembot running. Press Ctrl+C to stop.\n");
    gateway.run().await
}

/// Chat with the bot on stdin/stdout.
async fn cmd_chat(args: ChatArgs, config_path: Option<PathBuf>) -> Result<()> {
    let mut config = load_bot_config(config_path).await?;

    if let Some(model) = args.model {
        config.gemini.model = model;
    }
    // The interactive session owns stdio; no platform channels here.
    config.channels.telegram.enabled = false;
    config.channels.cli.enabled = false;

    let gateway = Arc::new(Gateway::new(config));
    let bus = gateway.bus().clone();

    let runner = Arc::clone(&gateway);
    let gateway_handle = tokio::spawn(async move { runner.run().await });

    if let Some(message) = &args.message {
        println!("You: {message}");
        bus.publish_inbound(InboundMessage::new(
            "cli",
            "user",
            &args.session,
            ChatKind::Private,
            MessageBody::Text(message.clone()),
        ))
        .await
        .map_err(BotError::Bus)?;
    }

    println!("gembot chat | type 'exit' to quit\n");
    run_interactive(&bus, CliChannelConfig::new().session_id(&args.session)).await?;

    gateway_handle.abort();
    Ok(())
}

/// Show status.
async fn cmd_status(config_path: Option<PathBuf>) -> Result<()> {
    let config_file = config_path.unwrap_or_else(config::config_path);

    println!("gembot status\n");
    println!("Configuration:");
    println!("  Path:   {}", config_file.display());
    println!(
        "  Exists: {}",
        if config_file.exists() { "yes" } else { "no" }
    );

    if config_file.exists() {
        match config::load_config_from(&config_file).await {
            Ok(config) => {
                println!("  Valid:  yes");
                println!();
                println!("Channels:");
                println!(
                    "  Telegram: {}",
                    if config.channels.telegram.enabled {
                        "enabled"
                    } else {
                        "disabled"
                    }
                );
                println!("  Triggers: {}", config.channels.telegram.triggers.join(", "));
                println!();
                println!("Gemini:");
                println!("  Model:       {}", config.gemini.model);
                println!("  Timeout:     {}s", config.gemini.timeout_secs);
                println!();
                println!("Sessions:");
                println!("  History cap: {} turns", config.session.max_turns);
            }
            Err(e) => {
                println!("  Valid:  no ({e})");
            }
        }
    }

    println!();
    println!("Environment:");
    print_env_status(TELEGRAM_TOKEN_ENV);
    print_env_status(GEMINI_API_KEY_ENV);
    print_env_status("GEMBOT_MODEL");

    Ok(())
}

/// Configuration management.
async fn cmd_config(args: ConfigArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config_file = config_path.unwrap_or_else(config::config_path);

    match args.command {
        ConfigCommands::Path => {
            println!("{}", config_file.display());
        }
        ConfigCommands::Show => {
            if config_file.exists() {
                let content = tokio::fs::read_to_string(&config_file).await?;
                println!("{content}");
            } else {
                println!("Configuration file does not exist.");
                println!("Run 'gembot init' to create one.");
            }
        }
        ConfigCommands::Validate => {
            if !config_file.exists() {
                println!("error: configuration file does not exist");
                return Ok(());
            }
            match config::load_config_from(&config_file).await {
                Ok(config) => {
                    let issues = config.validate();
                    if issues.is_empty() {
                        println!("Configuration is valid");
                    }
                    for issue in issues {
                        let label = match issue.level {
                            config::IssueLevel::Error => "error",
                            config::IssueLevel::Warning => "warning",
                        };
                        println!("{label}: {}", issue.message);
                    }
                }
                Err(e) => println!("error: {e}"),
            }
        }
    }

    Ok(())
}

/// Print environment variable status.
fn print_env_status(name: &str) {
    let status = if std::env::var(name).is_ok() {
        "set"
    } else {
        "-"
    };
    println!("  {name}: {status}");
}
