//! controlgate CLI: the operator entry point.
//!
//! Commands:
//! - `list`        List governed tools and their rules
//! - `validate`    Load every contract file and report problems
//! - `test`        Evaluate a tool output against its contract
//! - `eval`        Evaluate a single trigger condition
//! - `init`        Print the init hook output
//! - `check`       Run the post hook over a recorded conversation
//! - `config`      Show, validate, or locate the configuration
//! - `completions` Generate shell completions

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "controlgate",
    about = "controlgate: governance contracts for AI agent tool outputs",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to config.toml
    #[arg(short, long, global = true, env = "CONTROLGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// List governed tools with their rules in evaluation order
    List,

    /// Load all contract files and report any that were skipped
    Validate,

    /// Evaluate a tool output against the tool's contract
    Test {
        /// Name of the tool that produced the output
        tool: String,
        /// Tool output; parsed as JSON when possible, otherwise used as text
        output: String,
    },

    /// Evaluate one trigger condition against a value
    Eval {
        /// Boolean expression over `tool_output`
        expression: String,
        /// Value bound to `tool_output`; parsed as JSON when possible
        output: String,
    },

    /// Print the init hook output as JSON
    Init,

    /// Run the post hook over a recorded conversation (JSON file)
    Check {
        /// Path to a serialized conversation
        conversation: PathBuf,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Check the configuration for errors
    Validate,
    /// Print the config file path in use
    Path,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so command output stays machine-readable.
    let filter = if cli.verbose { "debug" } else { "info" };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr);
    match cli.log_format {
        LogFormat::Text => subscriber.init(),
        LogFormat::Json => subscriber.json().init(),
    }

    let config = cli.config.as_deref();
    match cli.command {
        Commands::List => commands::contract::list(config)?,
        Commands::Validate => commands::contract::validate(config)?,
        Commands::Test { tool, output } => commands::contract::test(config, &tool, &output)?,
        Commands::Eval { expression, output } => {
            commands::contract::eval(config, &expression, &output)?
        }
        Commands::Init => commands::hooks::init(config)?,
        Commands::Check { conversation } => commands::hooks::check(config, &conversation)?,
        Commands::Config { action } => match action.unwrap_or(ConfigAction::Show) {
            ConfigAction::Show => commands::config_cmd::show(config)?,
            ConfigAction::Validate => commands::config_cmd::validate(config)?,
            ConfigAction::Path => commands::config_cmd::path(config)?,
        },
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "controlgate", &mut std::io::stdout());
        }
    }

    Ok(())
}
