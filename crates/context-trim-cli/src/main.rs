mod commands;

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use context_trim::{ContextTrimmer, TokenizerKind, TrimConfig};
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "context-trim")]
#[command(about = "Trim chat histories to a token budget")]
#[command(version)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, short, global = true, env = "CONTEXT_TRIM_CONFIG")]
    config: Option<PathBuf>,

    /// Tokenizer to count with (char, byte, bpe)
    #[arg(long, global = true, env = "CONTEXT_TRIM_TOKENIZER")]
    tokenizer: Option<TokenizerKind>,

    /// Model name used to pick the BPE encoding
    #[arg(long, global = true, env = "CONTEXT_TRIM_MODEL")]
    model: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(long, short, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Trim a JSON conversation to a token budget
    Trim {
        /// Maximum content tokens to keep (defaults to config max_tokens)
        #[arg(long, short, env = "CONTEXT_TRIM_BUDGET", allow_negative_numbers = true)]
        budget: Option<i64>,

        /// JSON array of {role, content} messages, or - for stdin
        #[arg(long, short, default_value = "-")]
        input: PathBuf,

        /// Wrap the output with a trim report
        #[arg(long, default_value_t = false)]
        report: bool,
    },
    /// Count content tokens in a JSON conversation
    Count {
        #[arg(long, short, default_value = "-")]
        input: PathBuf,
    },
    /// Validate or render task-note configs
    Notes {
        #[command(subcommand)]
        command: NotesCommand,
    },
    /// Print the contents of fenced blocks with the given tag
    Extract {
        #[arg(long, short)]
        tag: String,

        #[arg(long, short, default_value = "-")]
        input: PathBuf,
    },
    /// Remove the first <think>/<thinking> block
    StripReasoning {
        #[arg(long, short, default_value = "-")]
        input: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum NotesCommand {
    /// Check phases and placeholders against the allow-list
    Validate { file: PathBuf },
    /// Substitute placeholder values and print the notes
    Render {
        file: PathBuf,

        /// Placeholder value as key=value (repeatable)
        #[arg(long = "var", value_parser = commands::parse_var)]
        vars: Vec<(String, String)>,

        /// Only render notes attached to this phase
        #[arg(long)]
        phase: Option<String>,
    },
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_line_number(true)
                .with_file(false),
        )
        .init();
}

fn load_config(cli: &Cli) -> anyhow::Result<TrimConfig> {
    let mut config = TrimConfig::load_or_default(cli.config.as_deref())?;
    if let Some(kind) = cli.tokenizer {
        config.tokenizer = kind;
    }
    if let Some(model) = &cli.model {
        config.model = model.clone();
    }
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(&cli)?;
    tracing::debug!(tokenizer = %config.tokenizer, model = %config.model, "Resolved config");

    match cli.command {
        Commands::Trim {
            budget,
            input,
            report,
        } => {
            let trimmer = ContextTrimmer::new(config.build_tokenizer()?);
            let input = commands::read_input(&input)?;
            println!("{}", commands::trim(&trimmer, &config, &input, budget, report)?);
        }
        Commands::Count { input } => {
            let trimmer = ContextTrimmer::new(config.build_tokenizer()?);
            let input = commands::read_input(&input)?;
            println!("{}", commands::count(&trimmer, &input)?);
        }
        Commands::Notes { command } => match command {
            NotesCommand::Validate { file } => {
                let input = commands::read_input(&file)?;
                let count = commands::validate_notes(&config, &input)
                    .with_context(|| format!("{} is not a valid task-note config", file.display()))?;
                println!("{count} notes OK");
            }
            NotesCommand::Render { file, vars, phase } => {
                let input = commands::read_input(&file)?;
                println!(
                    "{}",
                    commands::render_notes(&config, &input, &vars, phase.as_deref())?
                );
            }
        },
        Commands::Extract { tag, input } => {
            let input = commands::read_input(&input)?;
            println!("{}", commands::extract(&input, &tag));
        }
        Commands::StripReasoning { input } => {
            let input = commands::read_input(&input)?;
            print!("{}", commands::strip(&input));
        }
    }

    Ok(())
}
