//! CLI entry and dispatch.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use penman_core::config;

mod commands;
mod logging;

#[derive(Parser)]
#[command(name = "penman")]
#[command(version = "0.1")]
#[command(about = "Generate and export study-abroad application documents")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Generate a document from a profile, streaming it to stdout
    Generate {
        /// Profile JSON file
        #[arg(short, long, value_name = "FILE")]
        profile: PathBuf,

        /// Document type (default from config)
        #[arg(short = 't', long = "type", value_name = "TYPE")]
        document_type: Option<String>,

        /// Where to save the generated markup (default: <output_dir>/draft.html)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Export after completion (comma-separated: pdf, docx, txt)
        #[arg(short, long, value_name = "FORMATS", value_delimiter = ',')]
        export: Vec<String>,

        /// Print raw markup while streaming instead of plain text
        #[arg(long)]
        raw: bool,
    },

    /// Export a saved document
    Export {
        /// Markup file to export
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Output format: pdf, docx or txt (default from config)
        #[arg(short, long)]
        format: Option<String>,

        /// Document type used for the file name (default from config)
        #[arg(short = 't', long = "type", value_name = "TYPE")]
        document_type: Option<String>,

        /// Output directory (default from config)
        #[arg(long, value_name = "DIR")]
        out_dir: Option<PathBuf>,

        /// Date used in the file name (YYYY-MM-DD, default today)
        #[arg(long)]
        date: Option<String>,
    },

    /// Copy a document's plain text to the clipboard
    Copy {
        /// Markup file to copy
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,
    },

    /// Print a document as plain text
    Preview {
        /// Markup file to preview
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Print the markup unchanged
        #[arg(long)]
        raw: bool,
    },

    /// Call auxiliary service endpoints
    Api {
        #[command(subcommand)]
        command: ApiCommands,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum ApiCommands {
    /// List the document types the service supports
    Types,
    /// Ask the service to validate a profile
    Validate {
        /// Profile JSON file
        #[arg(short, long, value_name = "FILE")]
        profile: PathBuf,
    },
    /// Store a generated document on the service
    Save {
        /// Markup file to store
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,
        /// Profile JSON file the document was generated from
        #[arg(short, long, value_name = "FILE")]
        profile: PathBuf,
        /// Document type (default from config)
        #[arg(short = 't', long = "type", value_name = "TYPE")]
        document_type: Option<String>,
    },
    /// List documents saved for a user
    History {
        /// The user ID
        #[arg(value_name = "USER_ID")]
        user_id: String,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
    /// Generate a fresh config from Rust defaults
    Generate,
    /// Set the default document type
    SetType {
        #[arg(value_name = "TYPE")]
        document_type: String,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let _log_guard = logging::init();

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;

    rt.block_on(async move { dispatch(cli).await })
}

async fn dispatch(cli: Cli) -> Result<()> {
    // config subcommands must work even when the file is broken
    let command = match cli.command {
        Commands::Config { command } => return config_command(command),
        other => other,
    };

    let config = config::Config::load().context("load config")?;

    match command {
        Commands::Generate {
            profile,
            document_type,
            output,
            export,
            raw,
        } => {
            commands::generate::run(commands::generate::GenerateOptions {
                profile: &profile,
                document_type: document_type.as_deref(),
                output: output.as_deref(),
                export: &export,
                raw,
                config: &config,
            })
            .await
        }

        Commands::Export {
            input,
            format,
            document_type,
            out_dir,
            date,
        } => commands::export::run(&commands::export::ExportOptions {
            input: &input,
            format: format.as_deref(),
            document_type: document_type.as_deref(),
            out_dir: out_dir.as_deref(),
            date: date.as_deref(),
            config: &config,
        }),

        Commands::Copy { input } => commands::preview::copy(&input),
        Commands::Preview { input, raw } => commands::preview::preview(&input, raw),

        Commands::Api { command } => match command {
            ApiCommands::Types => commands::api::types(&config).await,
            ApiCommands::Validate { profile } => commands::api::validate(&config, &profile).await,
            ApiCommands::Save {
                input,
                profile,
                document_type,
            } => commands::api::save(&config, &input, &profile, document_type.as_deref()).await,
            ApiCommands::History { user_id } => commands::api::history(&config, &user_id).await,
        },

        Commands::Config { .. } => unreachable!("handled above"),
    }
}

fn config_command(command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Path => {
            commands::config::path();
            Ok(())
        }
        ConfigCommands::Init => commands::config::init(),
        ConfigCommands::Generate => commands::config::generate(),
        ConfigCommands::SetType { document_type } => commands::config::set_type(&document_type),
    }
}
