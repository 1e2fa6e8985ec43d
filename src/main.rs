use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use filelens::cli::commands;
use filelens::cli::{CommandContext, OutputFormat};

#[derive(Parser)]
#[command(name = "filelens")]
#[command(version, about = "Progressive, cached analysis of files and directories")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Workspace root (defaults to the current directory)
    #[arg(long, short, global = true, env = "FILELENS_WORKSPACE")]
    workspace: Option<PathBuf>,

    #[arg(long, global = true)]
    verbose: bool,

    #[arg(long, short, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full tier pipeline on a file or directory
    Analyze {
        path: PathBuf,
        #[arg(long, short, help = "Ignore any cached result")]
        force: bool,
        #[arg(long, short = 'F', value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Print a fast result now; the full analysis is cached in the background
    Quick {
        path: PathBuf,
        #[arg(long, short = 'F', value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show cache statistics and backend health
    Stats {
        #[arg(long, short = 'F', value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Clear one cached result, or all of them
    Clear { path: Option<PathBuf> },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ConfigFormat {
    Toml,
    Json,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (merged from all sources)
    Show {
        #[arg(long, short = 'F', value_enum, default_value = "toml")]
        format: ConfigFormat,
    },
    /// Show configuration file paths
    Path,
    /// Write a default project configuration
    Init {
        #[arg(long, help = "Overwrite existing config")]
        force: bool,
    },
}

/// Set up panic handler for graceful error reporting
fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("\n\x1b[1;31m━━━ PANIC ━━━\x1b[0m");
        eprintln!("\x1b[31mfilelens encountered an unexpected error:\x1b[0m");
        eprintln!("  {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "\x1b[90mLocation: {}:{}:{}\x1b[0m",
                location.file(),
                location.line(),
                location.column()
            );
        }
        eprintln!();

        // Backtrace when RUST_BACKTRACE=1
        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Config init must work even when the existing config is invalid
    if let Commands::Config {
        action: ConfigAction::Init { force },
    } = &cli.command
    {
        let workspace = match cli.workspace {
            Some(dir) => dir,
            None => std::env::current_dir()?,
        };
        commands::config::init(&workspace, *force)?;
        return Ok(());
    }

    let ctx = CommandContext::load(cli.workspace)?;
    let rt = Runtime::new()?;

    match cli.command {
        Commands::Analyze {
            path,
            force,
            format,
        } => rt.block_on(commands::analyze::run(&ctx, &path, force, format))?,
        Commands::Quick { path, format } => {
            rt.block_on(commands::analyze::quick(&ctx, &path, format))?
        }
        Commands::Stats { format } => rt.block_on(commands::stats::run(&ctx, format))?,
        Commands::Clear { path } => rt.block_on(commands::clear::run(&ctx, path.as_deref()))?,
        Commands::Config { action } => match action {
            ConfigAction::Show { format } => {
                commands::config::show(&ctx, format == ConfigFormat::Json)?
            }
            ConfigAction::Path => commands::config::path(&ctx.workspace)?,
            ConfigAction::Init { .. } => {}
        },
    }

    Ok(())
}
