use anyhow::Result;
use clap::{Parser, Subcommand};
use focus_core::config::FocusConfig;
use focus_infrastructure::ConfigService;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "focus-cli")]
#[command(about = "Focus CLI - group study sessions with violation scoring", long_about = None)]
struct Cli {
    /// Config file (defaults to ~/.config/focus/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scripted session against an in-memory store
    Simulate {
        /// Target length in minutes
        #[arg(long, default_value_t = 25)]
        duration: u32,

        /// Open-ended session with no target
        #[arg(long)]
        marathon: bool,

        /// Additional participant ids joining by room code
        #[arg(long = "participant")]
        participants: Vec<String>,

        /// Host absences in seconds, applied in order
        #[arg(long = "absence")]
        absences: Vec<u64>,

        /// End manually this many seconds after start
        #[arg(long)]
        end_after: Option<u64>,
    },
    /// Classify an absence duration
    Classify {
        /// Absence length in seconds
        seconds: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_service = match cli.config {
        Some(path) => ConfigService::with_path(path),
        None => ConfigService::new()?,
    };
    let config = config_service.get_config().await;
    init_logging(&config);

    match cli.command {
        Commands::Simulate {
            duration,
            marathon,
            participants,
            absences,
            end_after,
        } => {
            let script = commands::simulate::Script {
                duration_minutes: duration,
                is_marathon: marathon,
                participants,
                absences,
                end_after,
            };
            commands::simulate::run(config, script).await?
        }
        Commands::Classify { seconds } => commands::classify::run(seconds)?,
    }

    Ok(())
}

fn init_logging(config: &FocusConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
