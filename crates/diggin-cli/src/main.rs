use anyhow::Result;
use clap::Parser;
use diggin_etl::Config;

mod commands;

#[derive(Debug, Parser)]
#[command(name = "diggin", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Keep albums in an in-process collection instead of Qdrant
    ///
    /// Nothing is persisted; useful for trying out the pipeline without a
    /// running Qdrant server.
    #[arg(long, global = true)]
    memory: bool,
}

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Start the ingestion scheduler
    ///
    /// After a short warm-up, sweeps every configured Last.fm tag, builds a
    /// description for each album found, embeds it with Ollama, and upserts
    /// the result into the vector collection. Sweeps repeat every
    /// `schedule.cycle_secs` until interrupted with Ctrl-C.
    ///
    /// Requires `lastfm_api_key` to be configured.
    Run,
    /// Perform a single sweep now and print its report
    Sweep,
    /// Populate the collection with the built-in starter pack
    ///
    /// Albums already stored with an unchanged description keep their
    /// vectors, so seeding twice only costs embeddings the first time.
    Seed,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, clap::Subcommand)]
enum ConfigAction {
    /// Show the current effective configuration
    Show,
    /// Print the config file path
    Path,
    /// Create the config file with commented defaults
    Init,
    /// Print one setting, or the whole config file when no key is given
    Get {
        /// Dotted key, e.g. `schedule.cycle_secs`
        key: Option<String>,
    },
    /// Change one setting in the config file
    Set {
        /// Dotted key, e.g. `schedule.cycle_secs`
        key: String,
        /// New value; lists are comma separated
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run => {
            let config = Config::load()?;
            commands::run_scheduler(&config, cli.memory).await?;
        }
        Commands::Sweep => {
            let config = Config::load()?;
            commands::run_sweep(&config, cli.memory).await?;
        }
        Commands::Seed => {
            let config = Config::load()?;
            commands::run_seed(&config, cli.memory).await?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::show_config()?,
            ConfigAction::Path => commands::config::show_path()?,
            ConfigAction::Init => commands::config::init_config()?,
            ConfigAction::Get { key } => commands::config::get_config(key)?,
            ConfigAction::Set { key, value } => commands::config::set_config(&key, &value)?,
        },
    }

    Ok(())
}
