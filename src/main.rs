use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};

use phishblock::app::list_reports_use_case::ListReportsUseCase;
use phishblock::app::seed_use_case::{demo_users, SeedUseCase};
use phishblock::app::sign_in_use_case::SignInUseCase;
use phishblock::app::submit_report_use_case::SubmitReportInput;
use phishblock::config::{Config, DEFAULT_CONFIG_PATH};
use phishblock::infra::{http_from_config, pinner_from_config, storage_from_config};
use phishblock::resolver::{canonicalize, RedirectResolver};
use phishblock::server::{start_server, AppState};
use phishblock::types::{Identity, Principal};
use phishblock::{logging, metrics};

#[derive(Parser)]
#[command(name = "phishblock")]
#[command(about = "Phishing report intake with redirect capture and pinned evidence")]
#[command(version = "0.1.0")]
struct Cli {
    /// Config file (defaults to $PHISHBLOCK_CONFIG, then phishblock.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve {
        /// Port to listen on (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print the redirect chain for a URL without recording anything
    Resolve {
        url: String,
    },
    /// Sign in as the given identity and submit a report
    Submit {
        #[arg(long, default_value = "github")]
        provider: String,
        #[arg(long)]
        provider_id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: Option<String>,
        /// Suspected phishing URL
        #[arg(long)]
        url: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Show the most recent reports
    List {
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Insert demo admin and validator accounts
    Seed,
}

fn config_path(cli_path: Option<PathBuf>) -> PathBuf {
    cli_path
        .or_else(|| std::env::var("PHISHBLOCK_CONFIG").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::load(&config_path(cli.config))?;
    let _log_guard = logging::init_logging(&config.logging.dir);

    match cli.command {
        Commands::Serve { port } => {
            if let Some(addr) = config.metrics.addr {
                metrics::init_metrics(addr);
            }
            let storage = storage_from_config(&config)?;
            let http = http_from_config(&config)?;
            let pinner = pinner_from_config(&config)?;
            let state = AppState::new(storage, http, pinner, &config);

            let port = port.unwrap_or(config.server.port);
            info!(port, "Starting phishblock API");
            start_server(state, port).await?;
        }
        Commands::Resolve { url } => {
            let resolver =
                RedirectResolver::with_max_hops(http_from_config(&config)?, config.resolver.max_hops);
            let resolution = resolver.resolve(&url).await;

            println!("🔗 Redirect chain for {}:", url);
            for (i, hop) in resolution.chain.iter().enumerate() {
                println!("   {}. {}", i + 1, hop);
            }
            println!("   Final:     {}", resolution.final_url);
            println!("   Canonical: {}", canonicalize(&resolution.final_url));
        }
        Commands::Submit {
            provider,
            provider_id,
            name,
            email,
            url,
            description,
        } => {
            let mut principal = Principal::new(&provider, &provider_id, &name);
            principal.email = email;
            let identity = Identity::Authenticated(principal);

            let storage = storage_from_config(&config)?;
            SignInUseCase::new(storage.clone()).sign_in(&identity).await?;

            let state = AppState::new(
                storage,
                http_from_config(&config)?,
                pinner_from_config(&config)?,
                &config,
            );
            let mut input = SubmitReportInput::new(url);
            input.description = description.filter(|d| !d.is_empty());

            let outcome = state.submit.submit(&identity, input).await?;
            if let Some(warning) = outcome.warning() {
                warn!("{}", warning);
                println!("⚠️  {}", warning);
            }
            println!("{}", serde_json::to_string_pretty(outcome.report())?);
        }
        Commands::List { limit } => {
            let storage = storage_from_config(&config)?;
            let reports = ListReportsUseCase::with_limit(storage, limit).list().await?;
            println!("{}", serde_json::to_string_pretty(&reports)?);
        }
        Commands::Seed => {
            let storage = storage_from_config(&config)?;
            for user in SeedUseCase::new(storage).seed(demo_users()).await? {
                println!(
                    "✅ {} ({}, reputation {})",
                    user.display_name, user.external_id, user.reputation
                );
            }
        }
    }
    Ok(())
}
