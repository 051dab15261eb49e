mod config;
mod error;
mod server;
mod upload;

use clap::{Parser, Subcommand};
use config::Config;
use mediary_core::ReconcileOperationRequest;
use server::run_server;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "mediary")]
#[command(about = "Media asset registry over an object store and a metadata index")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Server {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.yaml")]
        config: String,
    },
    /// Diff blob keys against index records and print a JSON report
    Reconcile {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.yaml")]
        config: String,

        /// Delete orphaned blobs instead of only reporting them. Keys indexed
        /// while the sweep runs are re-checked and kept.
        #[arg(long)]
        apply: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mediary=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Server { config } => {
            tracing::info!("Starting Mediary server with config: {}", config);

            let cfg = load_config(&config);
            if let Err(e) = run_server(cfg).await {
                tracing::error!("Server error: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Reconcile { config, apply } => {
            let cfg = load_config(&config);

            let registry = match cfg.build_registry() {
                Ok(registry) => registry,
                Err(e) => {
                    tracing::error!("Failed to open stores: {}", e);
                    std::process::exit(1);
                }
            };

            let report = match registry
                .reconcile(ReconcileOperationRequest {
                    delete_orphaned_blobs: apply,
                })
                .await
            {
                Ok(report) => report,
                Err(e) => {
                    tracing::error!("Reconcile failed: {}", e);
                    std::process::exit(1);
                }
            };

            match serde_json::to_string_pretty(&report) {
                Ok(json) => println!("{}", json),
                Err(e) => {
                    tracing::error!("Failed to encode report: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }
}

fn load_config(path: &str) -> Config {
    match Config::from_file(path) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    }
}
