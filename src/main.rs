use anyhow::Result;
use clap::{Parser, Subcommand};
use streamsentry::policy::DetectionMode;

#[derive(Parser)]
#[command(
    name = "streamsentry",
    about = "Streaming anomaly detection over keyed sliding windows",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the ingest daemon (HTTP API + in-memory window store)
    Serve {
        /// Bind address
        #[arg(long, default_value = "0.0.0.0:8080")]
        bind: String,

        /// Verdict mode: per-record or per-batch
        #[arg(long, value_enum, default_value = "point")]
        mode: DetectionMode,

        /// Window capacity per key (defaults to 7 in point mode, 5000 in batch mode)
        #[arg(long)]
        capacity: Option<usize>,
    },

    /// Print the feature vector extracted from a raw value
    Extract {
        /// Value to featurize; parsed as a number when possible,
        /// otherwise treated as text
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            bind,
            mode,
            capacity,
        } => {
            let capacity = capacity.unwrap_or(match mode {
                DetectionMode::Point => 7,
                DetectionMode::Batch => 5000,
            });
            tracing::info!(%bind, ?mode, capacity, "Starting StreamSentry daemon");
            streamsentry::serve(&bind, mode, capacity).await?;
        }
        Commands::Extract { value } => {
            let features = match value.parse::<f64>() {
                Ok(number) => streamsentry::features::extract_numeric(number),
                Err(_) => streamsentry::features::extract_text(&value),
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "value": value,
                    "features": features,
                }))?
            );
        }
    }

    Ok(())
}
