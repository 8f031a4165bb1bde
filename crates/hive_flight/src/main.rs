//! Binary entrypoint for running one `hive_flight` party server.
//!
//! Startup stays thin and delegates runtime orchestration to `hive_flight::run`.

use anyhow::Result;
use clap::Parser;
use hive_flight::{run, HiveFlightConfig, Party};
use tracing_subscriber::EnvFilter;

/// CLI options for one party server.
#[derive(Parser, Debug)]
#[command(name = "hive-flight", about = "Arrow Flight SQL fixture server for one Hive party")]
struct Args {
    /// Party whose fixture dataset is served.
    #[arg(long, env = "HIVE_FLIGHT_PARTY", value_enum, default_value_t = Party::Alice)]
    party: Party,

    /// Flight gRPC bind port.
    #[arg(long, env = "HIVE_FLIGHT_PORT", default_value_t = 8815)]
    port: u16,

    /// Flight gRPC bind address.
    #[arg(long, env = "HIVE_FLIGHT_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Host advertised in endpoint locations returned to clients.
    #[arg(long, env = "HIVE_FLIGHT_ADVERTISE_HOST", default_value = "localhost")]
    advertise_host: String,
}

impl From<Args> for HiveFlightConfig {
    fn from(args: Args) -> Self {
        Self {
            party: args.party,
            host: args.host,
            port: args.port,
            advertise_host: args.advertise_host,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("hive_flight=info,warn")),
        )
        .init();
    let config = HiveFlightConfig::from(Args::parse());
    run(config).await
}
