//! Arrow Flight SQL fixture server that stands in for one Hive party.
//!
//! A single process hosts:
//! - a DataFusion engine seeded with the party's fixture table,
//! - a ticket registry linking `GetFlightInfo` plans to `DoGet` retrievals,
//! - an Arrow Flight gRPC server exposing both, plus catalog and health calls.
//!
//! This module is the composition root: it parses configuration, binds the
//! listener, and runs the gRPC server until shutdown.

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow_flight::flight_service_server::FlightServiceServer;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tracing::{info, warn};

pub mod backend;
pub mod error;
pub mod frontend;
pub mod party;
pub mod service;
pub mod tickets;
pub mod wire;

pub use frontend::{CommandDescriptor, QueryFrontEnd};
pub use party::Party;
pub use service::HiveFlightService;

const DEFAULT_PORT: u16 = 8815;
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_ADVERTISE_HOST: &str = "localhost";

/// Runtime configuration for one fixture server process.
#[derive(Clone, Debug)]
pub struct HiveFlightConfig {
    /// Party whose fixture dataset is served.
    pub party: Party,
    /// Bind address for the Flight gRPC listener.
    pub host: String,
    /// Bind port for the Flight gRPC listener.
    pub port: u16,
    /// Host written into endpoint locations returned by planning.
    pub advertise_host: String,
}

impl Default for HiveFlightConfig {
    fn default() -> Self {
        Self {
            party: Party::Alice,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            advertise_host: DEFAULT_ADVERTISE_HOST.to_string(),
        }
    }
}

impl HiveFlightConfig {
    /// Loads configuration from environment variables with defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let party = match lookup("HIVE_FLIGHT_PARTY") {
            Some(raw) => raw
                .parse::<Party>()
                .context("invalid HIVE_FLIGHT_PARTY")?,
            None => Party::Alice,
        };
        let host = lookup("HIVE_FLIGHT_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = parse_port(lookup("HIVE_FLIGHT_PORT"), DEFAULT_PORT)?;
        let advertise_host = lookup("HIVE_FLIGHT_ADVERTISE_HOST")
            .unwrap_or_else(|| DEFAULT_ADVERTISE_HOST.to_string());
        Ok(Self {
            party,
            host,
            port,
            advertise_host,
        })
    }
}

/// Runs the server until Ctrl-C is received.
pub async fn run(config: HiveFlightConfig) -> Result<()> {
    run_with_shutdown(config, tokio::signal::ctrl_c()).await
}

/// Binds the configured address and serves until `shutdown` resolves.
pub async fn run_with_shutdown<F>(config: HiveFlightConfig, shutdown: F) -> Result<()>
where
    F: Future<Output = Result<(), std::io::Error>> + Send,
{
    let listener = TcpListener::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("bind flight server {}:{}", config.host, config.port))?;
    serve(config, listener, async move {
        if let Err(err) = shutdown.await {
            warn!(error = %err, "shutdown signal failed; stopping server");
        }
    })
    .await
}

/// Serves the Flight endpoint on an already bound listener.
///
/// The advertised location uses the listener's actual port, so binding port 0
/// works for tests.
pub async fn serve<F>(config: HiveFlightConfig, listener: TcpListener, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send,
{
    let local_addr = listener
        .local_addr()
        .context("read flight listener address")?;
    let location = format!("grpc+tcp://{}:{}", config.advertise_host, local_addr.port());
    let front_end = QueryFrontEnd::bootstrap(config.party, location.clone())
        .with_context(|| format!("seed fixture dataset for {}", config.party))?;
    let service = HiveFlightService::new(Arc::new(front_end));

    info!(
        party = %config.party,
        addr = %local_addr,
        location = %location,
        "flight server listening"
    );
    Server::builder()
        .add_service(FlightServiceServer::new(service))
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown)
        .await
        .context("serve flight rpc")?;
    info!(party = %config.party, "flight server stopped");
    Ok(())
}

/// Parses an optional port override with fallback default.
fn parse_port(value: Option<String>, default_port: u16) -> Result<u16> {
    match value {
        Some(raw) => raw
            .parse::<u16>()
            .with_context(|| format!("invalid port value: {raw}")),
        None => Ok(default_port),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_port_uses_default_when_absent() {
        assert_eq!(parse_port(None, 8815).unwrap(), 8815);
        assert_eq!(parse_port(Some("8816".to_string()), 8815).unwrap(), 8816);
        assert!(parse_port(Some("eighty".to_string()), 8815).is_err());
    }

    fn lookup_from<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key: &str| {
            vars.iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| value.to_string())
        }
    }

    #[test]
    fn env_overrides_are_applied() {
        let config = HiveFlightConfig::from_lookup(lookup_from(&[
            ("HIVE_FLIGHT_PARTY", "bob"),
            ("HIVE_FLIGHT_PORT", "9001"),
            ("HIVE_FLIGHT_ADVERTISE_HOST", "hive-bob"),
        ]))
        .unwrap();
        assert_eq!(config.party, Party::Bob);
        assert_eq!(config.port, 9001);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.advertise_host, "hive-bob");

        let defaults = HiveFlightConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(defaults.party, Party::Alice);
        assert_eq!(defaults.port, 8815);
    }

    #[test]
    fn invalid_env_values_are_rejected() {
        assert!(
            HiveFlightConfig::from_lookup(lookup_from(&[("HIVE_FLIGHT_PORT", "not-a-port")]))
                .is_err()
        );
        assert!(
            HiveFlightConfig::from_lookup(lookup_from(&[("HIVE_FLIGHT_PARTY", "carol")])).is_err()
        );
    }

    #[test]
    fn default_config_matches_cli_defaults() {
        let config = HiveFlightConfig::default();
        assert_eq!(config.party, Party::Alice);
        assert_eq!(config.port, 8815);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.advertise_host, "localhost");
    }
}
