#![allow(dead_code)]

use std::net::SocketAddr;

use anyhow::{Context, Result};
use arrow_flight::FlightClient;
use datafusion::arrow::array::AsArray;
use datafusion::arrow::compute::concat_batches;
use datafusion::arrow::datatypes::{Int32Type, SchemaRef};
use datafusion::arrow::record_batch::RecordBatch;
use hive_flight::{serve, HiveFlightConfig, Party};
use prost::Message;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tonic::transport::Endpoint;

pub const STATEMENT_QUERY_TYPE_URL: &str =
    "type.googleapis.com/arrow.flight.protocol.sql.CommandStatementQuery";

/// Flight SQL `CommandStatementQuery`.
#[derive(Clone, PartialEq, prost::Message)]
pub struct CommandStatementQuery {
    #[prost(string, tag = "1")]
    pub query: String,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub transaction_id: Option<Vec<u8>>,
}

/// `google.protobuf.Any`.
#[derive(Clone, PartialEq, prost::Message)]
pub struct AnyEnvelope {
    #[prost(string, tag = "1")]
    pub type_url: String,
    #[prost(bytes = "vec", tag = "2")]
    pub value: Vec<u8>,
}

/// Encodes `query` the way a Flight SQL client does before `GetFlightInfo`.
pub fn statement_command(query: &str) -> Vec<u8> {
    let command = CommandStatementQuery {
        query: query.to_string(),
        transaction_id: Some(b"txn-1".to_vec()),
    };
    AnyEnvelope {
        type_url: STATEMENT_QUERY_TYPE_URL.to_string(),
        value: command.encode_to_vec(),
    }
    .encode_to_vec()
}

/// Concatenates result batches into one for row-level assertions.
pub fn single_batch(schema: &SchemaRef, batches: &[RecordBatch]) -> Result<RecordBatch> {
    concat_batches(schema, batches).context("concat result batches")
}

pub fn string_column(batch: &RecordBatch, idx: usize) -> Vec<String> {
    batch
        .column(idx)
        .as_string::<i32>()
        .iter()
        .map(|value| value.unwrap_or_default().to_string())
        .collect()
}

pub fn int32_column(batch: &RecordBatch, idx: usize) -> Vec<i32> {
    batch
        .column(idx)
        .as_primitive::<Int32Type>()
        .iter()
        .map(|value| value.unwrap_or_default())
        .collect()
}

/// One party server running on an ephemeral local port.
pub struct TestServer {
    pub addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<Result<()>>>,
}

impl TestServer {
    pub async fn start(party: Party) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("bind ephemeral flight port")?;
        let addr = listener.local_addr().context("read ephemeral address")?;
        let config = HiveFlightConfig {
            party,
            host: addr.ip().to_string(),
            port: addr.port(),
            advertise_host: "localhost".to_string(),
        };
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(serve(config, listener, async move {
            let _ = shutdown_rx.await;
        }));
        Ok(Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub async fn client(&self) -> Result<FlightClient> {
        let channel = Endpoint::from_shared(format!("http://{}", self.addr))
            .context("build flight endpoint")?
            .connect()
            .await
            .context("connect flight client")?;
        Ok(FlightClient::new(channel))
    }

    pub async fn stop(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            task.await.context("join flight server task")??;
        }
        Ok(())
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
