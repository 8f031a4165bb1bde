//! Two-phase query front end: plan a statement, then retrieve it by ticket.
//!
//! Planning runs the statement once to learn its shape and row count, then
//! parks the rewritten statement in the ticket registry. Retrieval consumes the
//! ticket and runs the statement again. Catalog listing and the health action
//! round out the surface used by Flight SQL clients.

use bytes::Bytes;
use datafusion::arrow::datatypes::SchemaRef;
use tracing::{info, warn};

use crate::backend::{rewrite_default_schema, ColumnarResult, ResultBackend, DEFAULT_SCHEMA};
use crate::error::{FrontEndError, Result};
use crate::party::Party;
use crate::tickets::TicketRegistry;
use crate::wire::decode_command;

pub const HEALTHCHECK_ACTION: &str = "healthcheck";
const HEALTHCHECK_DESCRIPTION: &str = "Health check";
const HEALTHCHECK_ACK: &[u8] = b"ok";

/// Byte size reported when the result size is not known up front.
pub const UNKNOWN_SIZE: i64 = -1;

const LOG_QUERY_CHARS: usize = 100;

/// Addressing mode of a planning request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandDescriptor {
    /// Binary command payload, usually a Flight SQL `CommandStatementQuery`.
    Command(Bytes),
    /// Table path; planned as `SELECT * FROM <segments joined by '.'>`.
    Path(Vec<String>),
    /// Any other descriptor kind.
    Unsupported,
}

/// Outcome of a successful planning call.
#[derive(Debug, Clone)]
pub struct PlannedQuery {
    /// Schema the retrieval will produce.
    pub schema: SchemaRef,
    /// Single-use ticket, `{party}_{counter}`.
    pub ticket: String,
    /// Endpoint location clients retrieve from.
    pub location: String,
    /// Row count observed while planning.
    pub total_records: i64,
    /// Always [`UNKNOWN_SIZE`].
    pub total_bytes: i64,
}

/// One browsable table, without a retrieval ticket.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    /// `["default", <table>]`; joins into a plannable path descriptor.
    pub path: Vec<String>,
    /// Table schema from a zero-row probe.
    pub schema: SchemaRef,
}

/// Orchestrates decoding, execution, and ticketing for one party.
pub struct QueryFrontEnd {
    party: Party,
    location: String,
    backend: ResultBackend,
    tickets: TicketRegistry,
}

impl QueryFrontEnd {
    pub fn new(party: Party, location: impl Into<String>, backend: ResultBackend) -> Self {
        Self {
            party,
            location: location.into(),
            backend,
            tickets: TicketRegistry::new(party.tag()),
        }
    }

    /// Seeds the party's fixture dataset and builds a front end around it.
    pub fn bootstrap(party: Party, location: impl Into<String>) -> anyhow::Result<Self> {
        let backend = ResultBackend::seeded(party)?;
        Ok(Self::new(party, location, backend))
    }

    pub fn party(&self) -> Party {
        self.party
    }

    /// Location advertised in planned endpoints.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Number of planned statements still waiting for retrieval.
    pub fn pending_tickets(&self) -> usize {
        self.tickets.pending()
    }

    /// Resolves a descriptor to rewritten SQL text.
    pub fn command_text(&self, descriptor: &CommandDescriptor) -> Result<String> {
        let command = match descriptor {
            CommandDescriptor::Command(payload) => decode_command(payload),
            CommandDescriptor::Path(segments) => format!("SELECT * FROM {}", segments.join(".")),
            CommandDescriptor::Unsupported => return Err(FrontEndError::UnsupportedDescriptor),
        };
        Ok(rewrite_default_schema(&command))
    }

    /// Runs the statement once and issues a ticket for its retrieval.
    pub async fn plan(&self, descriptor: &CommandDescriptor) -> Result<PlannedQuery> {
        let command = self.command_text(descriptor)?;
        info!(party = %self.party, query = %log_excerpt(&command), "planning query");

        let (schema, num_rows) = match self.backend.execute_schema_only(&command).await {
            Ok(shape) => shape,
            Err(err) => {
                warn!(party = %self.party, error = %err, "query planning failed");
                return Err(err.into());
            }
        };
        let ticket = self.tickets.issue(command);
        info!(
            party = %self.party,
            ticket = %ticket,
            rows = num_rows,
            columns = schema.fields().len(),
            "planned query"
        );

        Ok(PlannedQuery {
            schema,
            ticket,
            location: self.location.clone(),
            total_records: i64::try_from(num_rows).unwrap_or(i64::MAX),
            total_bytes: UNKNOWN_SIZE,
        })
    }

    /// Returns the result schema of a descriptor without issuing a ticket.
    pub async fn describe(&self, descriptor: &CommandDescriptor) -> Result<SchemaRef> {
        let command = self.command_text(descriptor)?;
        let (schema, _) = self.backend.execute_schema_only(&command).await?;
        Ok(schema)
    }

    /// Consumes a ticket and runs its statement.
    ///
    /// An unknown ticket is itself treated as SQL text, which lets clients skip
    /// planning and pass a statement directly.
    pub async fn retrieve(&self, ticket: &[u8]) -> Result<ColumnarResult> {
        let ticket = String::from_utf8_lossy(ticket);
        let command = match self.tickets.resolve_and_consume(&ticket) {
            Some(command) => command,
            None => ticket.into_owned(),
        };
        info!(party = %self.party, query = %log_excerpt(&command), "retrieving query");

        match self.backend.execute(&command).await {
            Ok(result) => {
                info!(
                    party = %self.party,
                    rows = result.num_rows,
                    columns = result.schema.fields().len(),
                    "returning query result"
                );
                Ok(result)
            }
            Err(err) => {
                warn!(party = %self.party, error = %err, "query retrieval failed");
                Err(err.into())
            }
        }
    }

    /// Enumerates tables in the `default` schema with their probed schemas.
    pub async fn list_catalog(&self) -> Result<Vec<CatalogEntry>> {
        let mut entries = Vec::new();
        for table in self.backend.table_names() {
            let schema = self.backend.probe_schema(&table).await?;
            entries.push(CatalogEntry {
                path: vec![DEFAULT_SCHEMA.to_string(), table],
                schema,
            });
        }
        Ok(entries)
    }

    /// Dispatches a named action. Unknown actions succeed with no payloads.
    pub fn do_action(&self, name: &str) -> Vec<Bytes> {
        info!(party = %self.party, action = name, "action");
        match name {
            HEALTHCHECK_ACTION => vec![Bytes::from_static(HEALTHCHECK_ACK)],
            _ => Vec::new(),
        }
    }

    /// Actions advertised to clients as `(type, description)`.
    pub fn list_actions(&self) -> Vec<(&'static str, &'static str)> {
        vec![(HEALTHCHECK_ACTION, HEALTHCHECK_DESCRIPTION)]
    }
}

fn log_excerpt(command: &str) -> String {
    command.chars().take(LOG_QUERY_CHARS).collect()
}
