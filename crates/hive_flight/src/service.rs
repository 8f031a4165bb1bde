//! Arrow Flight gRPC handlers that adapt Flight messages to the query front end.
//!
//! Only the read path is served. Upload, exchange, handshake, and long-running
//! polling answer `unimplemented`.

use std::sync::Arc;

use arrow_flight::encode::FlightDataEncoderBuilder;
use arrow_flight::error::FlightError;
use arrow_flight::flight_descriptor::DescriptorType;
use arrow_flight::flight_service_server::FlightService;
use arrow_flight::{
    Action, ActionType, Criteria, Empty, FlightData, FlightDescriptor, FlightEndpoint, FlightInfo,
    HandshakeRequest, HandshakeResponse, PollInfo, PutResult, SchemaAsIpc, SchemaResult, Ticket,
};
use async_trait::async_trait;
use datafusion::arrow::datatypes::Schema;
use datafusion::arrow::ipc::writer::IpcWriteOptions;
use futures_util::stream::{self, BoxStream};
use futures_util::{StreamExt, TryStreamExt};
use tonic::{Request, Response, Status, Streaming};

use crate::error::FrontEndError;
use crate::frontend::{CommandDescriptor, QueryFrontEnd, UNKNOWN_SIZE};

/// Flight service backed by a shared [`QueryFrontEnd`].
#[derive(Clone)]
pub struct HiveFlightService {
    front_end: Arc<QueryFrontEnd>,
}

impl HiveFlightService {
    pub fn new(front_end: Arc<QueryFrontEnd>) -> Self {
        Self { front_end }
    }
}

/// Converts a Flight descriptor into the front end's addressing mode.
fn command_descriptor(descriptor: &FlightDescriptor) -> CommandDescriptor {
    match descriptor.r#type() {
        DescriptorType::Cmd => CommandDescriptor::Command(descriptor.cmd.clone()),
        DescriptorType::Path => CommandDescriptor::Path(descriptor.path.clone()),
        DescriptorType::Unknown => CommandDescriptor::Unsupported,
    }
}

/// Attaches an IPC-encoded schema to a flight info message.
fn info_with_schema(schema: &Schema) -> Result<FlightInfo, FrontEndError> {
    FlightInfo::new()
        .try_with_schema(schema)
        .map_err(|err| FrontEndError::Encoding(err.to_string()))
}

#[async_trait]
impl FlightService for HiveFlightService {
    type HandshakeStream = BoxStream<'static, Result<HandshakeResponse, Status>>;
    type ListFlightsStream = BoxStream<'static, Result<FlightInfo, Status>>;
    type DoGetStream = BoxStream<'static, Result<FlightData, Status>>;
    type DoPutStream = BoxStream<'static, Result<PutResult, Status>>;
    type DoActionStream = BoxStream<'static, Result<arrow_flight::Result, Status>>;
    type ListActionsStream = BoxStream<'static, Result<ActionType, Status>>;
    type DoExchangeStream = BoxStream<'static, Result<FlightData, Status>>;

    async fn handshake(
        &self,
        _request: Request<Streaming<HandshakeRequest>>,
    ) -> Result<Response<Self::HandshakeStream>, Status> {
        Err(Status::unimplemented("handshake is not supported"))
    }

    /// Lists one catalog entry per fixture table; criteria are ignored.
    async fn list_flights(
        &self,
        _request: Request<Criteria>,
    ) -> Result<Response<Self::ListFlightsStream>, Status> {
        let entries = self.front_end.list_catalog().await?;
        let mut infos = Vec::with_capacity(entries.len());
        for entry in entries {
            let info = info_with_schema(&entry.schema)?
                .with_descriptor(FlightDescriptor::new_path(entry.path))
                .with_total_records(UNKNOWN_SIZE)
                .with_total_bytes(UNKNOWN_SIZE);
            infos.push(Ok(info));
        }
        Ok(Response::new(stream::iter(infos).boxed()))
    }

    /// Plans a statement and returns a single endpoint holding its ticket.
    async fn get_flight_info(
        &self,
        request: Request<FlightDescriptor>,
    ) -> Result<Response<FlightInfo>, Status> {
        let descriptor = request.into_inner();
        let planned = self
            .front_end
            .plan(&command_descriptor(&descriptor))
            .await?;

        let endpoint = FlightEndpoint::new()
            .with_ticket(Ticket::new(planned.ticket))
            .with_location(planned.location);
        let info = info_with_schema(&planned.schema)?
            .with_descriptor(descriptor)
            .with_endpoint(endpoint)
            .with_total_records(planned.total_records)
            .with_total_bytes(planned.total_bytes);
        Ok(Response::new(info))
    }

    async fn poll_flight_info(
        &self,
        _request: Request<FlightDescriptor>,
    ) -> Result<Response<PollInfo>, Status> {
        Err(Status::unimplemented("poll_flight_info is not supported"))
    }

    /// Returns the result schema of a descriptor without issuing a ticket.
    async fn get_schema(
        &self,
        request: Request<FlightDescriptor>,
    ) -> Result<Response<SchemaResult>, Status> {
        let descriptor = request.into_inner();
        let schema = self
            .front_end
            .describe(&command_descriptor(&descriptor))
            .await?;
        let result = SchemaResult::try_from(SchemaAsIpc::new(&schema, &IpcWriteOptions::default()))
            .map_err(|err| FrontEndError::Encoding(err.to_string()))?;
        Ok(Response::new(result))
    }

    /// Streams the result of a ticket's statement as Flight IPC data.
    async fn do_get(
        &self,
        request: Request<Ticket>,
    ) -> Result<Response<Self::DoGetStream>, Status> {
        let ticket = request.into_inner();
        let result = self.front_end.retrieve(&ticket.ticket).await?;

        let batches = stream::iter(result.batches.into_iter().map(Ok::<_, FlightError>));
        let flight_data = FlightDataEncoderBuilder::new()
            .with_schema(result.schema)
            .build(batches)
            .map_err(Status::from);
        Ok(Response::new(flight_data.boxed()))
    }

    async fn do_put(
        &self,
        _request: Request<Streaming<FlightData>>,
    ) -> Result<Response<Self::DoPutStream>, Status> {
        Err(Status::unimplemented("do_put is not supported"))
    }

    async fn do_action(
        &self,
        request: Request<Action>,
    ) -> Result<Response<Self::DoActionStream>, Status> {
        let action = request.into_inner();
        let results = self
            .front_end
            .do_action(&action.r#type)
            .into_iter()
            .map(|body| Ok(arrow_flight::Result { body }))
            .collect::<Vec<_>>();
        Ok(Response::new(stream::iter(results).boxed()))
    }

    async fn list_actions(
        &self,
        _request: Request<Empty>,
    ) -> Result<Response<Self::ListActionsStream>, Status> {
        let actions = self
            .front_end
            .list_actions()
            .into_iter()
            .map(|(name, description)| {
                Ok(ActionType {
                    r#type: name.to_string(),
                    description: description.to_string(),
                })
            })
            .collect::<Vec<_>>();
        Ok(Response::new(stream::iter(actions).boxed()))
    }

    async fn do_exchange(
        &self,
        _request: Request<Streaming<FlightData>>,
    ) -> Result<Response<Self::DoExchangeStream>, Status> {
        Err(Status::unimplemented("do_exchange is not supported"))
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    #[test]
    fn descriptor_kinds_map_to_addressing_modes() {
        let cmd = FlightDescriptor::new_cmd(Bytes::from_static(b"SELECT 1"));
        assert_eq!(
            command_descriptor(&cmd),
            CommandDescriptor::Command(Bytes::from_static(b"SELECT 1"))
        );

        let path = FlightDescriptor::new_path(vec!["default".to_string(), "t".to_string()]);
        assert_eq!(
            command_descriptor(&path),
            CommandDescriptor::Path(vec!["default".to_string(), "t".to_string()])
        );

        let unknown = FlightDescriptor {
            r#type: DescriptorType::Unknown as i32,
            ..Default::default()
        };
        assert_eq!(command_descriptor(&unknown), CommandDescriptor::Unsupported);
    }

    #[test]
    fn front_end_errors_map_to_grpc_codes() {
        let unavailable: Status = FrontEndError::UnsupportedDescriptor.into();
        assert_eq!(unavailable.code(), tonic::Code::Unavailable);

        let failed: Status = FrontEndError::QueryExecutionFailed("boom".to_string()).into();
        assert_eq!(failed.code(), tonic::Code::Internal);
        assert_eq!(failed.message(), "Query execution failed: boom");
    }
}
