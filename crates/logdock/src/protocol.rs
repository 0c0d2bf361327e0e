use logdock_core::filter::LogCriteria;
use logdock_core::query::{QueryResponse, StatusResponse};
use serde::{Deserialize, Serialize};

/// One request per line on the query socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ApiRequest {
    Query(LogCriteria),
    Status,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ApiResponse {
    Query(QueryResponse),
    Status(StatusResponse),
    Error(String),
}
