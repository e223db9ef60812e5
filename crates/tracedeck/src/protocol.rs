use serde::{Deserialize, Serialize};
use tracedeck_core::analytics::AnalyticsResponse;
use tracedeck_core::query::{
    ChartsRequest, FiltersResponse, SpanRequest, SpanResponse, StatusResponse, TraceListItem,
    TraceRequest, TraceResponse, TracesRequest,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ApiRequest {
    Traces(TracesRequest),
    Trace(TraceRequest),
    Span(SpanRequest),
    Charts(ChartsRequest),
    Filters,
    Status,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ApiResponse {
    Traces(Vec<TraceListItem>),
    Trace(TraceResponse),
    Span(SpanResponse),
    Charts(AnalyticsResponse),
    Filters(FiltersResponse),
    Status(StatusResponse),
    NotFound(String),
    Error(String),
}
