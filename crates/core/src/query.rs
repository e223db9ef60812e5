use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::filter::TraceFilter;
use crate::model::span::SpanRecord;
use crate::model::trace::TraceRecord;
use crate::window::TimeWindowKey;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TracesRequest {
    pub filter: TraceFilter,
    pub limit: usize,
}

impl Default for TracesRequest {
    fn default() -> Self {
        Self {
            filter: TraceFilter::default(),
            limit: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceListItem {
    pub trace_id: String,
    pub workflow_name: String,
    pub group_id: String,
    pub metadata_json: String,
    pub span_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceRequest {
    pub trace_id: String,
}

/// One trace with its flat, fetch-ordered span set. The forest and
/// timeline geometry are rebuilt by the consumer on every render.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceResponse {
    pub trace: TraceRecord,
    pub spans: Vec<SpanRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpanRequest {
    pub trace_id: String,
    pub span_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpanResponse {
    pub span: SpanRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartsRequest {
    pub window: TimeWindowKey,
}

/// Distinct filterable values across the whole store, for populating
/// filter dropdowns.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FiltersResponse {
    pub workflows: Vec<String>,
    pub group_ids: Vec<String>,
    pub trace_ids: Vec<String>,
    pub span_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub db_path: String,
    pub db_size_bytes: u64,
    pub traces_count: usize,
    pub spans_count: usize,
    pub oldest_span_start: Option<DateTime<Utc>>,
    pub newest_span_start: Option<DateTime<Utc>>,
}
