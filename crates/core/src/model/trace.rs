use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TraceRecord {
    pub trace_id: String,
    pub workflow_name: String,
    pub group_id: String,
    pub metadata_json: String,
}
