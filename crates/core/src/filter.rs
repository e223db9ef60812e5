use glob::Pattern;
use serde::{Deserialize, Serialize};

use crate::model::trace::TraceRecord;

/// Filter selections applied to the trace list. Workflow and group
/// accept glob patterns; trace ids are exact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TraceFilter {
    pub workflow_glob: Option<String>,
    pub group_glob: Option<String>,
    pub trace_ids: Vec<String>,
}

impl TraceFilter {
    pub fn is_empty(&self) -> bool {
        self.workflow_glob.is_none() && self.group_glob.is_none() && self.trace_ids.is_empty()
    }

    pub fn matches(&self, trace: &TraceRecord) -> bool {
        if let Some(pattern) = &self.workflow_glob
            && !glob_matches(pattern, &trace.workflow_name)
        {
            return false;
        }
        if let Some(pattern) = &self.group_glob
            && !glob_matches(pattern, &trace.group_id)
        {
            return false;
        }
        if !self.trace_ids.is_empty() && !self.trace_ids.contains(&trace.trace_id) {
            return false;
        }
        true
    }
}

fn glob_matches(pattern: &str, value: &str) -> bool {
    Pattern::new(pattern)
        .map(|p| p.matches(value))
        .unwrap_or(false)
}
