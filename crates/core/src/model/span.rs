use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::span_data::SpanData;

/// One observed unit of work inside a trace, as written by the external
/// tracer. `ended_at` is absent while the span is in flight.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpanRecord {
    pub span_id: String,
    pub trace_id: String,
    pub parent_id: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub span_data_json: String,
    pub error: Option<String>,
}

impl SpanRecord {
    /// End timestamp for layout and interval math; in-flight spans
    /// extend to the live edge.
    pub fn effective_end(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.ended_at.unwrap_or(now)
    }

    /// Duration in milliseconds for completed spans.
    pub fn duration_ms(&self) -> Option<i64> {
        self.ended_at
            .map(|end| (end - self.started_at).num_milliseconds().max(0))
    }

    pub fn has_error(&self) -> bool {
        self.error.as_deref().is_some_and(|e| !e.is_empty())
    }

    pub fn payload(&self) -> SpanData {
        SpanData::parse(&self.span_data_json)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;

    fn span(ended: bool) -> SpanRecord {
        let start = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        SpanRecord {
            span_id: "s1".into(),
            trace_id: "t1".into(),
            parent_id: None,
            started_at: start,
            ended_at: ended.then(|| start + Duration::milliseconds(250)),
            span_data_json: "{}".into(),
            error: None,
        }
    }

    #[test]
    fn duration_only_for_completed_spans() {
        assert_eq!(span(true).duration_ms(), Some(250));
        assert_eq!(span(false).duration_ms(), None);
    }

    #[test]
    fn in_flight_span_ends_now() {
        let now = Utc.with_ymd_and_hms(2026, 2, 1, 0, 1, 0).unwrap();
        assert_eq!(span(false).effective_end(now), now);
        assert_ne!(span(true).effective_end(now), now);
    }

    #[test]
    fn empty_error_is_not_an_error() {
        let mut s = span(true);
        assert!(!s.has_error());
        s.error = Some(String::new());
        assert!(!s.has_error());
        s.error = Some("boom".into());
        assert!(s.has_error());
    }
}
