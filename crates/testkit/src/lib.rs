use chrono::{DateTime, Duration, TimeZone, Utc};
use tracedeck_core::model::span::SpanRecord;
use tracedeck_core::model::trace::TraceRecord;

pub fn trace(trace_id: &str, workflow: &str, group: &str) -> TraceRecord {
    TraceRecord {
        trace_id: trace_id.to_string(),
        workflow_name: workflow.to_string(),
        group_id: group.to_string(),
        metadata_json: "{}".to_string(),
    }
}

pub fn span(
    trace_id: &str,
    span_id: &str,
    parent_id: Option<&str>,
    started_at: DateTime<Utc>,
    duration_ms: Option<i64>,
) -> SpanRecord {
    SpanRecord {
        span_id: span_id.to_string(),
        trace_id: trace_id.to_string(),
        parent_id: parent_id.map(str::to_string),
        started_at,
        ended_at: duration_ms.map(|ms| started_at + Duration::milliseconds(ms)),
        span_data_json: "{}".to_string(),
        error: None,
    }
}

pub fn errored(mut record: SpanRecord, error: &str) -> SpanRecord {
    record.error = Some(error.to_string());
    record
}

/// A small checkout-shaped trace: agent root, a completed function
/// child, a failed tool child, and one span still in flight.
pub fn sample_trace(trace_id: &str) -> (TraceRecord, Vec<SpanRecord>) {
    let base = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();

    let mut root = span(trace_id, "root", None, base, Some(1800));
    root.span_data_json =
        serde_json::json!({"span_data": {"type": "agent", "name": "Checkout"}}).to_string();

    let mut lookup = span(
        trace_id,
        "lookup",
        Some("root"),
        base + Duration::milliseconds(100),
        Some(600),
    );
    lookup.span_data_json = serde_json::json!({"span_data": {
        "type": "function",
        "name": "lookup_order",
        "input": {"order_id": "o_1"},
        "output": {"status": "found"},
    }})
    .to_string();

    let mut charge = errored(
        span(
            trace_id,
            "charge",
            Some("root"),
            base + Duration::milliseconds(900),
            Some(700),
        ),
        "upstream timeout",
    );
    charge.span_data_json =
        serde_json::json!({"span_data": {"type": "tool", "name": "http_post"}}).to_string();

    let mut pending = span(
        trace_id,
        "pending",
        Some("root"),
        base + Duration::milliseconds(1700),
        None,
    );
    pending.span_data_json =
        serde_json::json!({"span_data": {"type": "response", "response_id": "resp_1"}}).to_string();

    (
        trace(trace_id, "checkout", "group_a"),
        vec![root, lookup, charge, pending],
    )
}
