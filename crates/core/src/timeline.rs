use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::span::SpanRecord;
use crate::tree::OrderedSpanNode;

/// Horizontal placement for one span on the trace timeline, as
/// percentages of the trace's overall extent. `level` is the nesting
/// depth, used only for indentation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpanLayout {
    pub span_id: String,
    pub level: usize,
    pub offset_percent: f64,
    pub width_percent: f64,
}

/// The overall `[min started_at, max effective end]` extent of a span
/// set. In-flight spans extend the right edge to `now`. `None` for an
/// empty set.
pub fn trace_extent(
    spans: &[SpanRecord],
    now: DateTime<Utc>,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let min = spans.iter().map(|s| s.started_at).min()?;
    let max = spans.iter().map(|s| s.effective_end(now)).max()?;
    Some((min, max))
}

/// Compute proportional timeline geometry for a reconstructed forest,
/// flattened in render order.
///
/// When the extent is a single instant every offset and width is 0.0
/// rather than dividing by zero.
pub fn layout(
    forest: &[OrderedSpanNode],
    trace_min_start: DateTime<Utc>,
    trace_max_end: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Vec<SpanLayout> {
    let tick_size = (trace_max_end - trace_min_start).num_milliseconds();
    let mut out = Vec::new();
    for node in forest {
        layout_node(node, 0, trace_min_start, tick_size, now, &mut out);
    }
    out
}

fn layout_node(
    node: &OrderedSpanNode,
    level: usize,
    min_start: DateTime<Utc>,
    tick_size: i64,
    now: DateTime<Utc>,
    out: &mut Vec<SpanLayout>,
) {
    let (offset_percent, width_percent) = if tick_size == 0 {
        (0.0, 0.0)
    } else {
        let start = (node.span.started_at - min_start).num_milliseconds();
        let duration = (node.span.effective_end(now) - node.span.started_at).num_milliseconds();
        (
            start as f64 / tick_size as f64 * 100.0,
            duration as f64 / tick_size as f64 * 100.0,
        )
    };

    out.push(SpanLayout {
        span_id: node.span.span_id.clone(),
        level,
        offset_percent,
        width_percent,
    });
    for child in &node.children {
        layout_node(child, level + 1, min_start, tick_size, now, out);
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::tree::build_forest;

    fn ts(ms: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap() + Duration::milliseconds(ms)
    }

    fn span(id: &str, parent: Option<&str>, start_ms: i64, end_ms: Option<i64>) -> SpanRecord {
        SpanRecord {
            span_id: id.to_string(),
            trace_id: "t1".to_string(),
            parent_id: parent.map(str::to_string),
            started_at: ts(start_ms),
            ended_at: end_ms.map(ts),
            span_data_json: "{}".to_string(),
            error: None,
        }
    }

    #[test]
    fn proportional_geometry_for_nested_spans() {
        let spans = vec![
            span("a", None, 0, Some(100)),
            span("b", Some("a"), 10, Some(40)),
            span("c", Some("a"), 50, Some(90)),
        ];
        let forest = build_forest(&spans).unwrap();
        let layouts = layout(&forest, ts(0), ts(100), ts(100));

        assert_eq!(layouts.len(), 3);
        assert_eq!(layouts[0].span_id, "a");
        assert_eq!(layouts[0].level, 0);
        assert_eq!(layouts[0].offset_percent, 0.0);
        assert_eq!(layouts[0].width_percent, 100.0);
        assert_eq!(layouts[1].span_id, "b");
        assert_eq!(layouts[1].level, 1);
        assert_eq!(layouts[1].offset_percent, 10.0);
        assert_eq!(layouts[1].width_percent, 30.0);
        assert_eq!(layouts[2].span_id, "c");
        assert_eq!(layouts[2].offset_percent, 50.0);
        assert_eq!(layouts[2].width_percent, 40.0);
    }

    #[test]
    fn zero_tick_size_stays_finite() {
        let spans = vec![span("a", None, 0, Some(0))];
        let forest = build_forest(&spans).unwrap();
        let layouts = layout(&forest, ts(0), ts(0), ts(0));
        assert_eq!(layouts[0].offset_percent, 0.0);
        assert_eq!(layouts[0].width_percent, 0.0);
        assert!(layouts[0].offset_percent.is_finite());
        assert!(layouts[0].width_percent.is_finite());
    }

    #[test]
    fn in_flight_span_extends_to_now() {
        let spans = vec![span("a", None, 0, None)];
        let forest = build_forest(&spans).unwrap();
        let now = ts(200);
        let (min, max) = trace_extent(&spans, now).unwrap();
        assert_eq!((min, max), (ts(0), ts(200)));
        let layouts = layout(&forest, min, max, now);
        assert_eq!(layouts[0].width_percent, 100.0);
    }

    #[test]
    fn extent_of_empty_set_is_none() {
        assert!(trace_extent(&[], ts(0)).is_none());
    }
}
