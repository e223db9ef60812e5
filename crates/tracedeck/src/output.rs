use std::collections::HashMap;

use chrono::{SecondsFormat, Utc};
use tracedeck_core::analytics::{AnalyticsResponse, ChartSeries};
use tracedeck_core::model::span::SpanRecord;
use tracedeck_core::query::{
    FiltersResponse, SpanResponse, StatusResponse, TraceListItem, TraceResponse,
};
use tracedeck_core::timeline::{SpanLayout, layout, trace_extent};
use tracedeck_core::tree::build_forest;

const BAR_WIDTH: usize = 40;

pub fn print_traces_human(v: &[TraceListItem]) {
    for item in v {
        println!(
            "trace={} workflow=\"{}\" group={} spans={}",
            item.trace_id, item.workflow_name, item.group_id, item.span_count
        );
    }
    println!("-- {} traces --", v.len());
}

pub fn print_trace_human(v: &TraceResponse) {
    let now = Utc::now();
    let errors = v.spans.iter().filter(|s| s.has_error()).count();
    let extent = trace_extent(&v.spans, now);
    let duration_ms = extent
        .map(|(min, max)| (max - min).num_milliseconds())
        .unwrap_or(0);
    println!(
        "TRACE {} workflow=\"{}\" group={} duration={}ms spans={} errors={}",
        v.trace.trace_id,
        v.trace.workflow_name,
        v.trace.group_id,
        duration_ms,
        v.spans.len(),
        errors
    );

    let forest = match build_forest(&v.spans) {
        Ok(forest) => forest,
        Err(err) => {
            eprintln!("error: {err}");
            return;
        }
    };
    let Some((min, max)) = extent else {
        return;
    };

    let by_id = v
        .spans
        .iter()
        .map(|s| (s.span_id.as_str(), s))
        .collect::<HashMap<_, _>>();
    for slot in layout(&forest, min, max, now) {
        if let Some(span) = by_id.get(slot.span_id.as_str()) {
            print_span_row(span, &slot);
        }
    }
}

fn print_span_row(span: &SpanRecord, slot: &SpanLayout) {
    let indent = "  ".repeat(slot.level);
    let payload = span.payload();
    let duration = span
        .duration_ms()
        .map(|ms| format!("{ms}ms"))
        .unwrap_or_else(|| "in flight".to_string());
    let marker = if span.has_error() { " ERROR" } else { "" };
    println!(
        "{indent}{} [{}] {} ({duration}){marker}  |{}|",
        slot.span_id,
        payload.kind(),
        payload.display_name(),
        timeline_bar(slot),
    );
}

fn timeline_bar(slot: &SpanLayout) -> String {
    let lead = (slot.offset_percent / 100.0 * BAR_WIDTH as f64).round() as usize;
    let lead = lead.min(BAR_WIDTH.saturating_sub(1));
    let fill = (slot.width_percent / 100.0 * BAR_WIDTH as f64).round() as usize;
    let fill = fill.clamp(1, BAR_WIDTH - lead);
    format!(
        "{}{}{}",
        " ".repeat(lead),
        "#".repeat(fill),
        " ".repeat(BAR_WIDTH - lead - fill)
    )
}

pub fn print_span_human(v: &SpanResponse) {
    let payload = v.span.payload();
    let duration = v
        .span
        .duration_ms()
        .map(|ms| format!("{ms}ms"))
        .unwrap_or_else(|| "in flight".to_string());
    println!(
        "SPAN {} trace={} kind={} name=\"{}\" duration={}",
        v.span.span_id,
        v.span.trace_id,
        payload.kind(),
        payload.display_name(),
        duration
    );
    println!(
        "started={}",
        v.span
            .started_at
            .to_rfc3339_opts(SecondsFormat::Millis, true)
    );
    if let Some(ended) = v.span.ended_at {
        println!("ended={}", ended.to_rfc3339_opts(SecondsFormat::Millis, true));
    }
    if let Some(error) = &v.span.error
        && !error.is_empty()
    {
        println!("error={error}");
    }
    if let tracedeck_core::model::span_data::SpanData::Function { input, output, .. } = &payload {
        if let Some(input) = input {
            println!("input={input}");
        }
        if let Some(output) = output {
            println!("output={output}");
        }
    }
    println!("span_data={}", v.span.span_data_json);
}

pub fn print_charts_human(v: &AnalyticsResponse) {
    println!(
        "CHARTS window={} generated_at={}",
        v.window,
        v.generated_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    );
    print_series("spans started", &v.throughput_series());
    print_series("avg latency ms", &v.avg_latency_series());
    print_series("p95 latency ms", &v.p95_latency_series());
    print_series("error rate %", &v.error_rate_series());
    print_series("concurrent spans", &v.concurrency_series());
    print_series("top errors", &v.top_errors_series());
    print_series("trace sizes", &v.trace_sizes_series());
}

fn print_series(title: &str, series: &ChartSeries) {
    println!("== {title} ==");
    if series.labels.is_empty() {
        println!("(no data)");
        return;
    }

    let max = series.values.iter().cloned().fold(0.0_f64, f64::max);
    for (label, value) in series.labels.iter().zip(&series.values) {
        let fill = if max > 0.0 {
            (value / max * BAR_WIDTH as f64).round() as usize
        } else {
            0
        };
        println!("{label:<24} {value:>10.1} {}", "#".repeat(fill));
    }
}

pub fn print_filters_human(v: &FiltersResponse) {
    println!("workflows={}", v.workflows.join(","));
    println!("group_ids={}", v.group_ids.join(","));
    println!("trace_ids={}", v.trace_ids.join(","));
    println!("span_ids={}", v.span_ids.join(","));
}

pub fn print_status_human(v: &StatusResponse) {
    println!("db_path={}", v.db_path);
    println!("db_size_bytes={}", v.db_size_bytes);
    println!("traces={} spans={}", v.traces_count, v.spans_count);
    if let Some(oldest) = v.oldest_span_start {
        println!(
            "oldest={}",
            oldest.to_rfc3339_opts(SecondsFormat::Millis, true)
        );
    }
    if let Some(newest) = v.newest_span_start {
        println!(
            "newest={}",
            newest.to_rfc3339_opts(SecondsFormat::Millis, true)
        );
    }
}
