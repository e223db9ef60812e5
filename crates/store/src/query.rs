use chrono::{DateTime, NaiveDateTime, Utc};
use duckdb::{params, params_from_iter};
use tracedeck_core::analytics::{
    AnalyticsResponse, ConcurrencyPoint, ErrorRatePoint, ErrorSignature, LatencyPoint, QuerySpec,
    ThroughputPoint, TraceSizeBucket, build_queries,
};
use tracedeck_core::error::{Result, TracedeckError};
use tracedeck_core::model::span::SpanRecord;
use tracedeck_core::model::trace::TraceRecord;
use tracedeck_core::query::{FiltersResponse, TraceListItem, TracesRequest};
use tracedeck_core::window::TimeWindowKey;

use crate::Store;

impl Store {
    pub fn fetch_trace(&self, trace_id: &str) -> Result<Option<TraceRecord>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT trace_id, workflow_name, group_id, metadata
                 FROM traces
                 WHERE trace_id = ?
                 ORDER BY id DESC
                 LIMIT 1",
            )
            .map_err(|e| TracedeckError::Store(format!("prepare trace failed: {e}")))?;

        let mut rows = stmt
            .query_map(params![trace_id], |row| {
                Ok(TraceRecord {
                    trace_id: row.get(0)?,
                    workflow_name: row.get(1)?,
                    group_id: row.get(2)?,
                    metadata_json: row.get(3)?,
                })
            })
            .map_err(|e| TracedeckError::Store(format!("query trace failed: {e}")))?;

        match rows.next() {
            Some(row) => Ok(Some(row.map_err(|e| {
                TracedeckError::Store(format!("map trace row failed: {e}"))
            })?)),
            None => Ok(None),
        }
    }

    /// All spans of a trace, oldest first; ties keep insertion order.
    pub fn fetch_spans(&self, trace_id: &str) -> Result<Vec<SpanRecord>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT span_id, trace_id, parent_id, started_at, ended_at, span_data, error
                 FROM spans
                 WHERE trace_id = ?
                 ORDER BY started_at ASC, id ASC",
            )
            .map_err(|e| TracedeckError::Store(format!("prepare spans failed: {e}")))?;

        let rows = stmt
            .query_map(params![trace_id], |row| {
                Ok(SpanRecord {
                    span_id: row.get(0)?,
                    trace_id: row.get(1)?,
                    parent_id: row.get(2)?,
                    started_at: row.get::<_, NaiveDateTime>(3)?.and_utc(),
                    ended_at: row.get::<_, Option<NaiveDateTime>>(4)?.map(|dt| dt.and_utc()),
                    span_data_json: row.get(5)?,
                    error: row.get(6)?,
                })
            })
            .map_err(|e| TracedeckError::Store(format!("query spans failed: {e}")))?;

        let mut spans = Vec::new();
        for row in rows {
            spans.push(row.map_err(|e| TracedeckError::Store(format!("map span row failed: {e}")))?);
        }
        Ok(spans)
    }

    /// Traces newest first. Glob filters are applied in Rust so pattern
    /// syntax never touches the SQL text.
    pub fn list_traces(&self, req: &TracesRequest) -> Result<Vec<TraceListItem>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT t.trace_id, t.workflow_name, t.group_id, t.metadata,
                        (SELECT COUNT(*) FROM spans s WHERE s.trace_id = t.trace_id) AS span_count
                 FROM traces t
                 ORDER BY t.id DESC",
            )
            .map_err(|e| TracedeckError::Store(format!("prepare traces failed: {e}")))?;

        let rows = stmt
            .query_map([], |row| {
                let trace = TraceRecord {
                    trace_id: row.get(0)?,
                    workflow_name: row.get(1)?,
                    group_id: row.get(2)?,
                    metadata_json: row.get(3)?,
                };
                let span_count = row.get::<_, i64>(4)? as usize;
                Ok((trace, span_count))
            })
            .map_err(|e| TracedeckError::Store(format!("query traces failed: {e}")))?;

        let mut items = Vec::new();
        for row in rows {
            let (trace, span_count) =
                row.map_err(|e| TracedeckError::Store(format!("map traces row failed: {e}")))?;
            if !req.filter.matches(&trace) {
                continue;
            }
            items.push(TraceListItem {
                trace_id: trace.trace_id,
                workflow_name: trace.workflow_name,
                group_id: trace.group_id,
                metadata_json: trace.metadata_json,
                span_count,
            });
        }

        items.truncate(req.limit);
        Ok(items)
    }

    pub fn list_filter_values(&self) -> Result<FiltersResponse> {
        let conn = self.conn();
        Ok(FiltersResponse {
            workflows: string_column(
                &conn,
                "SELECT DISTINCT workflow_name FROM traces ORDER BY 1",
            )?,
            group_ids: string_column(&conn, "SELECT DISTINCT group_id FROM traces ORDER BY 1")?,
            trace_ids: string_column(&conn, "SELECT DISTINCT trace_id FROM traces ORDER BY 1")?,
            span_ids: string_column(&conn, "SELECT DISTINCT span_id FROM spans ORDER BY 1")?,
        })
    }

    /// Runs the six window aggregates sequentially over one connection.
    /// Any failure drops the whole batch; a partial bundle is never
    /// returned.
    pub fn run_analytics(
        &self,
        window: TimeWindowKey,
        now: DateTime<Utc>,
    ) -> Result<AnalyticsResponse> {
        let started = std::time::Instant::now();
        let queries = build_queries(window, now)?;

        let response = AnalyticsResponse {
            window,
            generated_at: now,
            throughput: self.run_throughput(&queries.throughput)?,
            latency: self.run_latency(&queries.latency)?,
            error_rate: self.run_error_rate(&queries.error_rate)?,
            concurrency: self.run_concurrency(&queries.concurrency)?,
            top_errors: self.run_top_errors(&queries.top_errors)?,
            trace_sizes: self.run_trace_sizes(&queries.trace_sizes)?,
        };

        tracing::debug!(
            window = %window,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "analytics batch complete"
        );
        Ok(response)
    }

    pub fn run_throughput(&self, spec: &QuerySpec) -> Result<Vec<ThroughputPoint>> {
        self.run_spec(spec, |row| {
            Ok(ThroughputPoint {
                ts: row.get(0)?,
                spans_started: row.get(1)?,
            })
        })
    }

    pub fn run_latency(&self, spec: &QuerySpec) -> Result<Vec<LatencyPoint>> {
        self.run_spec(spec, |row| {
            Ok(LatencyPoint {
                ts: row.get(0)?,
                avg_ms: row.get(1)?,
                p95_ms: row.get(2)?,
            })
        })
    }

    pub fn run_error_rate(&self, spec: &QuerySpec) -> Result<Vec<ErrorRatePoint>> {
        self.run_spec(spec, |row| {
            Ok(ErrorRatePoint {
                ts: row.get(0)?,
                errors: row.get(1)?,
                total: row.get(2)?,
                error_rate_pct: row.get(3)?,
            })
        })
    }

    pub fn run_concurrency(&self, spec: &QuerySpec) -> Result<Vec<ConcurrencyPoint>> {
        self.run_spec(spec, |row| {
            Ok(ConcurrencyPoint {
                ts: row.get(0)?,
                active_spans: row.get(1)?,
            })
        })
    }

    pub fn run_top_errors(&self, spec: &QuerySpec) -> Result<Vec<ErrorSignature>> {
        self.run_spec(spec, |row| {
            Ok(ErrorSignature {
                error_head: row.get(0)?,
                n: row.get(1)?,
            })
        })
    }

    pub fn run_trace_sizes(&self, spec: &QuerySpec) -> Result<Vec<TraceSizeBucket>> {
        self.run_spec(spec, |row| {
            Ok(TraceSizeBucket {
                bucket_label: row.get(0)?,
                traces_in_bucket: row.get(1)?,
            })
        })
    }

    fn run_spec<T>(
        &self,
        spec: &QuerySpec,
        map: impl FnMut(&duckdb::Row<'_>) -> duckdb::Result<T>,
    ) -> Result<Vec<T>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&spec.sql)
            .map_err(|e| TracedeckError::Store(format!("prepare aggregate failed: {e}")))?;

        let rows = stmt
            .query_map(params_from_iter(spec.params.iter()), map)
            .map_err(|e| TracedeckError::Store(format!("aggregate query failed: {e}")))?;

        let mut out = Vec::new();
        for row in rows {
            out.push(
                row.map_err(|e| TracedeckError::Store(format!("map aggregate row failed: {e}")))?,
            );
        }
        Ok(out)
    }
}

fn string_column(conn: &duckdb::Connection, sql: &str) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| TracedeckError::Store(format!("prepare values failed: {e}")))?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(|e| TracedeckError::Store(format!("query values failed: {e}")))?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| TracedeckError::Store(format!("map value row failed: {e}")))?);
    }
    Ok(out)
}
