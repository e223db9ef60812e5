use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::time::floor_to_bucket;
use crate::window::{Bucket, TimeWindowKey};

/// Error messages are grouped by a bounded prefix so long, nearly
/// identical errors collapse into one signature.
pub const ERROR_PREFIX_LEN: usize = 200;
pub const TOP_ERRORS_LIMIT: usize = 20;

/// Trace-size histogram: width-50 ranges, capped so arbitrarily large
/// traces land in the last bucket instead of growing the axis.
pub const TRACE_SIZE_BUCKET_WIDTH: usize = 50;
pub const TRACE_SIZE_BUCKET_CAP: usize = 20;

/// One executable aggregate: declared output columns, parameterized
/// SQL, and its bound parameters (RFC3339 timestamps). Identifiers are
/// never spliced into the text, so ids arriving from user-controlled
/// URLs cannot alter the query.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    pub columns: &'static [&'static str],
    pub sql: String,
    pub params: Vec<String>,
}

/// The six aggregate specifications for one window selection.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticsQueries {
    pub throughput: QuerySpec,
    pub latency: QuerySpec,
    pub error_rate: QuerySpec,
    pub concurrency: QuerySpec,
    pub top_errors: QuerySpec,
    pub trace_sizes: QuerySpec,
}

/// Build the six aggregate queries for a window. `now` is injected
/// rather than read from the clock so results are reproducible under
/// test; every window boundary and live-edge comparison binds it as a
/// parameter.
pub fn build_queries(window: TimeWindowKey, now: DateTime<Utc>) -> Result<AnalyticsQueries> {
    let bucket = window.bucket();
    let start = window.lookback().map(|lb| now - lb);

    Ok(AnalyticsQueries {
        throughput: throughput_query(bucket, start),
        latency: latency_query(bucket, start),
        error_rate: error_rate_query(bucket, start),
        concurrency: concurrency_query(bucket, start, now)?,
        top_errors: top_errors_query(start),
        trace_sizes: trace_sizes_query(start),
    })
}

fn rfc3339(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

/// Spans started per bucket. Sparse: buckets with no spans are absent
/// and the rendering layer treats them as zero.
fn throughput_query(bucket: Bucket, start: Option<DateTime<Utc>>) -> QuerySpec {
    let fmt = bucket.key_format();
    let (filter, params) = match start {
        Some(start) => ("\nWHERE started_at >= ?", vec![rfc3339(start)]),
        None => ("", Vec::new()),
    };
    QuerySpec {
        columns: &["ts", "spans_started"],
        sql: format!(
            "SELECT strftime(started_at, '{fmt}') AS ts, COUNT(*) AS spans_started\n\
             FROM spans{filter}\n\
             GROUP BY 1\n\
             ORDER BY 1"
        ),
        params,
    }
}

/// Per-bucket average and p95 duration over completed spans. The p95
/// rank is `ceil(count * 95 / 100)` over durations sorted ascending;
/// when no row holds that rank the bucket's average stands in for the
/// p95 (a deliberate approximation carried over from the original
/// dashboard, kept so chart values stay comparable).
fn latency_query(bucket: Bucket, start: Option<DateTime<Utc>>) -> QuerySpec {
    let fmt = bucket.key_format();
    let (filter, params) = match start {
        Some(start) => (" AND started_at >= ?", vec![rfc3339(start)]),
        None => ("", Vec::new()),
    };
    QuerySpec {
        columns: &["ts", "avg_ms", "p95_ms"],
        sql: format!(
            "WITH d AS (\n\
             \x20   SELECT strftime(started_at, '{fmt}') AS ts,\n\
             \x20          date_diff('millisecond', started_at, ended_at) AS ms\n\
             \x20   FROM spans\n\
             \x20   WHERE ended_at IS NOT NULL{filter}\n\
             ),\n\
             ranked AS (\n\
             \x20   SELECT ts, ms,\n\
             \x20          ROW_NUMBER() OVER (PARTITION BY ts ORDER BY ms) AS rn,\n\
             \x20          COUNT(*) OVER (PARTITION BY ts) AS cnt\n\
             \x20   FROM d\n\
             ),\n\
             p95 AS (\n\
             \x20   SELECT ts, ms AS p95_ms\n\
             \x20   FROM ranked\n\
             \x20   WHERE rn = CAST(ceil(cnt * 95.0 / 100.0) AS BIGINT)\n\
             )\n\
             SELECT d.ts AS ts,\n\
             \x20      AVG(d.ms) AS avg_ms,\n\
             \x20      COALESCE(MAX(p95.p95_ms), AVG(d.ms)) AS p95_ms\n\
             FROM d\n\
             LEFT JOIN p95 ON p95.ts = d.ts\n\
             GROUP BY d.ts\n\
             ORDER BY d.ts"
        ),
        params,
    }
}

/// Errored vs. total spans per bucket, as a 0-100 percentage. Buckets
/// only exist where total > 0, so the division is safe.
fn error_rate_query(bucket: Bucket, start: Option<DateTime<Utc>>) -> QuerySpec {
    let fmt = bucket.key_format();
    let (filter, params) = match start {
        Some(start) => ("\nWHERE started_at >= ?", vec![rfc3339(start)]),
        None => ("", Vec::new()),
    };
    QuerySpec {
        columns: &["ts", "errors", "total", "error_rate_pct"],
        sql: format!(
            "SELECT strftime(started_at, '{fmt}') AS ts,\n\
             \x20      COUNT(*) FILTER (WHERE error IS NOT NULL AND error <> '') AS errors,\n\
             \x20      COUNT(*) AS total,\n\
             \x20      100.0 * COUNT(*) FILTER (WHERE error IS NOT NULL AND error <> '') / COUNT(*) AS error_rate_pct\n\
             FROM spans{filter}\n\
             GROUP BY 1\n\
             ORDER BY 1"
        ),
        params,
    }
}

/// Spans active at each tick of a fabricated regular series. The grid
/// is time-driven, not data-driven: one tick per bucket from the
/// window start (for the unbounded window, the bucket-floored earliest
/// span start, resolved inside the query) up to now, and every tick is
/// emitted even when nothing is active.
fn concurrency_query(
    bucket: Bucket,
    start: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<QuerySpec> {
    let fmt = bucket.key_format();
    let step = bucket.step_sql();
    let (series, params) = match start {
        Some(start) => (
            format!(
                "series AS (\n\
                 \x20   SELECT unnest(generate_series(CAST(? AS TIMESTAMP), CAST(? AS TIMESTAMP), {step})) AS ts\n\
                 )"
            ),
            vec![
                rfc3339(floor_to_bucket(start, bucket)?),
                rfc3339(now),
                rfc3339(now),
            ],
        ),
        None => {
            let unit = bucket.trunc_unit();
            (
                format!(
                    "bounds AS (\n\
                     \x20   SELECT COALESCE(date_trunc('{unit}', MIN(started_at)),\n\
                     \x20                   date_trunc('{unit}', CAST(? AS TIMESTAMP))) AS start_ts\n\
                     \x20   FROM spans\n\
                     ),\n\
                     series AS (\n\
                     \x20   SELECT unnest(generate_series(bounds.start_ts, CAST(? AS TIMESTAMP), {step})) AS ts\n\
                     \x20   FROM bounds\n\
                     )"
                ),
                vec![rfc3339(now), rfc3339(now), rfc3339(now)],
            )
        }
    };
    Ok(QuerySpec {
        columns: &["ts", "active_spans"],
        sql: format!(
            "WITH {series}\n\
             SELECT strftime(series.ts, '{fmt}') AS ts,\n\
             \x20      COUNT(s.span_id) AS active_spans\n\
             FROM series\n\
             LEFT JOIN spans s\n\
             \x20      ON s.started_at <= series.ts\n\
             \x20     AND COALESCE(s.ended_at, CAST(? AS TIMESTAMP)) > series.ts\n\
             GROUP BY series.ts\n\
             ORDER BY series.ts"
        ),
        params,
    })
}

/// The most frequent error signatures in the window, grouped by
/// bounded prefix, descending with a stable label tie-break.
fn top_errors_query(start: Option<DateTime<Utc>>) -> QuerySpec {
    let (filter, params) = match start {
        Some(start) => (" AND started_at >= ?", vec![rfc3339(start)]),
        None => ("", Vec::new()),
    };
    QuerySpec {
        columns: &["error_head", "n"],
        sql: format!(
            "SELECT substr(error, 1, {len}) AS error_head, COUNT(*) AS n\n\
             FROM spans\n\
             WHERE error IS NOT NULL AND error <> ''{filter}\n\
             GROUP BY 1\n\
             ORDER BY n DESC, error_head ASC\n\
             LIMIT {limit}",
            len = ERROR_PREFIX_LEN,
            limit = TOP_ERRORS_LIMIT,
        ),
        params,
    }
}

/// Histogram of span-count-per-trace in fixed-width ranges. The
/// unbounded window counts zero-span traces too (LEFT JOIN from
/// traces); bounded windows count traces with at least one span
/// started in the window, since an empty trace has no timestamp to
/// place.
fn trace_sizes_query(start: Option<DateTime<Utc>>) -> QuerySpec {
    let width = TRACE_SIZE_BUCKET_WIDTH;
    let cap = TRACE_SIZE_BUCKET_CAP;
    let (counts, params) = match start {
        Some(start) => (
            "counts AS (\n\
             \x20   SELECT trace_id, COUNT(*) AS n_spans\n\
             \x20   FROM spans\n\
             \x20   WHERE started_at >= ?\n\
             \x20   GROUP BY 1\n\
             )"
                .to_string(),
            vec![rfc3339(start)],
        ),
        None => (
            "counts AS (\n\
             \x20   SELECT t.trace_id, COUNT(s.span_id) AS n_spans\n\
             \x20   FROM traces t\n\
             \x20   LEFT JOIN spans s ON s.trace_id = t.trace_id\n\
             \x20   GROUP BY 1\n\
             )"
                .to_string(),
            Vec::new(),
        ),
    };
    QuerySpec {
        columns: &["bucket_label", "traces_in_bucket"],
        sql: format!(
            "WITH {counts},\n\
             dist AS (\n\
             \x20   SELECT LEAST({cap}, (n_spans // {width}) + 1) AS bkt,\n\
             \x20          COUNT(*) AS traces_in_bucket\n\
             \x20   FROM counts\n\
             \x20   GROUP BY 1\n\
             )\n\
             SELECT '[' || CAST((bkt - 1) * {width} AS VARCHAR) || '-' || CAST(bkt * {width} AS VARCHAR) || ']' AS bucket_label,\n\
             \x20      traces_in_bucket\n\
             FROM dist\n\
             ORDER BY bkt"
        ),
        params,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThroughputPoint {
    pub ts: String,
    pub spans_started: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LatencyPoint {
    pub ts: String,
    pub avg_ms: f64,
    pub p95_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorRatePoint {
    pub ts: String,
    pub errors: i64,
    pub total: i64,
    pub error_rate_pct: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConcurrencyPoint {
    pub ts: String,
    pub active_spans: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorSignature {
    pub error_head: String,
    pub n: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TraceSizeBucket {
    pub bucket_label: String,
    pub traces_in_bucket: i64,
}

/// All six aggregate results for one window selection. Queries in a
/// batch fail or succeed together; a partial bundle is never built.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalyticsResponse {
    pub window: TimeWindowKey,
    pub generated_at: DateTime<Utc>,
    pub throughput: Vec<ThroughputPoint>,
    pub latency: Vec<LatencyPoint>,
    pub error_rate: Vec<ErrorRatePoint>,
    pub concurrency: Vec<ConcurrencyPoint>,
    pub top_errors: Vec<ErrorSignature>,
    pub trace_sizes: Vec<TraceSizeBucket>,
}

/// The label/value shape the chart renderer consumes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChartSeries {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

impl AnalyticsResponse {
    pub fn throughput_series(&self) -> ChartSeries {
        ChartSeries {
            labels: self.throughput.iter().map(|p| p.ts.clone()).collect(),
            values: self
                .throughput
                .iter()
                .map(|p| p.spans_started as f64)
                .collect(),
        }
    }

    pub fn avg_latency_series(&self) -> ChartSeries {
        ChartSeries {
            labels: self.latency.iter().map(|p| p.ts.clone()).collect(),
            values: self.latency.iter().map(|p| p.avg_ms).collect(),
        }
    }

    pub fn p95_latency_series(&self) -> ChartSeries {
        ChartSeries {
            labels: self.latency.iter().map(|p| p.ts.clone()).collect(),
            values: self.latency.iter().map(|p| p.p95_ms).collect(),
        }
    }

    pub fn error_rate_series(&self) -> ChartSeries {
        ChartSeries {
            labels: self.error_rate.iter().map(|p| p.ts.clone()).collect(),
            values: self.error_rate.iter().map(|p| p.error_rate_pct).collect(),
        }
    }

    pub fn concurrency_series(&self) -> ChartSeries {
        ChartSeries {
            labels: self.concurrency.iter().map(|p| p.ts.clone()).collect(),
            values: self
                .concurrency
                .iter()
                .map(|p| p.active_spans as f64)
                .collect(),
        }
    }

    pub fn top_errors_series(&self) -> ChartSeries {
        ChartSeries {
            labels: self
                .top_errors
                .iter()
                .map(|e| {
                    if e.error_head.is_empty() {
                        "(empty)".to_string()
                    } else {
                        e.error_head.clone()
                    }
                })
                .collect(),
            values: self.top_errors.iter().map(|e| e.n as f64).collect(),
        }
    }

    pub fn trace_sizes_series(&self) -> ChartSeries {
        ChartSeries {
            labels: self
                .trace_sizes
                .iter()
                .map(|b| b.bucket_label.clone())
                .collect(),
            values: self
                .trace_sizes
                .iter()
                .map(|b| b.traces_in_bucket as f64)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::window::TimeWindowKey;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 1, 10, 37, 42).unwrap()
    }

    #[test]
    fn bounded_windows_bind_the_lower_bound() {
        let q = build_queries(TimeWindowKey::LastDay, now()).unwrap();
        let expected = (now() - chrono::Duration::hours(24)).to_rfc3339();
        assert_eq!(q.throughput.params, vec![expected.clone()]);
        assert_eq!(q.latency.params, vec![expected.clone()]);
        assert_eq!(q.error_rate.params, vec![expected.clone()]);
        assert_eq!(q.top_errors.params, vec![expected.clone()]);
        assert_eq!(q.trace_sizes.params, vec![expected]);
    }

    #[test]
    fn all_time_has_no_lower_bound() {
        let q = build_queries(TimeWindowKey::All, now()).unwrap();
        assert!(q.throughput.params.is_empty());
        assert!(q.latency.params.is_empty());
        assert!(q.top_errors.params.is_empty());
        assert!(q.trace_sizes.params.is_empty());
        assert!(!q.throughput.sql.contains("WHERE"));
    }

    #[test]
    fn concurrency_series_start_is_bucket_floored() {
        let q = build_queries(TimeWindowKey::LastHour, now()).unwrap();
        // 09:37:42 floored to the minute
        assert_eq!(
            q.concurrency.params[0],
            Utc.with_ymd_and_hms(2026, 2, 1, 9, 37, 0).unwrap().to_rfc3339()
        );
        assert_eq!(q.concurrency.params.len(), 3);
        assert!(q.concurrency.sql.contains("LEFT JOIN spans"));
    }

    #[test]
    fn all_time_concurrency_resolves_start_in_query() {
        let q = build_queries(TimeWindowKey::All, now()).unwrap();
        assert!(q.concurrency.sql.contains("MIN(started_at)"));
        assert_eq!(q.concurrency.params, vec![now().to_rfc3339(); 3]);
    }

    #[test]
    fn p95_uses_the_ceiling_rank() {
        let q = build_queries(TimeWindowKey::LastWeek, now()).unwrap();
        assert!(q.latency.sql.contains("ceil(cnt * 95.0 / 100.0)"));
        assert!(q.latency.sql.contains("COALESCE(MAX(p95.p95_ms), AVG(d.ms))"));
    }

    #[test]
    fn bucket_format_follows_the_window() {
        let minute = build_queries(TimeWindowKey::LastHour, now()).unwrap();
        let hour = build_queries(TimeWindowKey::LastWeek, now()).unwrap();
        assert!(minute.throughput.sql.contains("%Y-%m-%d %H:%M:00"));
        assert!(hour.throughput.sql.contains("%Y-%m-%d %H:00:00"));
    }

    #[test]
    fn declared_columns_match_the_selects() {
        let q = build_queries(TimeWindowKey::LastDay, now()).unwrap();
        for (spec, last) in [
            (&q.throughput, "spans_started"),
            (&q.latency, "p95_ms"),
            (&q.error_rate, "error_rate_pct"),
            (&q.concurrency, "active_spans"),
            (&q.top_errors, "n"),
            (&q.trace_sizes, "traces_in_bucket"),
        ] {
            assert_eq!(*spec.columns.last().unwrap(), last);
            for col in spec.columns {
                assert!(spec.sql.contains(col), "{col} missing from sql");
            }
        }
    }

    #[test]
    fn params_are_timestamps_not_identifiers() {
        let q = build_queries(TimeWindowKey::LastMonth, now()).unwrap();
        for spec in [
            &q.throughput,
            &q.latency,
            &q.error_rate,
            &q.concurrency,
            &q.top_errors,
            &q.trace_sizes,
        ] {
            for p in &spec.params {
                assert!(DateTime::parse_from_rfc3339(p).is_ok());
            }
        }
    }
}
