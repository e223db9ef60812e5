pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS traces (
  id BIGINT PRIMARY KEY,
  trace_id TEXT NOT NULL,
  workflow_name TEXT NOT NULL,
  group_id TEXT NOT NULL,
  metadata TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS spans (
  id BIGINT PRIMARY KEY,
  span_id TEXT NOT NULL,
  trace_id TEXT NOT NULL,
  parent_id TEXT,
  started_at TIMESTAMP NOT NULL,
  ended_at TIMESTAMP,
  span_data TEXT NOT NULL,
  error TEXT
);

CREATE SEQUENCE IF NOT EXISTS traces_id_seq;
CREATE SEQUENCE IF NOT EXISTS spans_id_seq;

CREATE INDEX IF NOT EXISTS idx_traces_trace ON traces(trace_id);
CREATE INDEX IF NOT EXISTS idx_traces_workflow ON traces(workflow_name);

CREATE INDEX IF NOT EXISTS idx_spans_trace ON spans(trace_id);
CREATE INDEX IF NOT EXISTS idx_spans_parent ON spans(parent_id);
CREATE INDEX IF NOT EXISTS idx_spans_started ON spans(started_at);
"#;
