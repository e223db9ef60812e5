use duckdb::params;
use tracedeck_core::error::{Result, TracedeckError};
use tracedeck_core::model::span::SpanRecord;
use tracedeck_core::model::trace::TraceRecord;

use crate::Store;

impl Store {
    pub fn insert_traces(&self, traces: &[TraceRecord]) -> Result<()> {
        if traces.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .map_err(|e| TracedeckError::Store(format!("begin tx failed: {e}")))?;

        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO traces (id, trace_id, workflow_name, group_id, metadata)
                     VALUES (nextval('traces_id_seq'), ?, ?, ?, ?)",
                )
                .map_err(|e| TracedeckError::Store(format!("prepare insert traces failed: {e}")))?;

            for trace in traces {
                stmt.execute(params![
                    trace.trace_id,
                    trace.workflow_name,
                    trace.group_id,
                    trace.metadata_json,
                ])
                .map_err(|e| TracedeckError::Store(format!("insert trace failed: {e}")))?;
            }
        }

        tx.commit()
            .map_err(|e| TracedeckError::Store(format!("commit traces failed: {e}")))
    }

    pub fn insert_spans(&self, spans: &[SpanRecord]) -> Result<()> {
        if spans.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .map_err(|e| TracedeckError::Store(format!("begin tx failed: {e}")))?;

        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO spans (id, span_id, trace_id, parent_id, started_at, ended_at, span_data, error)
                     VALUES (nextval('spans_id_seq'), ?, ?, ?, ?, ?, ?, ?)",
                )
                .map_err(|e| TracedeckError::Store(format!("prepare insert spans failed: {e}")))?;

            for span in spans {
                stmt.execute(params![
                    span.span_id,
                    span.trace_id,
                    span.parent_id,
                    span.started_at.to_rfc3339(),
                    span.ended_at.map(|ts| ts.to_rfc3339()),
                    span.span_data_json,
                    span.error,
                ])
                .map_err(|e| TracedeckError::Store(format!("insert span failed: {e}")))?;
            }
        }

        tx.commit()
            .map_err(|e| TracedeckError::Store(format!("commit spans failed: {e}")))
    }
}
