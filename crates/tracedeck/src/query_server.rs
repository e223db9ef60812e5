use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, UnixListener};
use tracedeck_core::analytics::{AnalyticsResponse, build_queries};
use tracedeck_core::error::{Result, TracedeckError};
use tracedeck_core::query::{SpanRequest, SpanResponse, TraceRequest, TraceResponse};
use tracedeck_core::window::TimeWindowKey;
use tracedeck_store::Store;

use crate::protocol::{ApiRequest, ApiResponse};

pub async fn run_query_server(
    store: Store,
    uds_path: PathBuf,
    tcp_addr: SocketAddr,
) -> anyhow::Result<()> {
    if let Some(parent) = uds_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .context("create uds parent dir")?;
    }

    if tokio::fs::metadata(&uds_path).await.is_ok() {
        let _ = tokio::fs::remove_file(&uds_path).await;
    }

    let uds_listener = UnixListener::bind(&uds_path).context("bind UDS query listener")?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = tokio::fs::metadata(&uds_path).await?.permissions();
        perms.set_mode(0o600);
        tokio::fs::set_permissions(&uds_path, perms).await?;
    }
    let tcp_listener = TcpListener::bind(tcp_addr)
        .await
        .context("bind TCP query listener")?;

    let uds_task = tokio::spawn(run_uds_loop(uds_listener, store.clone()));
    let tcp_task = tokio::spawn(run_tcp_loop(tcp_listener, store));

    tokio::select! {
        res = uds_task => {
            res??;
        }
        res = tcp_task => {
            res??;
        }
    }

    Ok(())
}

async fn run_uds_loop(listener: UnixListener, store: Store) -> anyhow::Result<()> {
    loop {
        let (stream, _) = listener.accept().await?;
        let store = store.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_stream(BufReader::new(stream), store).await {
                tracing::warn!(error = ?err, "uds client request failed");
            }
        });
    }
}

async fn run_tcp_loop(listener: TcpListener, store: Store) -> anyhow::Result<()> {
    loop {
        let (stream, _) = listener.accept().await?;
        let store = store.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_stream(BufReader::new(stream), store).await {
                tracing::warn!(error = ?err, "tcp client request failed");
            }
        });
    }
}

async fn handle_stream<T>(mut stream: BufReader<T>, store: Store) -> anyhow::Result<()>
where
    T: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        let n = stream.read_line(&mut line).await?;
        if n == 0 {
            return Ok(());
        }

        let req: ApiRequest = serde_json::from_str(&line)?;
        let response = handle_request(req, &store).await;
        let payload = serde_json::to_vec(&response)?;
        stream.get_mut().write_all(&payload).await?;
        stream.get_mut().write_all(b"\n").await?;
        stream.get_mut().flush().await?;
    }
}

async fn handle_request(req: ApiRequest, store: &Store) -> ApiResponse {
    let resp = match req {
        ApiRequest::Traces(r) => store.list_traces(&r).map(ApiResponse::Traces),
        ApiRequest::Trace(r) => get_trace(store, &r),
        ApiRequest::Span(r) => get_span(store, &r),
        ApiRequest::Charts(r) => run_charts(store.clone(), r.window).await,
        ApiRequest::Filters => store.list_filter_values().map(ApiResponse::Filters),
        ApiRequest::Status => store.status().map(ApiResponse::Status),
    };

    resp.unwrap_or_else(|e| ApiResponse::Error(e.to_string()))
}

fn get_trace(store: &Store, req: &TraceRequest) -> Result<ApiResponse> {
    let Some(trace) = store.fetch_trace(&req.trace_id)? else {
        return Ok(ApiResponse::NotFound(format!(
            "trace not found: {}",
            req.trace_id
        )));
    };
    let spans = store.fetch_spans(&req.trace_id)?;
    Ok(ApiResponse::Trace(TraceResponse { trace, spans }))
}

fn get_span(store: &Store, req: &SpanRequest) -> Result<ApiResponse> {
    let spans = store.fetch_spans(&req.trace_id)?;
    match spans.into_iter().find(|s| s.span_id == req.span_id) {
        Some(span) => Ok(ApiResponse::Span(SpanResponse { span })),
        None => Ok(ApiResponse::NotFound(format!(
            "span not found: {} in trace {}",
            req.span_id, req.trace_id
        ))),
    }
}

/// The six chart aggregates are built against one shared `now`, then
/// executed concurrently. Any single failure fails the whole batch so
/// the dashboard never renders a half-updated set.
async fn run_charts(store: Store, window: TimeWindowKey) -> Result<ApiResponse> {
    let now = Utc::now();
    let queries = build_queries(window, now)?;

    let throughput = {
        let store = store.clone();
        let spec = queries.throughput;
        tokio::task::spawn_blocking(move || store.run_throughput(&spec))
    };
    let latency = {
        let store = store.clone();
        let spec = queries.latency;
        tokio::task::spawn_blocking(move || store.run_latency(&spec))
    };
    let error_rate = {
        let store = store.clone();
        let spec = queries.error_rate;
        tokio::task::spawn_blocking(move || store.run_error_rate(&spec))
    };
    let concurrency = {
        let store = store.clone();
        let spec = queries.concurrency;
        tokio::task::spawn_blocking(move || store.run_concurrency(&spec))
    };
    let top_errors = {
        let store = store.clone();
        let spec = queries.top_errors;
        tokio::task::spawn_blocking(move || store.run_top_errors(&spec))
    };
    let trace_sizes = {
        let store = store.clone();
        let spec = queries.trace_sizes;
        tokio::task::spawn_blocking(move || store.run_trace_sizes(&spec))
    };

    let (throughput, latency, error_rate, concurrency, top_errors, trace_sizes) = tokio::try_join!(
        throughput,
        latency,
        error_rate,
        concurrency,
        top_errors,
        trace_sizes
    )
    .map_err(|e| TracedeckError::Internal(format!("charts task failed: {e}")))?;

    Ok(ApiResponse::Charts(AnalyticsResponse {
        window,
        generated_at: now,
        throughput: throughput?,
        latency: latency?,
        error_rate: error_rate?,
        concurrency: concurrency?,
        top_errors: top_errors?,
        trace_sizes: trace_sizes?,
    }))
}
