mod client;
mod output;
mod protocol;
mod query_server;
mod telemetry;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracedeck_core::config::Config;
use tracedeck_core::filter::TraceFilter;
use tracedeck_core::query::{ChartsRequest, SpanRequest, TraceRequest, TracesRequest};
use tracedeck_core::view::{DashboardView, ViewAction, ViewState};
use tracedeck_core::window::TimeWindowKey;

use crate::client::QueryClient;
use crate::output::{
    print_charts_human, print_filters_human, print_span_human, print_status_human,
    print_trace_human, print_traces_human,
};
use crate::protocol::{ApiRequest, ApiResponse};
use crate::telemetry::{init_cli_tracing, init_run_tracing};

#[derive(Parser, Debug)]
#[command(name = "tracedeck")]
#[command(about = "Local dashboard core for agent trace inspection and analytics")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true)]
    json: bool,

    #[arg(long, global = true)]
    uds: Option<PathBuf>,

    #[arg(long, global = true)]
    addr: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Run the query server over the trace store")]
    Run {
        #[arg(long)]
        db_path: Option<PathBuf>,
        #[arg(long)]
        query_tcp_addr: Option<String>,
        #[arg(long)]
        query_uds_path: Option<PathBuf>,
    },
    #[command(about = "List traces, newest first")]
    Traces {
        #[arg(long, help = "Workflow name glob, e.g. 'checkout*'")]
        workflow: Option<String>,
        #[arg(long, help = "Group id glob")]
        group: Option<String>,
        #[arg(long = "trace", help = "Exact trace id (repeatable)")]
        trace_ids: Vec<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
    #[command(about = "Inspect one trace as an ordered span tree")]
    Trace { trace_id: String },
    #[command(about = "Inspect a specific span")]
    Span { trace_id: String, span_id: String },
    #[command(about = "Windowed analytics over the span store")]
    Charts {
        #[arg(long, help = "One of: 1h, 24h, 7d, 30d, all")]
        window: Option<TimeWindowKey>,
    },
    #[command(about = "List distinct filterable values")]
    Filters,
    #[command(about = "Show store path, size, and span counts")]
    Status,
    #[command(about = "Resolve a dashboard deep link, e.g. /traces/<id> or /charts")]
    Open { path: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            db_path,
            query_tcp_addr,
            query_uds_path,
        } => run_server(db_path, query_tcp_addr, query_uds_path).await,
        Commands::Traces {
            workflow,
            group,
            trace_ids,
            limit,
        } => {
            init_cli_tracing();
            let cfg = Config::load()?;
            let mut client = QueryClient::connect(cli.uds, cli.addr).await?;
            let req = traces_request(workflow, group, trace_ids, limit, &cfg);
            let response = client.request(ApiRequest::Traces(req)).await?;
            print_response(response, cli.json)
        }
        Commands::Trace { trace_id } => {
            init_cli_tracing();
            let cfg = Config::load()?;
            let mut client = QueryClient::connect(cli.uds, cli.addr).await?;
            let response = client
                .request(ApiRequest::Trace(TraceRequest { trace_id }))
                .await?;
            match response {
                // a stale or mistyped id lands back on the trace list
                ApiResponse::NotFound(msg) => {
                    eprintln!("{msg}; showing trace list");
                    let req = traces_request(None, None, Vec::new(), None, &cfg);
                    let response = client.request(ApiRequest::Traces(req)).await?;
                    print_response(response, cli.json)
                }
                other => print_response(other, cli.json),
            }
        }
        Commands::Span { trace_id, span_id } => {
            init_cli_tracing();
            let mut client = QueryClient::connect(cli.uds, cli.addr).await?;
            let response = client
                .request(ApiRequest::Span(SpanRequest { trace_id, span_id }))
                .await?;
            print_response(response, cli.json)
        }
        Commands::Charts { window } => {
            init_cli_tracing();
            let cfg = Config::load()?;
            let window = window.unwrap_or(cfg.default_window);
            let mut client = QueryClient::connect(cli.uds, cli.addr).await?;
            let response = client
                .request(ApiRequest::Charts(ChartsRequest { window }))
                .await?;
            print_response(response, cli.json)
        }
        Commands::Filters => {
            init_cli_tracing();
            let mut client = QueryClient::connect(cli.uds, cli.addr).await?;
            let response = client.request(ApiRequest::Filters).await?;
            print_response(response, cli.json)
        }
        Commands::Status => {
            init_cli_tracing();
            let mut client = QueryClient::connect(cli.uds, cli.addr).await?;
            let response = client.request(ApiRequest::Status).await?;
            print_response(response, cli.json)
        }
        Commands::Open { path } => {
            init_cli_tracing();
            run_open(&path, cli.uds, cli.addr, cli.json).await
        }
    }
}

/// Resolve a deep link the way the dashboard would: route the path to
/// a view transition, apply it, and run the fetch the new state asks
/// for. A link to a missing trace degrades to the trace list.
async fn run_open(
    path: &str,
    uds: Option<PathBuf>,
    addr: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let cfg = Config::load()?;
    let mut client = QueryClient::connect(uds, addr).await?;

    let mut state = ViewState::new(cfg.default_window);
    let mut token = state.apply(ViewAction::from_path(path));

    let mut response = match state.view {
        DashboardView::TraceDetail => {
            let trace_id = state
                .selected_trace
                .clone()
                .context("trace view without a selection")?;
            client.request(ApiRequest::Trace(TraceRequest { trace_id })).await?
        }
        DashboardView::Charts => {
            client
                .request(ApiRequest::Charts(ChartsRequest {
                    window: state.window,
                }))
                .await?
        }
        DashboardView::TraceList => {
            let req = traces_request(None, None, Vec::new(), None, &cfg);
            client.request(ApiRequest::Traces(req)).await?
        }
    };

    if let ApiResponse::NotFound(msg) = &response {
        eprintln!("{msg}; showing trace list");
        token = state.apply(ViewAction::ShowTraceList);
        let req = traces_request(None, None, Vec::new(), None, &cfg);
        response = client.request(ApiRequest::Traces(req)).await?;
    }

    // a result is only rendered for the selection that asked for it
    if token.is_some_and(|t| state.accepts(t)) {
        print_response(response, json)?;
    }
    Ok(())
}

async fn run_server(
    db_path: Option<PathBuf>,
    query_tcp_addr: Option<String>,
    query_uds_path: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut cfg = Config::load().context("load config")?;
    if let Some(v) = db_path {
        cfg.db_path = v;
    }
    if let Some(v) = query_tcp_addr {
        cfg.query_tcp_addr = v;
    }
    if let Some(v) = query_uds_path {
        cfg.uds_path = v;
    }

    init_run_tracing();
    let store = tracedeck_store::Store::open(&cfg.db_path)?;

    eprintln!("tracedeck run");
    eprintln!("  db: {}", cfg.db_path.display());
    eprintln!("  query uds: {}", cfg.uds_path.display());
    eprintln!("  query tcp: {}", cfg.query_tcp_addr);

    let query_task = tokio::spawn(query_server::run_query_server(
        store,
        cfg.uds_path.clone(),
        cfg.query_tcp_addr.parse()?,
    ));

    tokio::select! {
        res = query_task => {
            res??;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received ctrl-c, shutting down");
        }
    }

    Ok(())
}

fn traces_request(
    workflow: Option<String>,
    group: Option<String>,
    trace_ids: Vec<String>,
    limit: Option<usize>,
    cfg: &Config,
) -> TracesRequest {
    TracesRequest {
        filter: TraceFilter {
            workflow_glob: workflow,
            group_glob: group,
            trace_ids,
        },
        limit: limit.unwrap_or(cfg.trace_list_limit),
    }
}

fn print_response(response: ApiResponse, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    match response {
        ApiResponse::Traces(v) => print_traces_human(&v),
        ApiResponse::Trace(v) => print_trace_human(&v),
        ApiResponse::Span(v) => print_span_human(&v),
        ApiResponse::Charts(v) => print_charts_human(&v),
        ApiResponse::Filters(v) => print_filters_human(&v),
        ApiResponse::Status(v) => print_status_human(&v),
        ApiResponse::NotFound(msg) => eprintln!("not found: {msg}"),
        ApiResponse::Error(e) => eprintln!("error: {e}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn traces_request_defaults_come_from_config() {
        let cfg = Config::default();
        let req = traces_request(Some("check*".into()), None, Vec::new(), None, &cfg);
        assert_eq!(req.limit, cfg.trace_list_limit);
        assert_eq!(req.filter.workflow_glob.as_deref(), Some("check*"));

        let req = traces_request(None, None, Vec::new(), Some(5), &cfg);
        assert_eq!(req.limit, 5);
        assert!(req.filter.is_empty());
    }
}
