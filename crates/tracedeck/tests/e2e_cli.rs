use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::time::Duration;

use tracedeck_store::Store;
use tracedeck_testkit::sample_trace;

fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn bin() -> &'static str {
    env!("CARGO_BIN_EXE_tracedeck")
}

fn seed_db(db_path: &Path) {
    let store = Store::open(db_path).unwrap();
    let (trace, spans) = sample_trace("trace_1");
    store.insert_traces(&[trace]).unwrap();
    store.insert_spans(&spans).unwrap();
    // the server needs the duckdb file lock
    drop(store);
}

fn spawn_server(temp: &Path) -> (Child, PathBuf) {
    let query_port = free_port();
    let db_path = temp.join("tracedeck.duckdb");
    let uds_path = temp.join("tracedeck.sock");

    seed_db(&db_path);

    let child = Command::new(bin())
        .arg("run")
        .arg("--db-path")
        .arg(&db_path)
        .arg("--query-tcp-addr")
        .arg(format!("127.0.0.1:{query_port}"))
        .arg("--query-uds-path")
        .arg(&uds_path)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    (child, uds_path)
}

fn cli(uds: &Path, args: &[&str]) -> Output {
    Command::new(bin())
        .arg("--uds")
        .arg(uds)
        .args(args)
        .output()
        .unwrap()
}

fn wait_ready(uds: &Path, child: &mut Child) {
    for _ in 0..100 {
        assert!(child.try_wait().unwrap().is_none(), "tracedeck exited early");
        let out = cli(uds, &["status", "--json"]);
        if out.status.success() {
            return;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    panic!("query server never became ready");
}

fn json_response(out: &Output) -> serde_json::Value {
    assert!(
        out.status.success(),
        "cli failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    serde_json::from_slice(&out.stdout).unwrap()
}

#[test]
fn query_surface_end_to_end() {
    let temp = tempfile::tempdir().unwrap();
    let (mut child, uds) = spawn_server(temp.path());
    wait_ready(&uds, &mut child);

    let status = json_response(&cli(&uds, &["status", "--json"]));
    assert_eq!(status["Status"]["traces_count"], 1);
    assert_eq!(status["Status"]["spans_count"], 4);

    let traces = json_response(&cli(&uds, &["traces", "--json"]));
    assert_eq!(traces["Traces"][0]["trace_id"], "trace_1");
    assert_eq!(traces["Traces"][0]["span_count"], 4);

    let filtered = json_response(&cli(&uds, &["traces", "--json", "--workflow", "nomatch*"]));
    assert_eq!(filtered["Traces"].as_array().unwrap().len(), 0);

    let trace = json_response(&cli(&uds, &["trace", "trace_1", "--json"]));
    assert_eq!(trace["Trace"]["trace"]["workflow_name"], "checkout");
    assert_eq!(trace["Trace"]["spans"].as_array().unwrap().len(), 4);

    let span = json_response(&cli(&uds, &["span", "trace_1", "charge", "--json"]));
    assert_eq!(span["Span"]["span"]["error"], "upstream timeout");

    let filters = json_response(&cli(&uds, &["filters", "--json"]));
    assert_eq!(filters["Filters"]["workflows"][0], "checkout");

    let charts = json_response(&cli(&uds, &["charts", "--json", "--window", "all"]));
    assert_eq!(charts["Charts"]["window"], "All");
    assert_eq!(charts["Charts"]["top_errors"][0]["error_head"], "upstream timeout");
    assert_eq!(charts["Charts"]["trace_sizes"][0]["bucket_label"], "[0-50]");

    child.kill().unwrap();
    let _ = child.wait();
}

#[test]
fn missing_trace_falls_back_to_the_list() {
    let temp = tempfile::tempdir().unwrap();
    let (mut child, uds) = spawn_server(temp.path());
    wait_ready(&uds, &mut child);

    let out = cli(&uds, &["trace", "no_such_trace", "--json"]);
    let value = json_response(&out);
    assert!(value.get("Traces").is_some(), "expected trace list fallback");
    assert!(String::from_utf8_lossy(&out.stderr).contains("trace not found"));

    let open = json_response(&cli(&uds, &["open", "/traces/no_such_trace", "--json"]));
    assert!(open.get("Traces").is_some());

    let open_charts = json_response(&cli(&uds, &["open", "/charts", "--json"]));
    assert!(open_charts.get("Charts").is_some());

    child.kill().unwrap();
    let _ = child.wait();
}
