use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use futures::StreamExt;
use serde_json::json;
use serial_test::serial;
use tokio_tungstenite::tungstenite::Message;

fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn bin() -> &'static str {
    env!("CARGO_BIN_EXE_logdock")
}

struct Server {
    child: Child,
    http_port: u16,
    query_port: u16,
    data_path: PathBuf,
    uds_path: PathBuf,
}

impl Drop for Server {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn spawn_server(temp: &Path, retention_cap: Option<usize>) -> Server {
    let http_port = free_port();
    let query_port = free_port();
    let data_path = temp.join("logs.json");
    let uds_path = temp.join("logdock.sock");

    let mut cmd = Command::new(bin());
    cmd.arg("run")
        .arg("--data-path")
        .arg(&data_path)
        .arg("--http-addr")
        .arg(format!("127.0.0.1:{http_port}"))
        .arg("--query-tcp-addr")
        .arg(format!("127.0.0.1:{query_port}"))
        .arg("--query-uds-path")
        .arg(&uds_path)
        .env("LOGDOCK_CONFIG", temp.join("missing.toml"))
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    if let Some(cap) = retention_cap {
        cmd.arg("--retention-cap").arg(cap.to_string());
    }

    Server {
        child: cmd.spawn().unwrap(),
        http_port,
        query_port,
        data_path,
        uds_path,
    }
}

async fn wait_http_ready(server: &mut Server) {
    let client = reqwest::Client::new();
    let mut ready = false;
    for _ in 0..100 {
        assert!(
            server.child.try_wait().unwrap().is_none(),
            "logdock exited early"
        );
        if let Ok(resp) = client
            .get(format!("http://127.0.0.1:{}/health", server.http_port))
            .send()
            .await
            && resp.status().is_success()
        {
            ready = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(ready, "http endpoint not ready");
}

async fn wait_query_ready(server: &Server) {
    for _ in 0..100 {
        if tokio::net::TcpStream::connect(("127.0.0.1", server.query_port))
            .await
            .is_ok()
        {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("query endpoint not ready");
}

fn db_failure() -> serde_json::Value {
    json!({
        "level": "error",
        "message": "Database connection failed",
        "resourceId": "db-server-01",
        "timestamp": "2024-01-01T10:00:00Z",
        "traceId": "trace-001",
        "spanId": "span-001",
        "commit": "abc123",
        "metadata": {"retryCount": 3}
    })
}

async fn post(port: u16, body: &serde_json::Value) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("http://127.0.0.1:{port}/logs"))
        .json(body)
        .send()
        .await
        .unwrap()
}

#[tokio::test]
#[serial]
async fn e2e_http_ingest_and_cli_query() {
    let temp = tempfile::tempdir().unwrap();
    let mut server = spawn_server(temp.path(), None);
    wait_http_ready(&mut server).await;
    wait_query_ready(&server).await;

    let resp = post(server.http_port, &db_failure()).await;
    assert_eq!(resp.status(), reqwest::StatusCode::CREATED);
    let stored: serde_json::Value = resp.json().await.unwrap();
    assert!(stored["id"].as_str().is_some_and(|id| !id.is_empty()));
    assert!(stored["ingestedAt"].is_string());

    let output = Command::new(bin())
        .arg("query")
        .arg("--level")
        .arg("error")
        .arg("--message")
        .arg("DATABASE")
        .arg("--addr")
        .arg(format!("127.0.0.1:{}", server.query_port))
        .output()
        .unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("Database connection failed"));
    assert!(stdout.contains("-- 1 matches --"));

    let output = Command::new(bin())
        .arg("query")
        .arg("--level")
        .arg("warn")
        .arg("--uds")
        .arg(&server.uds_path)
        .output()
        .unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("-- 0 matches --"));
}

#[tokio::test]
#[serial]
async fn e2e_rejections_and_status_json_shape() {
    let temp = tempfile::tempdir().unwrap();
    let mut server = spawn_server(temp.path(), None);
    wait_http_ready(&mut server).await;
    wait_query_ready(&server).await;

    let mut missing = db_failure();
    missing.as_object_mut().unwrap().remove("commit");
    let resp = post(server.http_port, &missing).await;
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("commit"));

    let mut bad_level = db_failure();
    bad_level["level"] = json!("critical");
    let resp = post(server.http_port, &bad_level).await;
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);

    post(server.http_port, &db_failure()).await;

    let status = Command::new(bin())
        .arg("--json")
        .arg("status")
        .arg("--addr")
        .arg(format!("127.0.0.1:{}", server.query_port))
        .output()
        .unwrap();
    let value: serde_json::Value = serde_json::from_slice(&status.stdout).unwrap();
    assert_eq!(value["Status"]["logsCount"], json!(1));
    assert_eq!(value["Status"]["retentionCap"], json!(1000));
}

#[tokio::test]
#[serial]
async fn e2e_cli_ingest_from_file() {
    let temp = tempfile::tempdir().unwrap();
    let mut server = spawn_server(temp.path(), None);
    wait_http_ready(&mut server).await;

    let mut second = db_failure();
    second["message"] = json!("Replica lag");
    let input = temp.path().join("batch.json");
    std::fs::write(&input, serde_json::to_vec(&json!([db_failure(), second])).unwrap()).unwrap();

    let output = Command::new(bin())
        .arg("ingest")
        .arg(&input)
        .arg("--http-addr")
        .arg(format!("127.0.0.1:{}", server.http_port))
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().filter(|l| l.starts_with("stored ")).count(), 2);

    let logs: serde_json::Value = reqwest::get(format!(
        "http://127.0.0.1:{}/logs?resourceId=db-server-01",
        server.http_port
    ))
    .await
    .unwrap()
    .json()
    .await
    .unwrap();
    assert_eq!(logs.as_array().unwrap().len(), 2);
}

#[tokio::test]
#[serial]
async fn e2e_websocket_receives_ingested_record() {
    let temp = tempfile::tempdir().unwrap();
    let mut server = spawn_server(temp.path(), None);
    wait_http_ready(&mut server).await;

    let (mut ws, _) =
        tokio_tungstenite::connect_async(format!("ws://127.0.0.1:{}/ws", server.http_port))
            .await
            .unwrap();
    // Give the server a moment to register the subscription.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let stored: serde_json::Value = post(server.http_port, &db_failure())
        .await
        .json()
        .await
        .unwrap();

    let frame = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => return text,
                Some(Ok(_)) => continue,
                other => panic!("websocket ended: {other:?}"),
            }
        }
    })
    .await
    .unwrap();

    let event: serde_json::Value = serde_json::from_str(&frame).unwrap();
    assert_eq!(event["kind"], json!("logIngested"));
    assert_eq!(event["totalCount"], json!(1));
    assert_eq!(event["record"], stored);
}

#[tokio::test]
#[serial]
async fn e2e_records_survive_restart() {
    let temp = tempfile::tempdir().unwrap();
    let data_path;
    {
        let mut server = spawn_server(temp.path(), None);
        wait_http_ready(&mut server).await;
        post(server.http_port, &db_failure()).await;
        data_path = server.data_path.clone();
    }

    let raw: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&data_path).unwrap()).unwrap();
    assert_eq!(raw["logs"].as_array().unwrap().len(), 1);

    let mut server = spawn_server(temp.path(), None);
    wait_http_ready(&mut server).await;
    let logs: serde_json::Value =
        reqwest::get(format!("http://127.0.0.1:{}/logs", server.http_port))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
    assert_eq!(logs[0]["message"], json!("Database connection failed"));
}

#[test]
fn query_without_server_fails() {
    let output = Command::new(bin())
        .arg("query")
        .arg("--addr")
        .arg("127.0.0.1:1")
        .env_remove("LOGDOCK_QUERY_UDS_PATH")
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("connect query server"));
}
