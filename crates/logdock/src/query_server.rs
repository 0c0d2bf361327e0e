use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use logdock_ingest::Broadcaster;
use logdock_store::Store;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, UnixListener};

use crate::protocol::{ApiRequest, ApiResponse};

#[derive(Clone)]
pub(crate) struct QueryContext {
    pub(crate) store: Store,
    pub(crate) broadcaster: Broadcaster,
}

pub async fn run_query_server(
    store: Store,
    broadcaster: Broadcaster,
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

    let ctx = QueryContext { store, broadcaster };
    let uds_task = tokio::spawn(run_uds_loop(uds_listener, ctx.clone()));
    let tcp_task = tokio::spawn(run_tcp_loop(tcp_listener, ctx));

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

async fn run_uds_loop(listener: UnixListener, ctx: QueryContext) -> anyhow::Result<()> {
    loop {
        let (stream, _) = listener.accept().await?;
        let ctx = ctx.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_stream(BufReader::new(stream), ctx).await {
                tracing::warn!(error = ?err, "uds client request failed");
            }
        });
    }
}

pub(crate) async fn run_tcp_loop(listener: TcpListener, ctx: QueryContext) -> anyhow::Result<()> {
    loop {
        let (stream, _) = listener.accept().await?;
        let ctx = ctx.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_stream(BufReader::new(stream), ctx).await {
                tracing::warn!(error = ?err, "tcp client request failed");
            }
        });
    }
}

/// Serves requests until the client closes its side.
async fn handle_stream<T>(mut stream: BufReader<T>, ctx: QueryContext) -> anyhow::Result<()>
where
    T: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    loop {
        let mut line = String::new();
        let n = stream.read_line(&mut line).await?;
        if n == 0 {
            return Ok(());
        }
        if line.trim().is_empty() {
            continue;
        }

        let response = respond(&line, &ctx);
        let payload = serde_json::to_vec(&response)?;
        stream.get_mut().write_all(&payload).await?;
        stream.get_mut().write_all(b"\n").await?;
        stream.get_mut().flush().await?;
    }
}

fn respond(line: &str, ctx: &QueryContext) -> ApiResponse {
    match serde_json::from_str::<ApiRequest>(line) {
        Ok(req) => handle_request(req, ctx),
        Err(e) => ApiResponse::Error(format!("invalid request: {e}")),
    }
}

fn handle_request(req: ApiRequest, ctx: &QueryContext) -> ApiResponse {
    match req {
        ApiRequest::Query(criteria) => ApiResponse::Query(ctx.store.search(&criteria)),
        ApiRequest::Status => {
            let mut status = ctx.store.status();
            status.subscribers = ctx.broadcaster.subscriber_count();
            ApiResponse::Status(status)
        }
    }
}
