use std::net::SocketAddr;

use logdock_core::error::{LogdockError, Result};
use tokio::net::TcpListener;

use crate::http::{AppState, router};

pub async fn run_http_server(state: AppState, addr: SocketAddr) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| LogdockError::Io(format!("failed to bind HTTP listener {addr}: {e}")))?;
    serve(listener, state).await
}

pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    axum::serve(listener, router(state))
        .await
        .map_err(|e| LogdockError::Server(format!("HTTP server failed: {e}")))
}
