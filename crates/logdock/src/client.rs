use std::path::PathBuf;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpStream, UnixStream};

use crate::protocol::{ApiRequest, ApiResponse};

pub enum QueryClient {
    Uds(BufReader<UnixStream>),
    Tcp(BufReader<TcpStream>),
}

impl QueryClient {
    pub async fn connect(uds: Option<PathBuf>, addr: Option<String>) -> anyhow::Result<Self> {
        if let Some(path) = uds {
            let stream = UnixStream::connect(path)
                .await
                .context("connect UDS query server")?;
            return Ok(Self::Uds(BufReader::new(stream)));
        }

        if addr.is_none()
            && let Ok(path) = std::env::var("LOGDOCK_QUERY_UDS_PATH")
            && let Ok(stream) = UnixStream::connect(path).await
        {
            return Ok(Self::Uds(BufReader::new(stream)));
        }

        let addr = addr
            .or_else(|| std::env::var("LOGDOCK_QUERY_TCP_ADDR").ok())
            .unwrap_or_else(|| "127.0.0.1:3002".to_string());
        let stream = TcpStream::connect(&addr)
            .await
            .with_context(|| format!("connect query server TCP {addr}"))?;
        Ok(Self::Tcp(BufReader::new(stream)))
    }

    pub async fn request(&mut self, req: ApiRequest) -> anyhow::Result<ApiResponse> {
        let mut payload = serde_json::to_vec(&req)?;
        payload.push(b'\n');

        let mut line = String::new();
        match self {
            QueryClient::Uds(stream) => exchange(stream, &payload, &mut line).await?,
            QueryClient::Tcp(stream) => exchange(stream, &payload, &mut line).await?,
        }
        if line.is_empty() {
            anyhow::bail!("query server closed the connection");
        }
        Ok(serde_json::from_str(&line)?)
    }
}

async fn exchange<T>(
    stream: &mut BufReader<T>,
    payload: &[u8],
    line: &mut String,
) -> anyhow::Result<()>
where
    T: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    stream.get_mut().write_all(payload).await?;
    stream.get_mut().flush().await?;
    stream.read_line(line).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use logdock_core::filter::LogCriteria;
    use logdock_ingest::Broadcaster;
    use logdock_store::Store;
    use tokio::net::TcpListener;

    use super::*;
    use crate::query_server::{QueryContext, run_query_server, run_tcp_loop};

    fn seeded_store() -> Store {
        let store = Store::open_in_memory(1000).unwrap();
        for r in testkit::sample_records() {
            store.append(r).unwrap();
        }
        store
    }

    #[tokio::test]
    async fn tcp_client_reuses_one_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(run_tcp_loop(
            listener,
            QueryContext {
                store: seeded_store(),
                broadcaster: Broadcaster::new(4),
            },
        ));

        let mut client = QueryClient::connect(None, Some(addr.to_string()))
            .await
            .unwrap();
        assert!(matches!(client, QueryClient::Tcp(_)));

        let ApiResponse::Query(res) = client
            .request(ApiRequest::Query(LogCriteria {
                resource_id: Some("api-gateway".into()),
                message: Some("TIMEOUT".into()),
                ..LogCriteria::default()
            }))
            .await
            .unwrap()
        else {
            panic!("expected query response");
        };
        assert_eq!(res.total_matches, 1);
        assert_eq!(res.records[0].message, "Upstream timeout");

        let ApiResponse::Status(status) = client.request(ApiRequest::Status).await.unwrap() else {
            panic!("expected status response");
        };
        assert_eq!(status.logs_count, 5);
        assert_eq!(status.retention_cap, 1000);
    }

    #[tokio::test]
    async fn uds_client_reaches_running_query_server() {
        let dir = tempfile::tempdir().unwrap();
        let uds = dir.path().join("query.sock");
        let broadcaster = Broadcaster::new(4);
        let _sub = broadcaster.subscribe();
        tokio::spawn(run_query_server(
            seeded_store(),
            broadcaster.clone(),
            uds.clone(),
            "127.0.0.1:0".parse().unwrap(),
        ));

        let mut client = None;
        for _ in 0..100 {
            if let Ok(c) = QueryClient::connect(Some(uds.clone()), None).await {
                client = Some(c);
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let mut client = client.expect("query server socket never came up");
        assert!(matches!(client, QueryClient::Uds(_)));

        let ApiResponse::Status(status) = client.request(ApiRequest::Status).await.unwrap() else {
            panic!("expected status response");
        };
        assert_eq!(status.subscribers, 1);

        let ApiResponse::Query(res) = client
            .request(ApiRequest::Query(LogCriteria {
                level: Some("critical".into()),
                ..LogCriteria::default()
            }))
            .await
            .unwrap()
        else {
            panic!("expected query response");
        };
        assert_eq!(res.total_matches, 0);
    }

    #[tokio::test]
    async fn connect_to_closed_port_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = QueryClient::connect(None, Some(addr.to_string()))
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("connect query server TCP"));
    }
}
