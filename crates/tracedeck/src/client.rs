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
    /// Prefer the UDS socket (explicit flag, then env), falling back
    /// to TCP.
    pub async fn connect(uds: Option<PathBuf>, addr: Option<String>) -> anyhow::Result<Self> {
        if let Some(path) = uds {
            let stream = UnixStream::connect(path)
                .await
                .context("connect UDS query server")?;
            return Ok(Self::Uds(BufReader::new(stream)));
        }

        if let Ok(path) = std::env::var("TRACEDECK_QUERY_UDS_PATH")
            && let Ok(stream) = UnixStream::connect(path).await
        {
            return Ok(Self::Uds(BufReader::new(stream)));
        }

        let addr = addr
            .or_else(|| std::env::var("TRACEDECK_QUERY_TCP_ADDR").ok())
            .unwrap_or_else(|| "127.0.0.1:1901".to_string());
        let stream = TcpStream::connect(&addr)
            .await
            .with_context(|| format!("connect query server TCP {addr}"))?;
        Ok(Self::Tcp(BufReader::new(stream)))
    }

    pub async fn request(&mut self, req: ApiRequest) -> anyhow::Result<ApiResponse> {
        match self {
            QueryClient::Uds(stream) => roundtrip(stream, &req).await,
            QueryClient::Tcp(stream) => roundtrip(stream, &req).await,
        }
    }
}

async fn roundtrip<T>(stream: &mut BufReader<T>, req: &ApiRequest) -> anyhow::Result<ApiResponse>
where
    T: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let payload = serde_json::to_vec(req)?;
    stream.get_mut().write_all(&payload).await?;
    stream.get_mut().write_all(b"\n").await?;
    stream.get_mut().flush().await?;

    let mut line = String::new();
    stream.read_line(&mut line).await?;
    Ok(serde_json::from_str(&line)?)
}
