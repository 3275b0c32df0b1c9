//! Secondary HTTP mirror
//!
//! The mirror exposes the FTP tree under the same relative paths. The body
//! is streamed to disk chunk by chunk. The download timeout applies to each
//! wait for the server (response headers, then every chunk), never to the
//! transfer as a whole.

use super::source::{classify_message, RemoteLayout, RemoteSource};
use crate::config::SourceConfig;
use crate::domain::{classify_io_error, Failure, FailureKind, IngestError, Result, Target};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, ClientBuilder, StatusCode};
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use url::Url;

const USER_AGENT: &str = concat!("datasus-ingest/", env!("CARGO_PKG_VERSION"));

pub struct HttpMirrorSource {
    client: Client,
    base_url: Url,
    layout: RemoteLayout,
    idle_timeout: Duration,
}

impl HttpMirrorSource {
    /// Build the mirror client
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the HTTP client
    /// cannot be built.
    pub fn from_config(config: &SourceConfig) -> Result<Self> {
        let mut base = config.mirror_base_url.trim_end_matches('/').to_string();
        base.push('/');
        let base_url = Url::parse(&base).map_err(|e| {
            IngestError::Configuration(format!(
                "Invalid mirror base URL '{}': {}",
                config.mirror_base_url, e
            ))
        })?;

        let client = ClientBuilder::new()
            .user_agent(USER_AGENT)
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| IngestError::Connection(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            layout: RemoteLayout::new(&config.base_dir, &config.window),
            idle_timeout: config.download_timeout(),
        })
    }

    /// Awaits one step of the exchange, failing after `idle_timeout` of silence
    async fn within_idle<T, F>(&self, step: F) -> std::result::Result<T, Failure>
    where
        F: Future<Output = std::result::Result<T, reqwest::Error>>,
    {
        match tokio::time::timeout(self.idle_timeout, step).await {
            Ok(result) => result.map_err(http_failure),
            Err(_) => Err(Failure::download(
                FailureKind::Timeout,
                format!("mirror idle for {}s", self.idle_timeout.as_secs()),
            )),
        }
    }

    fn url_for(&self, relative: &str) -> std::result::Result<Url, Failure> {
        self.base_url.join(relative).map_err(|e| {
            Failure::download(FailureKind::Other, format!("invalid mirror path {relative}: {e}"))
        })
    }
}

fn http_failure(err: reqwest::Error) -> Failure {
    let kind = if err.is_timeout() {
        FailureKind::Timeout
    } else if matches!(
        err.status(),
        Some(StatusCode::NOT_FOUND) | Some(StatusCode::GONE)
    ) {
        FailureKind::NotFound
    } else {
        classify_message(&err.to_string())
    };
    Failure::download(kind, err.to_string())
}

fn status_failure(status: StatusCode) -> Failure {
    let kind = match status {
        StatusCode::NOT_FOUND | StatusCode::GONE => FailureKind::NotFound,
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => FailureKind::Timeout,
        _ => FailureKind::Other,
    };
    Failure::download(kind, format!("HTTP {status}"))
}

#[async_trait]
impl RemoteSource for HttpMirrorSource {
    fn name(&self) -> &str {
        "mirror"
    }

    async fn download(&self, target: &Target, dest: &Path) -> std::result::Result<u64, Failure> {
        let url = self.url_for(&self.layout.relative_path(target))?;
        tracing::debug!(url = %url, "Mirror download");

        let response = self.within_idle(self.client.get(url).send()).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(status_failure(status));
        }

        let write_failure = |e: std::io::Error| {
            Failure::download(
                classify_io_error(&e),
                format!("failed to write {}: {e}", dest.display()),
            )
        };

        let mut file = tokio::fs::File::create(dest).await.map_err(write_failure)?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;
        loop {
            let next = self
                .within_idle(async { stream.next().await.transpose() })
                .await?;
            let Some(chunk) = next else {
                break;
            };
            file.write_all(&chunk).await.map_err(write_failure)?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(write_failure)?;

        if written == 0 {
            return Err(Failure::download(
                FailureKind::EmptyResult,
                "download returned 0 bytes",
            ));
        }
        Ok(written)
    }

    async fn probe(&self) -> std::result::Result<String, Failure> {
        let url = self.url_for(self.layout.base_dir())?;
        let response = self.within_idle(self.client.get(url).send()).await?;
        // Any HTTP answer proves the mirror is reachable
        Ok(format!("mirror reachable (HTTP {})", response.status().as_u16()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    const PATH: &str = "/dissemin/publicos/SIHSUS/200801_/Dados/RDSP2403.dbc";

    fn source_for(server_url: &str) -> HttpMirrorSource {
        let config = SourceConfig {
            mirror_base_url: server_url.to_string(),
            connect_timeout_secs: 5,
            download_timeout_secs: 5,
            ..SourceConfig::default()
        };
        HttpMirrorSource::from_config(&config).unwrap()
    }

    fn target() -> Target {
        Target::from_str("SIH-RD SP 2024 3").unwrap()
    }

    fn idle_source_for(server_url: &str) -> HttpMirrorSource {
        let config = SourceConfig {
            mirror_base_url: server_url.to_string(),
            connect_timeout_secs: 5,
            download_timeout_secs: 1,
            ..SourceConfig::default()
        };
        HttpMirrorSource::from_config(&config).unwrap()
    }

    /// Answers one request with `body`, sending `sent` bytes one at a time
    /// every `pace` and then holding the connection open for `hold`
    async fn trickle_server(
        body: &'static [u8],
        sent: usize,
        pace: Duration,
        hold: Duration,
    ) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    return;
                }
                request.extend_from_slice(&buf[..n]);
            }

            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            let _ = socket.write_all(head.as_bytes()).await;
            for byte in &body[..sent] {
                tokio::time::sleep(pace).await;
                let _ = socket.write_all(std::slice::from_ref(byte)).await;
            }
            tokio::time::sleep(hold).await;
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_download_writes_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", PATH)
            .with_status(200)
            .with_body(b"DBC-BYTES")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("RDSP2403.dbc");
        let written = source_for(&server.url())
            .download(&target(), &dest)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(written, 9);
        assert_eq!(std::fs::read(&dest).unwrap(), b"DBC-BYTES");
    }

    #[tokio::test]
    async fn test_404_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", PATH)
            .with_status(404)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let failure = source_for(&server.url())
            .download(&target(), &dir.path().join("x.dbc"))
            .await
            .unwrap_err();
        assert_eq!(failure.kind, FailureKind::NotFound);
    }

    #[tokio::test]
    async fn test_410_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", PATH)
            .with_status(410)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let failure = source_for(&server.url())
            .download(&target(), &dir.path().join("x.dbc"))
            .await
            .unwrap_err();
        assert_eq!(failure.kind, FailureKind::NotFound);
    }

    #[tokio::test]
    async fn test_empty_body_is_empty_result() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", PATH)
            .with_status(200)
            .with_body("")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let failure = source_for(&server.url())
            .download(&target(), &dir.path().join("x.dbc"))
            .await
            .unwrap_err();
        assert_eq!(failure.kind, FailureKind::EmptyResult);
    }

    #[tokio::test]
    async fn test_server_error_is_other() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", PATH)
            .with_status(503)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let failure = source_for(&server.url())
            .download(&target(), &dir.path().join("x.dbc"))
            .await
            .unwrap_err();
        assert_eq!(failure.kind, FailureKind::Other);
        assert!(failure.message.contains("503"));
    }

    #[tokio::test]
    async fn test_probe_accepts_any_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/dissemin/publicos")
            .with_status(403)
            .create_async()
            .await;

        let message = source_for(&server.url()).probe().await.unwrap();
        assert!(message.contains("403"));
    }

    #[tokio::test]
    async fn test_slow_but_steady_body_succeeds() {
        const BODY: &[u8] = b"DBC-PAYLOAD!";
        // 12 bytes at 250ms each last three times the idle timeout
        let url =
            trickle_server(BODY, BODY.len(), Duration::from_millis(250), Duration::ZERO).await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("RDSP2403.dbc");
        let written = idle_source_for(&url)
            .download(&target(), &dest)
            .await
            .unwrap();

        assert_eq!(written, 12);
        assert_eq!(std::fs::read(&dest).unwrap(), BODY);
    }

    #[tokio::test]
    async fn test_stalled_body_times_out() {
        const BODY: &[u8] = b"DBC-PAYLOAD!";
        let url = trickle_server(BODY, 4, Duration::from_millis(10), Duration::from_secs(5)).await;

        let dir = tempfile::tempdir().unwrap();
        let failure = idle_source_for(&url)
            .download(&target(), &dir.path().join("RDSP2403.dbc"))
            .await
            .unwrap_err();

        assert_eq!(failure.kind, FailureKind::Timeout);
        assert!(failure.message.contains("idle"));
    }
}
