//! Image download.
//!
//! Streams the provider-hosted image to disk chunk by chunk. There is no
//! retry here: provider URLs are short-lived, and a failed download aborts
//! the run before anything is recorded.

use futures::StreamExt;
use reqwest::StatusCode;
use std::path::Path;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::warn;

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Failed to download image from {url}: {status}")]
    Status { status: StatusCode, url: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Download `url` to `dest`, creating parent directories as needed.
///
/// Returns the number of bytes written. A non-success status fails before
/// anything touches the filesystem. If the body fails mid-stream the partial
/// file is removed.
pub async fn download_image(
    http: &reqwest::Client,
    url: &str,
    dest: &Path,
) -> Result<u64, DownloadError> {
    let response = http.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(DownloadError::Status {
            status,
            url: url.to_string(),
        });
    }

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let result = stream_to_file(response, dest).await;
    if result.is_err() {
        if let Err(err) = tokio::fs::remove_file(dest).await {
            warn!(path = %dest.display(), error = %err, "Failed to remove partial image");
        }
    }
    result
}

async fn stream_to_file(response: reqwest::Response, dest: &Path) -> Result<u64, DownloadError> {
    let mut file = tokio::fs::File::create(dest).await?;
    let mut body = response.bytes_stream();
    let mut written = 0u64;
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{WarnCounter, serve};
    use axum::Router;
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::get;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nnot really a png";

    #[tokio::test]
    async fn writes_body_and_creates_parent_dirs() {
        let base = serve(Router::new().route("/img.png", get(|| async { PNG_BYTES }))).await;
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("nested/images/out.png");

        let written = download_image(&reqwest::Client::new(), &format!("{base}/img.png"), &dest)
            .await
            .unwrap();

        assert_eq!(written, PNG_BYTES.len() as u64);
        assert_eq!(std::fs::read(&dest).unwrap(), PNG_BYTES);
    }

    #[tokio::test]
    async fn non_success_status_fails_without_writing() {
        let base = serve(Router::new().route(
            "/gone.png",
            get(|| async { (AxumStatus::FORBIDDEN, "expired") }),
        ))
        .await;
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("images/out.png");

        let err = download_image(&reqwest::Client::new(), &format!("{base}/gone.png"), &dest)
            .await
            .unwrap_err();

        match err {
            DownloadError::Status { status, url } => {
                assert_eq!(status, StatusCode::FORBIDDEN);
                assert!(url.ends_with("/gone.png"));
            }
            other => panic!("expected Status error, got {other:?}"),
        }
        assert!(!dest.exists());
        assert!(!tmp.path().join("images").exists());
    }

    /// Promises 100 bytes, sends 3, then closes the connection.
    async fn truncating_host() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;
            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\nabc")
                .await
                .unwrap();
            socket.shutdown().await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn truncated_body_removes_partial_file() {
        let base = truncating_host().await;
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("images/out.png");

        let err = download_image(&reqwest::Client::new(), &format!("{base}/img.png"), &dest)
            .await
            .unwrap_err();

        assert!(matches!(err, DownloadError::Http(_)), "got {err:?}");
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn unremovable_destination_is_reported() {
        let base = serve(Router::new().route("/img.png", get(|| async { PNG_BYTES }))).await;
        let tmp = TempDir::new().unwrap();
        // A directory can be neither created as a file nor removed as one.
        let dest = tmp.path().join("taken");
        std::fs::create_dir(&dest).unwrap();
        let counter = WarnCounter::default();
        let _guard = counter.install();

        let err = download_image(&reqwest::Client::new(), &format!("{base}/img.png"), &dest)
            .await
            .unwrap_err();

        assert!(matches!(err, DownloadError::Io(_)), "got {err:?}");
        assert_eq!(counter.count(), 1);
        assert!(dest.is_dir());
    }

    #[test]
    fn status_error_message_names_status() {
        let err = DownloadError::Status {
            status: StatusCode::NOT_FOUND,
            url: "https://img.example/a.png".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to download image from https://img.example/a.png: 404 Not Found"
        );
    }
}
