use std::path::Path;

use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::header::REFERER;
use reqwest::{Client, Response};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::debug;
use url::Url;

use crate::error::Result;

fn progress_bar(label: &str, total: Option<u64>) -> ProgressBar {
    let progress = match total {
        Some(total) => {
            let progress = ProgressBar::new(total);
            progress.set_style(
                ProgressStyle::with_template("{prefix:>6} |{bar:40}| {percent:>3}% | {bytes}/{total_bytes} {bytes_per_sec}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("\u{2588}\u{2591}"),
            );
            progress
        }
        None => {
            let progress = ProgressBar::new_spinner();
            progress.set_style(
                ProgressStyle::with_template("{prefix:>6} {spinner} {bytes} {bytes_per_sec}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            progress
        }
    };

    progress.set_prefix(label.to_string());
    progress
}

/// Streams `url` into `dest`, advancing a progress bar per chunk.
///
/// The destination is opened (and truncated) before the request goes out. Whatever was
/// written stays on disk when the transfer fails.
pub async fn download_to_file(client: &Client, url: &str, dest: &Path, label: &str, referer: &Url) -> Result<u64> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(dest)
        .await?;

    debug!("GET {} -> {}", url, dest.display());

    let response = client
        .get(url)
        .header(REFERER, referer.as_str())
        .send()
        .await?
        .error_for_status()?;

    let progress = progress_bar(label, response.content_length());

    match write_stream(response, &mut file, &progress).await {
        Ok(written) => {
            progress.finish();
            Ok(written)
        }
        Err(err) => {
            progress.abandon();
            Err(err)
        }
    }
}

async fn write_stream(response: Response, file: &mut File, progress: &ProgressBar) -> Result<u64> {
    let mut written = 0u64;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;

        written += chunk.len() as u64;
        progress.inc(chunk.len() as u64);
    }

    file.flush().await?;

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DownloadError;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    async fn serve_once(status: &'static str, body: &'static [u8], with_length: bool) -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 4096];
            let _ = socket.read(&mut request).await;

            let mut head = format!("HTTP/1.1 {}\r\nConnection: close\r\n", status);
            if with_length {
                head.push_str(&format!("Content-Length: {}\r\n", body.len()));
            }
            head.push_str("\r\n");

            // the client may hang up early on error statuses
            let _ = socket.write_all(head.as_bytes()).await;
            let _ = socket.write_all(body).await;
            let _ = socket.shutdown().await;
        });

        Url::parse(&format!("http://{}/stream.m4s", addr)).unwrap()
    }

    fn client() -> Client {
        Client::builder().no_proxy().build().unwrap()
    }

    fn referer() -> Url {
        Url::parse("https://www.bilibili.com/video/BV1test").unwrap()
    }

    #[tokio::test]
    async fn writes_body_to_destination() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("video.m4s");
        let url = serve_once("200 OK", b"0123456789abcdef", true).await;

        let written = download_to_file(&client(), url.as_str(), &dest, "Video", &referer()).await.unwrap();

        assert_eq!(written, 16);
        assert_eq!(std::fs::read(&dest).unwrap(), b"0123456789abcdef");
    }

    #[tokio::test]
    async fn completes_without_content_length() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("audio.m4s");
        let url = serve_once("200 OK", b"no length here", false).await;

        let written = download_to_file(&client(), url.as_str(), &dest, "Audio", &referer()).await.unwrap();

        assert_eq!(written, 14);
        assert_eq!(std::fs::read(&dest).unwrap(), b"no length here");
    }

    #[tokio::test]
    async fn error_status_fails_and_leaves_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("video.m4s");
        let url = serve_once("404 Not Found", b"gone", true).await;

        let result = download_to_file(&client(), url.as_str(), &dest, "Video", &referer()).await;

        assert!(matches!(result, Err(DownloadError::Http(_))));
        assert!(dest.exists());
    }

    #[tokio::test]
    async fn unwritable_destination_fails_before_request() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("missing").join("video.m4s");

        let result = download_to_file(&client(), "http://127.0.0.1:9/never", &dest, "Video", &referer()).await;

        assert!(matches!(result, Err(DownloadError::Io(_))));
    }
}
