//! Streaming media downloader

use crate::core::progress::Progress;
use crate::core::video_info::FormatCandidate;
use crate::download::retry::{RetryConfig, RetryExecutor};
use crate::error::KvsError;
use futures_util::StreamExt;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Downloader configuration
#[derive(Clone)]
pub struct DownloaderConfig {
    /// Maximum retries per download
    pub max_retries: u32,
    /// Rate limit in bytes per second
    pub rate_limit_bps: Option<u64>,
    /// Progress callback
    pub progress_callback: Option<Arc<dyn Fn(Progress) + Send + Sync>>,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            rate_limit_bps: None,
            progress_callback: None,
        }
    }
}

/// Rate limiter for controlling download speed
struct RateLimiter {
    bytes_per_second: u64,
    started: Instant,
    bytes_sent: u64,
}

impl RateLimiter {
    fn new(bytes_per_second: u64) -> Self {
        Self {
            bytes_per_second: bytes_per_second.max(1),
            started: Instant::now(),
            bytes_sent: 0,
        }
    }

    /// Start a fresh accounting window
    fn reset(&mut self) {
        self.started = Instant::now();
        self.bytes_sent = 0;
    }

    async fn wait_if_needed(&mut self, bytes: u64) {
        self.bytes_sent += bytes;
        let due = Duration::from_secs_f64(self.bytes_sent as f64 / self.bytes_per_second as f64);
        let elapsed = self.started.elapsed();

        if due > elapsed {
            let wait_time = due - elapsed;
            if wait_time > Duration::from_millis(1) {
                tokio::time::sleep(wait_time).await;
            }
        }
    }
}

/// Downloads one format to a file
pub struct MediaDownloader {
    client: Client,
    config: DownloaderConfig,
    rate_limiter: Option<Arc<Mutex<RateLimiter>>>,
}

impl MediaDownloader {
    /// Create a downloader sharing an HTTP client
    pub fn new(client: Client) -> Self {
        Self::with_config(client, DownloaderConfig::default())
    }

    /// Create a downloader with configuration
    pub fn with_config(client: Client, config: DownloaderConfig) -> Self {
        let rate_limiter = config
            .rate_limit_bps
            .map(|bps| Arc::new(Mutex::new(RateLimiter::new(bps))));

        Self {
            client,
            config,
            rate_limiter,
        }
    }

    /// Set progress callback
    pub fn with_progress_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(Progress) + Send + Sync + 'static,
    {
        self.config.progress_callback = Some(Arc::new(callback));
        self
    }

    /// Set rate limit
    pub fn with_rate_limit(mut self, bytes_per_second: u64) -> Self {
        self.config.rate_limit_bps = Some(bytes_per_second);
        self.rate_limiter = Some(Arc::new(Mutex::new(RateLimiter::new(bytes_per_second))));
        self
    }

    /// Set max retries
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    /// Download `format` to `output_path`, returning the number of bytes written.
    ///
    /// Data goes to `<output_path>.part` first and is renamed on success.
    pub async fn download(
        &self,
        format: &FormatCandidate,
        output_path: &Path,
    ) -> Result<u64, KvsError> {
        info!("Downloading {} to {}", format.format_id, output_path.display());
        let part_path = part_path(output_path);

        let retry = RetryExecutor::with_config(RetryConfig {
            max_retries: self.config.max_retries,
            ..RetryConfig::default()
        });
        let result = retry
            .execute(|| self.download_to(format, &part_path))
            .await;

        match result {
            Ok(downloaded) => {
                tokio::fs::rename(&part_path, output_path).await?;
                info!("Download completed: {} bytes", downloaded);
                Ok(downloaded)
            }
            Err(e) => {
                warn!("Download failed: {}, cleaning up partial file", e);
                let _ = tokio::fs::remove_file(&part_path).await;
                Err(e)
            }
        }
    }

    async fn download_to(&self, format: &FormatCandidate, part_path: &Path) -> Result<u64, KvsError> {
        let mut request = self.client.get(&format.url);
        for (name, value) in &format.http_headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(KvsError::HttpStatus {
                url: format.url.clone(),
                status: status.as_u16(),
            });
        }

        let total_size = response.content_length().unwrap_or(0);
        debug!("Response {} with {} bytes announced", status, total_size);

        // idle time before this transfer earns no burst credit
        if let Some(rate_limiter) = &self.rate_limiter {
            rate_limiter.lock().await.reset();
        }

        let mut file = File::create(part_path).await?;
        let mut stream = response.bytes_stream();
        let mut progress = Progress::new(total_size);
        let mut downloaded = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;
            progress.update(downloaded);

            if let Some(callback) = &self.config.progress_callback {
                callback(progress.clone());
            }

            if let Some(rate_limiter) = &self.rate_limiter {
                let mut limiter = rate_limiter.lock().await;
                limiter.wait_if_needed(chunk.len() as u64).await;
            }
        }

        file.flush().await?;
        file.sync_all().await?;

        if downloaded == 0 {
            return Err(KvsError::Generic("Empty download (0 bytes)".to_string()));
        }
        Ok(downloaded)
    }
}

/// `<path>.part`
pub fn part_path(output_path: &Path) -> PathBuf {
    let mut name = output_path.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicU64, Ordering};

    const PAGE_URL: &str = "https://thisvid.com/videos/sitting-on-ball-tight-jeans/";

    fn format_for(url: String) -> FormatCandidate {
        let mut http_headers = BTreeMap::new();
        http_headers.insert("Referer".to_string(), PAGE_URL.to_string());
        FormatCandidate {
            format_id: "480p".to_string(),
            key: "video_url".to_string(),
            raw_url: url.clone(),
            url,
            ext: "mp4".to_string(),
            width: None,
            height: Some(480),
            quality: None,
            order: 0,
            http_headers,
        }
    }

    #[test]
    fn test_downloader_config_default() {
        let config = DownloaderConfig::default();
        assert_eq!(config.max_retries, 3);
        assert!(config.rate_limit_bps.is_none());
        assert!(config.progress_callback.is_none());
    }

    #[test]
    fn test_part_path() {
        assert_eq!(
            part_path(Path::new("/tmp/video.mp4")),
            PathBuf::from("/tmp/video.mp4.part")
        );
    }

    #[tokio::test]
    async fn test_rate_limiter_wait() {
        let mut limiter = RateLimiter::new(10_000);
        let start = Instant::now();

        limiter.wait_if_needed(2_000).await;

        assert!(start.elapsed() >= Duration::from_millis(150));
    }

    #[tokio::test]
    async fn test_rate_limiter_reset_drops_idle_credit() {
        let mut limiter = RateLimiter::new(10_000);
        tokio::time::sleep(Duration::from_millis(300)).await;

        limiter.reset();
        let start = Instant::now();
        limiter.wait_if_needed(2_000).await;

        assert!(start.elapsed() >= Duration::from_millis(150));
    }

    #[tokio::test]
    async fn test_second_download_is_throttled_after_idle_gap() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/get_file/7/abc/3533241.mp4/")
            .with_status(200)
            .with_body(vec![1u8; 2_000])
            .expect(2)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let downloader = MediaDownloader::new(Client::new()).with_rate_limit(10_000);
        let format = format_for(format!("{}/get_file/7/abc/3533241.mp4/", server.url()));

        downloader
            .download(&format, &dir.path().join("first.mp4"))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;

        let start = Instant::now();
        downloader
            .download(&format, &dir.path().join("second.mp4"))
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_millis(150));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_download_sends_referer() {
        let mut server = mockito::Server::new_async().await;
        let body = vec![7u8; 4096];
        let mock = server
            .mock("GET", "/get_file/7/abc/3533241.mp4/")
            .match_header("referer", PAGE_URL)
            .with_status(200)
            .with_body(body.clone())
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("video.mp4");
        let seen = Arc::new(AtomicU64::new(0));
        let downloader = MediaDownloader::new(Client::new()).with_progress_callback({
            let seen = seen.clone();
            move |progress| seen.store(progress.downloaded_size, Ordering::SeqCst)
        });

        let format = format_for(format!("{}/get_file/7/abc/3533241.mp4/", server.url()));
        let written = downloader.download(&format, &output).await.unwrap();

        assert_eq!(written, 4096);
        assert_eq!(std::fs::read(&output).unwrap(), body);
        assert!(!part_path(&output).exists());
        assert_eq!(seen.load(Ordering::SeqCst), 4096);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_forbidden_download_leaves_no_files() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/get_file/7/abc/3533241.mp4/")
            .with_status(403)
            .expect(1)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("video.mp4");
        let downloader = MediaDownloader::new(Client::new());

        let format = format_for(format!("{}/get_file/7/abc/3533241.mp4/", server.url()));
        let result = downloader.download(&format, &output).await;

        assert!(matches!(
            result,
            Err(KvsError::HttpStatus { status: 403, .. })
        ));
        assert!(!output.exists());
        assert!(!part_path(&output).exists());
        mock.assert_async().await;
    }
}
