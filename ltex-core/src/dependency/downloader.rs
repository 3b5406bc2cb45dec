//! Async file downloader with manual redirect handling and progress reporting.
//!
//! Redirects are followed by hand so a redirect without a `location` header
//! can be reported as such, and every hop is checked against the
//! [`DownloadPolicy`]. The body is streamed to disk chunk by chunk; a partial
//! file never survives a failed or canceled download.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::header::LOCATION;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::Notify;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{AcquisitionError, AcquisitionResult};
use crate::progress::ProgressStack;

/// User-Agent sent with every download request.
pub const DEFAULT_USER_AGENT: &str = "vscode-ltex";

/// Redirect hops followed before giving up.
pub const DEFAULT_MAX_REDIRECTS: usize = 16;

/// Minimum time between two progress label updates.
const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

// ============================================================================
// URL Security Validation
// ============================================================================

/// Domains release archives are served from (including subdomains).
const ALLOWED_DOMAINS: &[&str] = &["github.com", "githubusercontent.com"];

/// Which URLs the downloader may fetch, including redirect targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadPolicy {
    /// Reject anything that is not `https`.
    pub require_https: bool,
    /// Allowed hosts; `None` allows every host.
    pub allowed_domains: Option<Vec<String>>,
}

impl Default for DownloadPolicy {
    fn default() -> Self {
        Self {
            require_https: true,
            allowed_domains: Some(ALLOWED_DOMAINS.iter().map(|d| d.to_string()).collect()),
        }
    }
}

impl DownloadPolicy {
    /// Policy that accepts any URL, for mirrors and local test servers.
    pub fn unrestricted() -> Self {
        Self {
            require_https: false,
            allowed_domains: None,
        }
    }

    /// Validates that a URL is safe for downloading.
    pub fn check(&self, url: &Url) -> AcquisitionResult<()> {
        match url.scheme() {
            "https" => {}
            "http" if !self.require_https => {}
            _ => {
                return Err(AcquisitionError::Config(format!(
                    "URL must use HTTPS: {}",
                    url
                )))
            }
        }

        let host = url
            .host_str()
            .ok_or_else(|| AcquisitionError::Config(format!("URL must have a host: {}", url)))?;

        if let Some(domains) = &self.allowed_domains {
            let is_allowed = domains
                .iter()
                .any(|domain| host == domain || host.ends_with(&format!(".{}", domain)));
            if !is_allowed {
                return Err(AcquisitionError::Config(format!(
                    "Download domain not allowed: {}. Allowed: {:?}",
                    host, domains
                )));
            }
        }

        Ok(())
    }
}

// ============================================================================
// Cancellation
// ============================================================================

/// Cloneable handle used to cancel a running download.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

#[derive(Debug, Default)]
struct CancelInner {
    canceled: AtomicBool,
    notify: Notify,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.inner.canceled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    /// Clears a previous cancel request.
    pub fn reset(&self) {
        self.inner.canceled.store(false, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.inner.canceled.load(Ordering::SeqCst)
    }

    /// Completes once [`CancelToken::cancel`] has been called.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_canceled() {
                return;
            }
            notified.await;
        }
    }
}

// ============================================================================
// Downloader
// ============================================================================

/// HTTP client for release archives.
#[derive(Debug, Clone)]
pub struct Downloader {
    client: reqwest::Client,
    policy: DownloadPolicy,
    max_redirects: usize,
}

impl Downloader {
    /// Creates a downloader with the default policy and the given User-Agent.
    pub fn new(user_agent: &str) -> AcquisitionResult<Self> {
        Self::with_policy(user_agent, DownloadPolicy::default(), DEFAULT_MAX_REDIRECTS)
    }

    /// Creates a downloader with an explicit policy and redirect limit.
    pub fn with_policy(
        user_agent: &str,
        policy: DownloadPolicy,
        max_redirects: usize,
    ) -> AcquisitionResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| AcquisitionError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            policy,
            max_redirects,
        })
    }

    /// Downloads `url` to `dest`, following redirects.
    ///
    /// Progress is reported on the current task of `progress`; its label gets
    /// a `downloaded/total` suffix when the server sends `content-length`.
    ///
    /// # Returns
    ///
    /// The number of bytes written.
    ///
    /// # Errors
    ///
    /// - `Network` on transport failures,
    /// - `HttpStatus` on non-2xx, non-redirect responses,
    /// - `Redirect` if a redirect has no usable `location` or the hop limit is hit,
    /// - `Config` if a URL violates the download policy,
    /// - `Canceled` if `cancel` fires.
    pub async fn download(
        &self,
        url: &str,
        dest: &Path,
        progress: &mut ProgressStack,
        cancel: &CancelToken,
    ) -> AcquisitionResult<u64> {
        info!("Downloading {} to {}", url, dest.display());

        let mut current = Url::parse(url)
            .map_err(|e| AcquisitionError::Config(format!("Invalid URL {}: {}", url, e)))?;

        for _ in 0..=self.max_redirects {
            self.policy.check(&current)?;

            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AcquisitionError::Canceled),
                result = self.client.get(current.clone()).send() => result,
            }
            .map_err(|source| AcquisitionError::Network {
                url: current.to_string(),
                source,
            })?;

            let status = response.status();
            if status.is_redirection() {
                if !matches!(status.as_u16(), 301 | 302 | 303 | 307 | 308) {
                    return Err(AcquisitionError::HttpStatus {
                        url: current.to_string(),
                        status: status.as_u16(),
                    });
                }

                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|value| value.to_str().ok())
                    .ok_or_else(|| AcquisitionError::Redirect {
                        url: current.to_string(),
                        reason: format!(
                            "received redirection status code {} without location header",
                            status.as_u16()
                        ),
                    })?;

                let next = current.join(location).map_err(|e| AcquisitionError::Redirect {
                    url: current.to_string(),
                    reason: format!("invalid location {:?}: {}", location, e),
                })?;

                info!("Redirected to {}", next);
                current = next;
                continue;
            }

            if !status.is_success() {
                return Err(AcquisitionError::HttpStatus {
                    url: current.to_string(),
                    status: status.as_u16(),
                });
            }

            return stream_to_file(response, &current, dest, progress, cancel).await;
        }

        Err(AcquisitionError::Redirect {
            url: url.to_string(),
            reason: format!("more than {} redirects", self.max_redirects),
        })
    }
}

async fn stream_to_file(
    mut response: reqwest::Response,
    url: &Url,
    dest: &Path,
    progress: &mut ProgressStack,
    cancel: &CancelToken,
) -> AcquisitionResult<u64> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| AcquisitionError::io(parent, e))?;
    }

    let total_bytes = response.content_length().filter(|len| *len > 0);
    debug!("Content-Length: {:?}", total_bytes);

    let mut file = File::create(dest)
        .await
        .map_err(|e| AcquisitionError::io(dest, e))?;

    let task_name = progress.task_name().to_string();
    match total_bytes {
        Some(total) => progress.update_task(0.0, Some(&progress_label(&task_name, 0, total))),
        None => progress.update_task(0.0, Some(&task_name)),
    }

    let mut bytes_downloaded: u64 = 0;
    let mut last_update = Instant::now();

    loop {
        if cancel.is_canceled() {
            drop(file);
            remove_partial(dest).await;
            return Err(AcquisitionError::Canceled);
        }

        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            chunk = response.chunk() => Some(chunk),
        };

        let chunk = match next {
            None => {
                drop(file);
                remove_partial(dest).await;
                return Err(AcquisitionError::Canceled);
            }
            Some(Ok(Some(chunk))) => chunk,
            Some(Ok(None)) => break,
            Some(Err(source)) => {
                drop(file);
                remove_partial(dest).await;
                return Err(AcquisitionError::Network {
                    url: url.to_string(),
                    source,
                });
            }
        };

        if let Err(e) = file.write_all(&chunk).await {
            drop(file);
            remove_partial(dest).await;
            return Err(AcquisitionError::io(dest, e));
        }

        bytes_downloaded += chunk.len() as u64;

        if let Some(total) = total_bytes {
            if last_update.elapsed() >= PROGRESS_INTERVAL {
                last_update = Instant::now();
                progress.update_task(
                    bytes_downloaded as f64 / total as f64,
                    Some(&progress_label(&task_name, bytes_downloaded, total)),
                );
            }
        }
    }

    // Ensure all data is flushed to disk before the file is closed
    if let Err(e) = file.flush().await {
        drop(file);
        remove_partial(dest).await;
        return Err(AcquisitionError::io(dest, e));
    }
    drop(file);

    progress.update_task(1.0, Some(&task_name));

    info!(
        "Download complete: {} bytes written to {}",
        bytes_downloaded,
        dest.display()
    );

    Ok(bytes_downloaded)
}

/// `"<task>  <d>MB/<t>MB"`, megabytes rounded to the nearest integer.
fn progress_label(task_name: &str, downloaded: u64, total: u64) -> String {
    format!(
        "{}  {}MB/{}MB",
        task_name,
        megabytes(downloaded),
        megabytes(total)
    )
}

fn megabytes(bytes: u64) -> u64 {
    (bytes as f64 / 1e6).round() as u64
}

async fn remove_partial(dest: &Path) {
    match tokio::fs::remove_file(dest).await {
        Ok(()) => debug!("Deleted partial download {}", dest.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(
            "Could not delete partial download {}: {}",
            dest.display(),
            e
        ),
    }
}
