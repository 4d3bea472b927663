// src/edgar/client.rs
use crate::config::EdgarConfig;
use crate::edgar::filing::RemoteSource;
use crate::edgar::identifiers::FilingId;
use crate::extractors::encoding::decode_filing_bytes;
use crate::storage::sync::FeedSource;
use crate::utils::error::EdgarError;
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use encoding_rs::Encoding;
use reqwest::{header, StatusCode};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

pub const EDGAR_ROOT: &str = "https://www.sec.gov/Archives";
// The SEC rejects anonymous clients. Set [downloader] user_agent to a real contact.
pub const DEFAULT_USER_AGENT: &str = "edgar_feed downloader (set user_agent in edgar_feed.toml)";
// SEC asks for 10 requests/second max. Be conservative. >100ms delay.
pub const EDGAR_REQUEST_DELAY_MS: u64 = 150;

// --- URL Builders ---

/// The two public URLs of a filing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilingUrls {
    /// Complete submission text file.
    pub raw: String,
    /// Human-facing filing index page.
    pub index: String,
}

pub fn filing_urls(id: &FilingId) -> FilingUrls {
    FilingUrls {
        raw: format!("{}/edgar/data/{}/{}.txt", EDGAR_ROOT, id.cik, id.accession),
        index: format!("{}/edgar/data/{}/{}-index.htm", EDGAR_ROOT, id.cik, id.accession),
    }
}

pub fn quarter_of(date: NaiveDate) -> u32 {
    date.month0() / 3 + 1
}

/// Daily feed archive, e.g. `.../edgar/Feed/2020/QTR3/20200807.nc.tar.gz`.
pub fn feed_url(date: NaiveDate) -> String {
    format!(
        "{}/edgar/Feed/{}/QTR{}/{}.nc.tar.gz",
        EDGAR_ROOT,
        date.year(),
        quarter_of(date),
        date.format("%Y%m%d")
    )
}

/// Quarterly master index, gzipped or plain.
pub fn index_url(year: i32, quarter: u32, compressed: bool) -> String {
    let ext = if compressed { "gz" } else { "idx" };
    format!("{}/edgar/full-index/{}/QTR{}/master.{}", EDGAR_ROOT, year, quarter, ext)
}

// --- Client ---

/// Rate-limited EDGAR HTTP client.
#[derive(Debug, Clone)]
pub struct EdgarClient {
    http: reqwest::Client,
    user_agent: String,
    request_delay: Duration,
    encoding: &'static Encoding,
}

impl EdgarClient {
    pub fn new(user_agent: &str, request_delay_ms: u64, encoding: &'static Encoding) -> Result<Self, EdgarError> {
        let user_agent = if user_agent.trim().is_empty() {
            tracing::warn!("No user_agent configured; the SEC may refuse requests");
            DEFAULT_USER_AGENT.to_string()
        } else {
            user_agent.trim().to_string()
        };

        let http = reqwest::Client::builder()
            .user_agent(user_agent.as_str()) // Set the required User-Agent
            .build()?;

        Ok(Self { http, user_agent, request_delay: Duration::from_millis(request_delay_ms), encoding })
    }

    pub fn from_config(config: &EdgarConfig) -> Result<Self, EdgarError> {
        Self::new(&config.user_agent, config.request_delay_ms, config.filing_encoding)
    }

    /// Sends a GET after the rate-limit pause, optionally resuming at
    /// `range_start`.
    async fn get(&self, url: &str, range_start: Option<u64>) -> Result<reqwest::Response, EdgarError> {
        tracing::debug!("Using User-Agent: {}", self.user_agent);

        // --- Basic Rate Limiting ---
        tokio::time::sleep(self.request_delay).await;

        let mut request = self
            .http
            .get(url)
            .header(header::ACCEPT, "application/xml,text/html,text/plain,*/*");
        if let Some(start) = range_start.filter(|start| *start > 0) {
            request = request.header(header::RANGE, format!("bytes={}-", start));
        }

        Ok(request.send().await?)
    }

    /// Downloads a document from its URL as raw bytes.
    pub async fn download_filing_doc(&self, url: &str) -> Result<Vec<u8>, EdgarError> {
        tracing::info!("Downloading document from: {}", url);

        let response = self.get(url, None).await?;
        check_status(response.status(), url)?;

        let body = response.bytes().await?;
        tracing::debug!("Successfully downloaded {} bytes from {}", body.len(), url);
        Ok(body.to_vec())
    }

    /// Downloads the daily feed for `date` to `dest`, resuming a partial
    /// file. `Ok(None)` means EDGAR has no feed that day (weekends,
    /// holidays).
    pub async fn download_daily_feed(&self, date: NaiveDate, dest: &Path) -> Result<Option<PathBuf>, EdgarError> {
        let url = feed_url(date);
        let existing = tokio::fs::metadata(dest).await.map(|m| m.len()).unwrap_or(0);
        if existing > 0 {
            tracing::info!("Resuming {} at byte {}", dest.display(), existing);
        } else {
            tracing::info!("Downloading daily feed from: {}", url);
        }

        let mut response = self.get(&url, Some(existing)).await?;
        let status = response.status();

        if status == StatusCode::RANGE_NOT_SATISFIABLE {
            tracing::info!("{} is already complete", dest.display());
            return Ok(Some(dest.to_path_buf()));
        }
        if let Err(e) = check_status(status, &url) {
            if status.is_client_error() {
                tracing::info!("No daily feed for {}: {}", date, e);
                return Ok(None);
            }
            return Err(e);
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let resuming = status == StatusCode::PARTIAL_CONTENT;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .append(resuming)
            .truncate(!resuming)
            .open(dest)
            .await?;

        let mut written: u64 = 0;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        tracing::info!("Saved {} bytes of feed {} to {}", written, date, dest.display());
        Ok(Some(dest.to_path_buf()))
    }
}

/// Maps a non-success status to the matching error.
fn check_status(status: StatusCode, url: &str) -> Result<(), EdgarError> {
    if status.is_success() {
        return Ok(());
    }

    tracing::error!("HTTP error status: {} for URL: {}", status, url);
    // Check for specific common errors
    if status == StatusCode::FORBIDDEN {
        tracing::warn!("Received 403 Forbidden - check User-Agent and rate limits.");
        return Err(EdgarError::RateLimited);
    }
    if status == StatusCode::NOT_FOUND {
        tracing::warn!("Received 404 Not Found for URL: {}", url);
        return Err(EdgarError::FilingDocNotFound(url.to_string()));
    }
    Err(EdgarError::Http(status))
}

#[async_trait]
impl RemoteSource for EdgarClient {
    async fn fetch_filing_text(&self, id: &FilingId) -> Result<Option<String>, EdgarError> {
        let urls = filing_urls(id);
        match self.download_filing_doc(&urls.raw).await {
            Ok(bytes) => {
                let decoded = decode_filing_bytes(&bytes, self.encoding);
                tracing::debug!("Decoded {} as {} ({})", id, decoded.encoding.name(), decoded.mode);
                Ok(Some(decoded.text))
            }
            Err(EdgarError::RateLimited) | Err(EdgarError::FilingDocNotFound(_)) => Ok(None),
            Err(EdgarError::Http(status)) if status.is_client_error() => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn filing_urls(&self, id: &FilingId) -> FilingUrls {
        filing_urls(id)
    }
}

#[async_trait]
impl FeedSource for EdgarClient {
    async fn fetch_daily_feed(&self, date: NaiveDate, dest: &Path) -> Result<Option<PathBuf>, EdgarError> {
        self.download_daily_feed(date, dest).await
    }
}
