// src/edgar/filing.rs

// --- Imports ---
use crate::edgar::client::FilingUrls;
use crate::edgar::forms::FilingType;
use crate::edgar::identifiers::FilingId;
use crate::extractors::document::{self, Document};
use crate::extractors::header::{first_text, parse_headers, HeaderMap, HeaderOptions, HeaderValue};
use crate::utils::error::{EdgarError, FilingError, StorageError};
use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;

// --- Collaborator Seams ---

/// Local copy of the archive.
pub trait LocalCache {
    fn path_for(&self, id: &FilingId) -> Result<PathBuf, StorageError>;

    /// Full filing text, or `StorageError::NotFound` if there is no local copy.
    fn read_filing(&self, id: &FilingId) -> Result<String, StorageError>;
}

/// The EDGAR website.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Full filing text, or `None` when EDGAR answers with a 4xx.
    async fn fetch_filing_text(&self, id: &FilingId) -> Result<Option<String>, EdgarError>;

    fn filing_urls(&self, id: &FilingId) -> FilingUrls;
}

// --- Lazy Slots ---

/// State of one lazily computed field. `Failed` keeps the reason for
/// inspection but is retried on the next access.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Slot<T> {
    #[default]
    Unset,
    Populated(T),
    Failed(String),
}

impl<T> Slot<T> {
    pub fn populated(&self) -> Option<&T> {
        match self {
            Slot::Populated(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_populated(&self) -> bool {
        matches!(self, Slot::Populated(_))
    }

    pub fn failure(&self) -> Option<&str> {
        match self {
            Slot::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

// --- Options ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilingOptions {
    /// Try the local cache before the web.
    pub use_cache: bool,
    /// Fall back to the web when the cache has no copy.
    pub web_fallback: bool,
    pub headers: HeaderOptions,
}

impl Default for FilingOptions {
    fn default() -> Self {
        Self { use_cache: true, web_fallback: true, headers: HeaderOptions::default() }
    }
}

// --- Filing ---

/// One filing, with its text, headers, documents and type loaded on first
/// access. Accessors take `&mut self`; wrap the filing in a
/// `tokio::sync::Mutex` to share it between tasks.
pub struct Filing<'a, L: LocalCache, R: RemoteSource> {
    id: FilingId,
    cache: &'a L,
    remote: &'a R,
    options: FilingOptions,
    full_text: Slot<String>,
    headers: Slot<HeaderMap>,
    documents: Slot<Vec<Document>>,
    filing_type: Slot<FilingType>,
}

impl<'a, L: LocalCache, R: RemoteSource> Filing<'a, L, R> {
    pub fn new(id: FilingId, cache: &'a L, remote: &'a R, options: FilingOptions) -> Self {
        Self {
            id,
            cache,
            remote,
            options,
            full_text: Slot::Unset,
            headers: Slot::Unset,
            documents: Slot::Unset,
            filing_type: Slot::Unset,
        }
    }

    pub fn id(&self) -> &FilingId {
        &self.id
    }

    pub fn options(&self) -> &FilingOptions {
        &self.options
    }

    pub fn urls(&self) -> FilingUrls {
        self.remote.filing_urls(&self.id)
    }

    pub fn local_path(&self) -> Result<PathBuf, FilingError> {
        Ok(self.cache.path_for(&self.id)?)
    }

    pub async fn full_text(&mut self) -> Result<&str, FilingError> {
        self.ensure_full_text().await?;
        self.full_text.populated().map(String::as_str).ok_or_else(|| self.not_found())
    }

    pub async fn headers(&mut self) -> Result<&HeaderMap, FilingError> {
        self.ensure_headers().await?;
        self.headers.populated().ok_or_else(|| self.not_found())
    }

    pub async fn documents(&mut self) -> Result<&[Document], FilingError> {
        self.ensure_documents().await?;
        self.documents.populated().map(Vec::as_slice).ok_or_else(|| self.not_found())
    }

    pub async fn filing_type(&mut self) -> Result<&FilingType, FilingError> {
        if !self.filing_type.is_populated() {
            if let Err(e) = self.ensure_headers().await {
                self.filing_type = Slot::Failed(e.to_string());
                return Err(e);
            }
            let exact = self
                .headers
                .populated()
                .and_then(|headers| {
                    find_text(headers, "type").or_else(|| find_text(headers, "conformed-submission-type"))
                })
                .unwrap_or("OTHER");
            let filing_type = FilingType::new(exact);
            tracing::debug!("Filing {} classified as {}", self.id, filing_type);
            self.filing_type = Slot::Populated(filing_type);
        }
        self.filing_type.populated().ok_or_else(|| self.not_found())
    }

    /// Document by its 1-based `<SEQUENCE>`.
    pub async fn get_sequence_number(&mut self, sequence: u32) -> Result<Option<&Document>, FilingError> {
        let documents = self.documents().await?;
        Ok(document::get_by_sequence_number(documents, sequence))
    }

    pub async fn get_documents_by_tag(
        &mut self,
        tag: &str,
        needle: &str,
        use_regex: bool,
    ) -> Result<Vec<&Document>, FilingError> {
        let documents = self.documents().await?;
        Ok(document::get_by_tag(documents, tag, needle, use_regex)?)
    }

    // --- Population ---

    async fn ensure_full_text(&mut self) -> Result<(), FilingError> {
        if self.full_text.is_populated() {
            return Ok(());
        }
        match self.load_full_text().await {
            Ok(text) => {
                tracing::debug!("Loaded {} ({} bytes)", self.id, text.len());
                self.full_text = Slot::Populated(text);
                Ok(())
            }
            Err(e) => {
                self.full_text = Slot::Failed(e.to_string());
                Err(e)
            }
        }
    }

    async fn load_full_text(&self) -> Result<String, FilingError> {
        if self.options.use_cache {
            match self.cache.read_filing(&self.id) {
                Ok(text) => return Ok(text),
                Err(StorageError::NotFound(path)) => {
                    tracing::debug!("Filing {} not in local cache at {}", self.id, path.display());
                    if !self.options.web_fallback {
                        return Err(self.not_found());
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::debug!("Downloading from EDGAR web: {}", self.id);
        self.remote
            .fetch_filing_text(&self.id)
            .await?
            .ok_or_else(|| self.not_found())
    }

    async fn ensure_headers(&mut self) -> Result<(), FilingError> {
        if self.headers.is_populated() {
            return Ok(());
        }
        if let Err(e) = self.ensure_full_text().await {
            self.headers = Slot::Failed(e.to_string());
            return Err(e);
        }
        let text = self.full_text.populated().map(String::as_str).unwrap_or_default();
        self.headers = Slot::Populated(parse_headers(text, &self.options.headers));
        Ok(())
    }

    async fn ensure_documents(&mut self) -> Result<(), FilingError> {
        if self.documents.is_populated() {
            return Ok(());
        }
        if let Err(e) = self.ensure_full_text().await {
            self.documents = Slot::Failed(e.to_string());
            return Err(e);
        }
        let text = self.full_text.populated().map(String::as_str).unwrap_or_default();
        match document::chunk_filing_with_policy(text, self.options.headers.policy) {
            Ok(documents) => {
                self.documents = Slot::Populated(documents);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Could not chunk {}: {}", self.id, e);
                self.documents = Slot::Failed(e.to_string());
                Err(e.into())
            }
        }
    }

    fn not_found(&self) -> FilingError {
        FilingError::NotFound { cik: self.id.cik, accession: self.id.accession.to_string() }
    }
}

impl<L: LocalCache, R: RemoteSource> fmt::Display for Filing<'_, L, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<EDGAR filing ({}) Headers:{}, Text:{}, Documents:{}>",
            self.id,
            self.headers.is_populated(),
            self.full_text.is_populated(),
            self.documents.is_populated()
        )
    }
}

/// Depth-first lookup of the first text value under `key`, for nested
/// header layouts.
fn find_text<'m>(map: &'m HeaderMap, key: &str) -> Option<&'m str> {
    if let Some(found) = first_text(map, key) {
        return Some(found);
    }
    map.values().find_map(|value| match value {
        HeaderValue::Section(section) => find_text(section, key),
        HeaderValue::List(items) => items
            .iter()
            .filter_map(HeaderValue::as_section)
            .find_map(|section| find_text(section, key)),
        HeaderValue::Text(_) => None,
    })
}
