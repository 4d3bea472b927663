// src/config.rs
use crate::extractors::encoding::encoding_for_label;
use crate::storage::template::{PathTemplate, DEFAULT_FEED_TEMPLATE, DEFAULT_FILING_TEMPLATE};
use crate::utils::error::ConfigError;
use encoding_rs::Encoding;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_ENV_VAR: &str = "EDGAR_FEED_CONF";
const CONFIG_FILE_NAMES: &[&str] = &["edgar_feed.toml", ".edgar_feed.toml"];

// --- Raw Settings (as written in the TOML file) ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub paths: PathSettings,

    #[serde(default)]
    pub downloader: DownloaderSettings,

    #[serde(default)]
    pub parsing: ParsingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSettings {
    /// Root of the extracted filings
    #[serde(default = "default_filing_root")]
    pub filing_root: String,

    /// Root of the compressed daily feed archives
    #[serde(default = "default_feed_cache_root")]
    pub feed_cache_root: String,

    /// Whether filings are looked up in the local cache at all
    #[serde(default)]
    pub cache_feed: bool,

    #[serde(default = "default_filing_path_format")]
    pub filing_path_format: String,

    #[serde(default = "default_feed_cache_path_format")]
    pub feed_cache_path_format: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloaderSettings {
    #[serde(default)]
    pub user_agent: String,

    /// Form types to keep when extracting feeds. Empty keeps everything.
    #[serde(default)]
    pub keep_regex: String,

    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
}

/// Encoding labels are WHATWG labels resolved by `encoding_rs`. There
/// `latin-1` (like `iso-8859-1`) names windows-1252, so bytes 0x80-0x9F
/// decode to typographic characters such as `\u{20ac}` and `\u{201c}` rather
/// than to C1 control characters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsingSettings {
    #[serde(default = "default_feed_encoding")]
    pub feed_encoding: String,

    #[serde(default = "default_filing_encoding")]
    pub filing_encoding: String,
}

// Default value functions
fn default_tmp_root() -> PathBuf {
    std::env::temp_dir().join("edgar_feed")
}

fn default_filing_root() -> String {
    default_tmp_root().join("filings").to_string_lossy().into_owned()
}

fn default_feed_cache_root() -> String {
    default_tmp_root().join("compressed_daily_feeds").to_string_lossy().into_owned()
}

fn default_filing_path_format() -> String {
    DEFAULT_FILING_TEMPLATE.to_string()
}

fn default_feed_cache_path_format() -> String {
    DEFAULT_FEED_TEMPLATE.to_string()
}

fn default_request_delay_ms() -> u64 {
    crate::edgar::client::EDGAR_REQUEST_DELAY_MS
}

// Resolves to windows-1252, not ISO-8859-1
fn default_feed_encoding() -> String {
    "latin-1".to_string()
}

fn default_filing_encoding() -> String {
    "utf-8".to_string()
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            filing_root: default_filing_root(),
            feed_cache_root: default_feed_cache_root(),
            cache_feed: false,
            filing_path_format: default_filing_path_format(),
            feed_cache_path_format: default_feed_cache_path_format(),
        }
    }
}

impl Default for DownloaderSettings {
    fn default() -> Self {
        Self { user_agent: String::new(), keep_regex: String::new(), request_delay_ms: default_request_delay_ms() }
    }
}

impl Default for ParsingSettings {
    fn default() -> Self {
        Self { feed_encoding: default_feed_encoding(), filing_encoding: default_filing_encoding() }
    }
}

impl Settings {
    /// Load configuration from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Ok(toml::from_str(&content)?)
    }

    /// Loads `explicit` if given (failing if it cannot be read), otherwise
    /// the first config file found on the search path, otherwise defaults.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>), ConfigError> {
        let located = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => locate_config_file(),
        };

        match located {
            Some(path) => {
                let settings = Self::from_file(&path)?;
                tracing::info!("Loaded config file from {}", path.display());
                Ok((settings, Some(path)))
            }
            None => {
                tracing::info!("No config file found, using defaults");
                Ok((Self::default(), None))
            }
        }
    }

    /// Validates everything and resolves roots, templates, regex and
    /// encodings.
    pub fn compile(&self) -> Result<EdgarConfig, ConfigError> {
        let filing_template = PathTemplate::for_filings(&self.paths.filing_path_format)
            .map_err(|e| ConfigError::Invalid(format!("filing_path_format: {}", e)))?;
        let feed_template = PathTemplate::for_feeds(&self.paths.feed_cache_path_format)
            .map_err(|e| ConfigError::Invalid(format!("feed_cache_path_format: {}", e)))?;

        let keep_regex = match self.downloader.keep_regex.trim() {
            "" => None,
            pattern => Some(
                Regex::new(pattern).map_err(|e| ConfigError::Invalid(format!("keep_regex: {}", e)))?,
            ),
        };

        Ok(EdgarConfig {
            filing_root: expand_home(&self.paths.filing_root),
            feed_cache_root: expand_home(&self.paths.feed_cache_root),
            cache_feed: self.paths.cache_feed,
            filing_template,
            feed_template,
            user_agent: self.downloader.user_agent.trim().to_string(),
            keep_regex,
            request_delay_ms: self.downloader.request_delay_ms,
            feed_encoding: resolve_encoding("feed_encoding", &self.parsing.feed_encoding)?,
            filing_encoding: resolve_encoding("filing_encoding", &self.parsing.filing_encoding)?,
        })
    }
}

// --- Compiled Configuration ---

/// Validated, immutable settings handed to the store, client and extractor.
#[derive(Debug, Clone)]
pub struct EdgarConfig {
    pub filing_root: PathBuf,
    pub feed_cache_root: PathBuf,
    pub cache_feed: bool,
    pub filing_template: PathTemplate,
    pub feed_template: PathTemplate,
    pub user_agent: String,
    pub keep_regex: Option<Regex>,
    pub request_delay_ms: u64,
    pub feed_encoding: &'static Encoding,
    pub filing_encoding: &'static Encoding,
}

impl EdgarConfig {
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let (settings, _) = Settings::load(explicit)?;
        settings.compile()
    }
}

fn resolve_encoding(key: &str, label: &str) -> Result<&'static Encoding, ConfigError> {
    encoding_for_label(label).ok_or_else(|| ConfigError::Invalid(format!("{}: unknown encoding {:?}", key, label)))
}

// --- Locating the File ---

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}

/// Expands a leading `~` to the home directory.
pub fn expand_home(raw: &str) -> PathBuf {
    let raw = raw.trim();
    match (raw.strip_prefix('~'), home_dir()) {
        (Some(rest), Some(home)) if rest.is_empty() || rest.starts_with('/') || rest.starts_with('\\') => {
            home.join(rest.trim_start_matches(['/', '\\']))
        }
        _ => PathBuf::from(raw),
    }
}

/// Directories searched for a config file, in order: `$EDGAR_FEED_CONF`
/// when it names a directory, `.`, `~/.config/edgar_feed`, `~/.config`, `~`.
pub fn search_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Some(env_path) = std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from) {
        if env_path.is_dir() {
            dirs.push(env_path);
        }
    }
    dirs.push(PathBuf::from("."));
    if let Some(home) = home_dir() {
        dirs.push(home.join(".config").join("edgar_feed"));
        dirs.push(home.join(".config"));
        dirs.push(home);
    }
    dirs
}

/// `$EDGAR_FEED_CONF` if it names a file, else the first known file name in
/// the search directories.
pub fn locate_config_file() -> Option<PathBuf> {
    if let Some(env_path) = std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from) {
        if env_path.is_file() {
            return Some(env_path);
        }
    }
    find_in_dirs(&search_dirs())
}

fn find_in_dirs(dirs: &[PathBuf]) -> Option<PathBuf> {
    dirs.iter()
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use encoding_rs::{UTF_8, WINDOWS_1252};

    #[test]
    fn test_defaults_compile() {
        let config = Settings::default().compile().unwrap();
        assert!(!config.cache_feed);
        assert!(config.keep_regex.is_none());
        assert_eq!(config.request_delay_ms, 150);
        assert_eq!(config.feed_encoding, WINDOWS_1252);
        assert_eq!(config.filing_encoding, UTF_8);
        assert!(config.filing_root.ends_with("edgar_feed/filings"));
        assert_eq!(config.filing_template.source(), DEFAULT_FILING_TEMPLATE);
    }

    #[test]
    fn test_latin1_label_is_windows_1252() {
        let config = Settings::default().compile().unwrap();
        let (text, _) = config.feed_encoding.decode_without_bom_handling(b"\x80\x93");
        assert_eq!(text, "\u{20ac}\u{201c}");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [paths]
            filing_root = "/data/edgar/filings"
            cache_feed = true
            feed_cache_path_format = "{date:%Y%m%d}.nc.tar.gz"

            [downloader]
            user_agent = "Research Lab research@example.com"
            keep_regex = "^(10-K|8-K)"
            "#,
        )
        .unwrap();

        assert_eq!(settings.paths.filing_path_format, DEFAULT_FILING_TEMPLATE);
        assert_eq!(settings.parsing.feed_encoding, "latin-1");

        let config = settings.compile().unwrap();
        assert!(config.cache_feed);
        assert_eq!(config.filing_root, PathBuf::from("/data/edgar/filings"));
        assert!(config.keep_regex.as_ref().unwrap().is_match("10-K405"));
        assert_eq!(
            config.feed_template.render_feed(NaiveDate::from_ymd_opt(2021, 2, 3).unwrap()).unwrap(),
            "20210203.nc.tar.gz"
        );
    }

    #[test]
    fn test_compile_rejects_bad_values() {
        let mut settings = Settings::default();
        settings.paths.filing_path_format = "{ticker}.nc".to_string();
        assert!(matches!(settings.compile(), Err(ConfigError::Invalid(_))));

        let mut settings = Settings::default();
        settings.downloader.keep_regex = "(".to_string();
        assert!(matches!(settings.compile(), Err(ConfigError::Invalid(_))));

        let mut settings = Settings::default();
        settings.parsing.feed_encoding = "klingon".to_string();
        assert!(matches!(settings.compile(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("edgar_feed.toml");
        std::fs::write(&path, "[paths\nfiling_root = 1").unwrap();
        assert!(matches!(Settings::from_file(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(Settings::load(Some(&missing)), Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_find_in_dirs_order() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        std::fs::write(second.path().join("edgar_feed.toml"), "").unwrap();
        std::fs::write(second.path().join(".edgar_feed.toml"), "").unwrap();

        let dirs = vec![first.path().to_path_buf(), second.path().to_path_buf()];
        assert_eq!(find_in_dirs(&dirs), Some(second.path().join("edgar_feed.toml")));

        std::fs::write(first.path().join(".edgar_feed.toml"), "").unwrap();
        assert_eq!(find_in_dirs(&dirs), Some(first.path().join(".edgar_feed.toml")));
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home("/abs/path"), PathBuf::from("/abs/path"));
        assert_eq!(expand_home("~user/x"), PathBuf::from("~user/x"));
        if let Some(home) = home_dir() {
            assert_eq!(expand_home("~/edgar"), home.join("edgar"));
            assert_eq!(expand_home("~"), home);
        }
    }
}
