// src/main.rs
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use edgar_feed::config::{EdgarConfig, Settings};
use edgar_feed::edgar::client::EdgarClient;
use edgar_feed::edgar::filing::{Filing, FilingOptions, LocalCache};
use edgar_feed::edgar::identifiers::{FilingId, IdentifierPair};
use edgar_feed::extractors::encoding::decode_filing_bytes;
use edgar_feed::extractors::header::{DuplicatePolicy, HeaderFormat, HeaderLayout, HeaderOptions};
use edgar_feed::storage::sync::DEFAULT_LAST_N_DAYS;
use edgar_feed::storage::{FeedDateRange, FeedExtractor, FeedSync, FilingStore};
use edgar_feed::utils::error::{AppError, StorageError};
use edgar_feed::utils::logging;
use encoding_rs::Encoding;
use serde::Serialize;
use std::path::PathBuf;

/// Command Line Interface for the EDGAR filing cache
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (otherwise searched via EDGAR_FEED_CONF and the usual places)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG wins when set.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Never read filings from the local cache
    #[arg(long, global = true)]
    no_cache: bool,

    /// Never fetch filings from the EDGAR website
    #[arg(long, global = true)]
    no_web_fallback: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the header block of a filing as JSON
    Headers {
        /// CIK and accession number, in either order
        id: String,
        other_id: String,

        /// Read the filing from this file instead of the cache or the web
        #[arg(long)]
        file: Option<PathBuf>,

        /// Keep nested sections instead of flattening them
        #[arg(long)]
        nested: bool,

        /// What to do with repeated keys
        #[arg(long, value_enum, default_value = "accumulate")]
        duplicates: DuplicatesArg,

        /// Treat the header as SGML tags without sniffing
        #[arg(long)]
        force_sgml: bool,
    },

    /// List the documents of a filing, or print one by sequence number
    Documents {
        id: String,
        other_id: String,

        #[arg(long)]
        file: Option<PathBuf>,

        /// Print the body of the document with this <SEQUENCE>
        #[arg(long)]
        sequence: Option<u32>,
    },

    /// Show where a filing lives locally and on EDGAR, plus its form type
    Info { id: String, other_id: String },

    /// Unpack daily feed archives into the filing store
    ExtractFeed {
        #[arg(required = true)]
        archives: Vec<PathBuf>,

        /// Write a JSON manifest of the extracted filings here
        #[arg(long)]
        manifest: Option<PathBuf>,

        /// Keep filings that are already in the store
        #[arg(long)]
        no_overwrite: bool,
    },

    /// Download one daily feed archive (YYYY-MM-DD) into the feed cache
    DownloadFeed { date: String },

    /// Download and/or extract every daily feed in [start, end). With neither
    /// -d nor -x, both are done.
    SyncFeeds {
        /// First day (YYYY-MM-DD), default: --last-n-days before the end
        #[arg(short, long)]
        start_date: Option<NaiveDate>,

        /// Day after the last one (YYYY-MM-DD), default: today
        #[arg(short, long)]
        end_date: Option<NaiveDate>,

        #[arg(short = 'n', long, default_value_t = DEFAULT_LAST_N_DAYS)]
        last_n_days: u32,

        /// Download feeds missing from the feed cache
        #[arg(short, long)]
        download: bool,

        /// Extract filings from the feeds into the filing store
        #[arg(short = 'x', long)]
        extract: bool,

        #[arg(long)]
        manifest: Option<PathBuf>,

        #[arg(long)]
        no_overwrite: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum DuplicatesArg {
    Omit,
    Suffix,
    Accumulate,
}

impl From<DuplicatesArg> for DuplicatePolicy {
    fn from(value: DuplicatesArg) -> Self {
        match value {
            DuplicatesArg::Omit => DuplicatePolicy::Omit,
            DuplicatesArg::Suffix => DuplicatePolicy::Suffix,
            DuplicatesArg::Accumulate => DuplicatePolicy::Accumulate,
        }
    }
}

/// A single filing file given on the command line.
struct FileCache {
    path: PathBuf,
    encoding: &'static Encoding,
}

impl LocalCache for FileCache {
    fn path_for(&self, _id: &FilingId) -> Result<PathBuf, StorageError> {
        Ok(self.path.clone())
    }

    fn read_filing(&self, _id: &FilingId) -> Result<String, StorageError> {
        let bytes = std::fs::read(&self.path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound(self.path.clone()),
            _ => StorageError::IoError(e),
        })?;
        Ok(decode_filing_bytes(&bytes, self.encoding).text)
    }
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // 1. Parse CLI Arguments
    let args = Args::parse();

    // 2. Setup Logging (reads RUST_LOG env var)
    logging::setup_logging(args.verbose);
    tracing::debug!("Starting with args: {:?}", args);

    // 3. Load configuration
    let (settings, source) = Settings::load(args.config.as_deref())?;
    if let Some(source) = &source {
        tracing::debug!("Using config file {}", source.display());
    }
    let config = settings.compile()?;

    let store = FilingStore::from_config(&config);
    let client = EdgarClient::from_config(&config)?;
    let options = FilingOptions {
        use_cache: config.cache_feed && !args.no_cache,
        web_fallback: !args.no_web_fallback,
        ..FilingOptions::default()
    };

    match args.command {
        Command::Headers { id, other_id, file, nested, duplicates, force_sgml } => {
            let header_options = HeaderOptions {
                layout: if nested { HeaderLayout::Nested } else { HeaderLayout::Flat },
                policy: duplicates.into(),
                format: force_sgml.then_some(HeaderFormat::Sgml),
            };
            let options = FilingOptions { headers: header_options, ..options };
            let id = parse_id(&id, &other_id)?;

            match file {
                Some(path) => {
                    let cache = file_cache(path, &config);
                    let mut filing = Filing::new(id, &cache, &client, file_options(options));
                    print_json(filing.headers().await?)
                }
                None => {
                    let mut filing = Filing::new(id, &store, &client, options);
                    print_json(filing.headers().await?)
                }
            }
        }

        Command::Documents { id, other_id, file, sequence } => {
            let id = parse_id(&id, &other_id)?;
            match file {
                Some(path) => {
                    let cache = file_cache(path, &config);
                    show_documents(Filing::new(id, &cache, &client, file_options(options)), sequence).await
                }
                None => show_documents(Filing::new(id, &store, &client, options), sequence).await,
            }
        }

        Command::Info { id, other_id } => {
            let id = parse_id(&id, &other_id)?;
            let mut filing = Filing::new(id.clone(), &store, &client, options);
            let local_path = filing.local_path()?;
            let urls = filing.urls();
            let filing_type = match filing.filing_type().await {
                Ok(filing_type) => Some(filing_type.clone()),
                Err(e) => {
                    tracing::warn!("Could not determine form type of {}: {}", id, e);
                    None
                }
            };
            print_json(&serde_json::json!({
                "cik": id.cik,
                "accession": id.accession,
                "local_path": local_path,
                "cached": store.contains(&id),
                "urls": urls,
                "filing_type": filing_type,
            }))
        }

        Command::ExtractFeed { archives, manifest, no_overwrite } => {
            extract_feeds(&store, &config, &archives, manifest, !no_overwrite)
        }

        Command::DownloadFeed { date } => {
            let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                .map_err(|e| AppError::Processing(format!("Invalid date {:?}: {}", date, e)))?;
            let dest = store.feed_path(date)?;
            match client.download_daily_feed(date, &dest).await? {
                Some(path) => {
                    tracing::info!("Daily feed for {} is at {}", date, path.display());
                    println!("{}", path.display());
                }
                None => tracing::warn!("EDGAR has no daily feed for {}", date),
            }
            Ok(())
        }

        Command::SyncFeeds { start_date, end_date, last_n_days, download, extract, manifest, no_overwrite } => {
            let today = chrono::Local::now().date_naive();
            let range = FeedDateRange::resolve(start_date, end_date, last_n_days, today)?;
            let (download, extract) = if download || extract { (download, extract) } else { (true, true) };

            let mut sync = FeedSync::new(&client, &store).with_download(download);
            if extract {
                sync = sync.with_extractor(
                    FeedExtractor::new(&store, config.feed_encoding)
                        .with_keep_regex(config.keep_regex.clone())
                        .with_overwrite(!no_overwrite),
                );
            }
            let report = sync.run(range).await;

            for (date, reason) in &report.failures {
                tracing::error!("Failed on {}: {}", date, reason);
            }
            if let Some(manifest) = manifest {
                let path = store.save_records(&report.records, &manifest)?;
                tracing::info!("Saved manifest of {} filings to: {}", report.records.len(), path.display());
            }

            let handled = report.days - report.missing.len() - report.failures.len();
            if handled == 0 && !report.failures.is_empty() {
                return Err(AppError::Processing(format!(
                    "All {} daily feeds with data failed",
                    report.failures.len()
                )));
            }
            Ok(())
        }
    }
}

fn parse_id(first: &str, second: &str) -> Result<FilingId, AppError> {
    Ok(IdentifierPair::from_pair(first, second)?.into_filing_id()?)
}

fn file_cache(path: PathBuf, config: &EdgarConfig) -> FileCache {
    FileCache { path, encoding: config.filing_encoding }
}

/// A filing read from an explicit file never goes to the web.
fn file_options(options: FilingOptions) -> FilingOptions {
    FilingOptions { use_cache: true, web_fallback: false, ..options }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), AppError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| AppError::Processing(format!("Failed to serialize output: {}", e)))?;
    println!("{}", json);
    Ok(())
}

async fn show_documents<L: LocalCache>(
    mut filing: Filing<'_, L, EdgarClient>,
    sequence: Option<u32>,
) -> Result<(), AppError> {
    if let Some(sequence) = sequence {
        let id = filing.id().clone();
        return match filing.get_sequence_number(sequence).await? {
            Some(document) => {
                println!("{}", document.body);
                Ok(())
            }
            None => Err(AppError::Processing(format!("{} has no document with sequence {}", id, sequence))),
        };
    }

    let listing: Vec<serde_json::Value> = filing
        .documents()
        .await?
        .iter()
        .map(|document| {
            serde_json::json!({
                "index": document.index,
                "sequence": document.sequence(),
                "type": document.doc_type(),
                "filename": document.filename(),
                "description": document.description(),
                "body_bytes": document.body.len(),
            })
        })
        .collect();
    print_json(&listing)
}

fn extract_feeds(
    store: &FilingStore,
    config: &EdgarConfig,
    archives: &[PathBuf],
    manifest: Option<PathBuf>,
    overwrite: bool,
) -> Result<(), AppError> {
    let extractor = FeedExtractor::new(store, config.feed_encoding)
        .with_keep_regex(config.keep_regex.clone())
        .with_overwrite(overwrite);

    let mut success_count = 0;
    let mut failure_count = 0;
    let mut records = Vec::new();

    for archive in archives {
        match extractor.extract_archive(archive) {
            Ok(summary) => {
                tracing::info!(
                    "{}: extracted {} of {} filings",
                    archive.display(),
                    summary.extracted,
                    summary.total
                );
                success_count += 1;
                records.extend(summary.records);
            }
            Err(e) => {
                tracing::error!("Failed to extract {}: {}", archive.display(), e);
                failure_count += 1;
            }
        }
    }

    tracing::info!("Processing finished. Success: {}, Failures: {}", success_count, failure_count);

    if let Some(manifest) = manifest {
        let path = store.save_records(&records, &manifest)?;
        tracing::info!("Saved manifest of {} filings to: {}", records.len(), path.display());
    }

    if success_count == 0 && failure_count > 0 {
        return Err(AppError::Processing(format!("Failed to extract any of {} feed archives", failure_count)));
    }

    Ok(())
}
