// src/lib.rs
//! Retrieval, local caching and parsing of SEC EDGAR filings.
pub mod config;
pub mod edgar;
pub mod extractors;
pub mod storage;
pub mod utils;
