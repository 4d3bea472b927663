// src/extractors/mod.rs
pub mod document;
pub mod encoding;
pub mod header;

// Re-export key extraction types for convenience
#[allow(unused_imports)]
pub use document::{
    chunk_filing,
    first_document_text,
    get_by_sequence_number,
    get_by_tag,
    Document,
};
#[allow(unused_imports)]
pub use encoding::{decode_filing_bytes, decode_with_chain, DecodeMode, DecodedText};
#[allow(unused_imports)]
pub use header::{
    get_header,
    parse_headers,
    DuplicatePolicy,
    HeaderFormat,
    HeaderLayout,
    HeaderMap,
    HeaderOptions,
    HeaderValue,
};
