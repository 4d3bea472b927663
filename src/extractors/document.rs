// src/extractors/document.rs

// --- Imports ---
use crate::extractors::header::{self, DuplicatePolicy, HeaderMap};
use crate::utils::error::ExtractError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::ops::Range;

// --- Constants ---
const TEXT_OPEN_TAG: &str = "<TEXT>";
const TEXT_CLOSE_TAG: &str = "</TEXT>";

// --- Regex Patterns (Lazy Static) ---
// Document boundaries only count at the start of a line.
static DOCUMENT_TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^</?DOCUMENT>").expect("Failed to compile DOCUMENT_TAG_RE")
});

// --- Data Structures ---

/// One `<DOCUMENT>` of a filing: its own headers plus the `<TEXT>` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    /// Position in the filing (0-based), independent of any `<SEQUENCE>`.
    pub index: usize,
    pub headers: HeaderMap,
    pub body: String,
    /// Byte range of `body` inside the full filing text.
    #[serde(skip)]
    pub body_span: Range<usize>,
}

impl Document {
    pub fn sequence(&self) -> Option<&str> {
        header::first_text(&self.headers, "sequence")
    }

    pub fn doc_type(&self) -> Option<&str> {
        header::first_text(&self.headers, "type")
    }

    pub fn filename(&self) -> Option<&str> {
        header::first_text(&self.headers, "filename")
    }

    pub fn description(&self) -> Option<&str> {
        header::first_text(&self.headers, "description")
    }
}

// --- Chunking ---

/// Splits a full filing into its documents, in the order they appear.
///
/// Fails only when the `<DOCUMENT>`/`</DOCUMENT>` markers are unbalanced or
/// do not alternate; text without any markers yields no documents.
pub fn chunk_filing(text: &str) -> Result<Vec<Document>, ExtractError> {
    chunk_filing_with_policy(text, DuplicatePolicy::default())
}

/// `chunk_filing` with an explicit duplicate-key policy for the per-document
/// headers.
pub fn chunk_filing_with_policy(text: &str, policy: DuplicatePolicy) -> Result<Vec<Document>, ExtractError> {
    let markers: Vec<_> = DOCUMENT_TAG_RE.find_iter(text).collect();

    if markers.len() % 2 != 0 {
        return Err(ExtractError::MalformedFiling(format!(
            "Uneven number of <DOCUMENT> tags found: {}",
            markers.len()
        )));
    }

    for (i, marker) in markers.iter().enumerate() {
        let is_close = marker.as_str().starts_with("</");
        if is_close != (i % 2 == 1) {
            return Err(ExtractError::MalformedFiling(format!(
                "<DOCUMENT> tags do not alternate open/close (unexpected {} at byte {})",
                marker.as_str(),
                marker.start()
            )));
        }
    }

    let documents: Vec<Document> = markers
        .chunks_exact(2)
        .enumerate()
        .map(|(index, pair)| build_document(text, index, pair[0].end(), pair[1].start(), policy))
        .collect();

    tracing::debug!("Chunked filing into {} documents", documents.len());
    Ok(documents)
}

fn build_document(text: &str, index: usize, start: usize, end: usize, policy: DuplicatePolicy) -> Document {
    let (header_end, body_span) = match text[start..end].find(TEXT_OPEN_TAG) {
        Some(offset) => {
            let body_start = start + offset + TEXT_OPEN_TAG.len();
            // A missing </TEXT> lets the body run to </DOCUMENT>
            let body_end = text[body_start..end]
                .find(TEXT_CLOSE_TAG)
                .map_or(end, |off| body_start + off);
            (start + offset, body_start..body_end)
        }
        // Header-only document
        None => (end, end..end),
    };

    let headers = header::parse_sgml_nested(text, start, Some(header_end), policy);
    tracing::trace!(
        "Document {}: type {:?}, body {} bytes",
        index,
        header::first_text(&headers, "type"),
        body_span.len()
    );

    Document { index, headers, body: text[body_span.clone()].to_string(), body_span }
}

/// Trimmed body of the first document: everything between the first
/// `</TEXT>` and the `<TEXT>` before it.
pub fn first_document_text(text: &str) -> Result<String, ExtractError> {
    let end = text.find(TEXT_CLOSE_TAG).ok_or_else(|| {
        ExtractError::MalformedFiling("No closing </TEXT> tag found".to_string())
    })?;
    let start = text[..end].find(TEXT_OPEN_TAG).ok_or_else(|| {
        ExtractError::MalformedFiling("No opening <TEXT> tag before the first </TEXT>".to_string())
    })?;

    Ok(text[start + TEXT_OPEN_TAG.len()..end].trim().to_string())
}

// --- Lookup Helpers ---

/// First document whose `<SEQUENCE>` equals `needle`. Both sides are compared
/// as integers when they parse, otherwise as trimmed strings.
pub fn get_by_sequence<'a>(documents: &'a [Document], needle: &str) -> Option<&'a Document> {
    let needle = needle.trim();
    let needle_num = needle.parse::<i64>().ok();

    documents.iter().find(|doc| {
        let Some(seq) = doc.sequence().map(str::trim) else {
            return false;
        };
        match (needle_num, seq.parse::<i64>().ok()) {
            (Some(a), Some(b)) => a == b,
            _ => seq == needle,
        }
    })
}

/// 1-based sequence lookup, e.g. `1` for the main form.
pub fn get_by_sequence_number(documents: &[Document], sequence: u32) -> Option<&Document> {
    get_by_sequence(documents, &sequence.to_string())
}

/// Documents whose header `tag` equals `needle` (or matches it as a regex
/// when `use_regex`). The tags `body`/`full_text` search the document body.
/// List-valued headers match if any item does.
pub fn get_by_tag<'a>(
    documents: &'a [Document],
    tag: &str,
    needle: &str,
    use_regex: bool,
) -> Result<Vec<&'a Document>, ExtractError> {
    let tag = tag.trim().to_lowercase();
    if tag.is_empty() || needle.is_empty() {
        return Ok(Vec::new());
    }

    let pattern = if use_regex {
        Some(Regex::new(needle).map_err(|e| ExtractError::InvalidPattern(e.to_string()))?)
    } else {
        None
    };
    let hit = |value: &str| match &pattern {
        Some(re) => re.is_match(value),
        None => value == needle,
    };

    let searches_body = matches!(tag.as_str(), "body" | "full_text");
    Ok(documents
        .iter()
        .filter(|doc| {
            if searches_body {
                return hit(&doc.body);
            }
            doc.headers
                .get(&tag)
                .map_or(false, |value| value.texts().into_iter().any(|t| hit(t)))
        })
        .collect())
}

// --- Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::header::HeaderValue;

    const FILING: &str = "<SEC-HEADER>\n\
<TYPE>10-K\n\
</SEC-HEADER>\n\
<DOCUMENT>\n\
<TYPE>10-K\n\
<SEQUENCE>2\n\
<FILENAME>form10k.htm\n\
<DESCRIPTION>ANNUAL REPORT\n\
<TEXT>\n\
<html>main body</html>\n\
</TEXT>\n\
</DOCUMENT>\n\
<DOCUMENT>\n\
<TYPE>EX-21\n\
<SEQUENCE>1\n\
<FILENAME>ex21.txt\n\
<TEXT>\n\
Subsidiaries\n\
</TEXT>\n\
</DOCUMENT>\n\
<DOCUMENT>\n\
<TYPE>ZIP\n\
<SEQUENCE>three\n\
</DOCUMENT>\n";

    #[test]
    fn test_chunk_counts_and_order() {
        let docs = chunk_filing(FILING).unwrap();
        let markers = DOCUMENT_TAG_RE.find_iter(FILING).count();
        assert_eq!(docs.len(), markers / 2);
        // Text order, not declared sequence
        assert_eq!(docs[0].doc_type(), Some("10-K"));
        assert_eq!(docs[0].sequence(), Some("2"));
        assert_eq!(docs[1].doc_type(), Some("EX-21"));
        assert_eq!(docs.iter().map(|d| d.index).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn test_bodies_are_exact_slices() {
        let docs = chunk_filing(FILING).unwrap();
        for doc in &docs {
            assert_eq!(doc.body, &FILING[doc.body_span.clone()]);
        }
        assert_eq!(docs[0].body, "\n<html>main body</html>\n");
        assert_eq!(docs[1].body, "\nSubsidiaries\n");
    }

    #[test]
    fn test_header_only_document_has_empty_body() {
        let docs = chunk_filing(FILING).unwrap();
        assert_eq!(docs[2].body, "");
        assert_eq!(docs[2].doc_type(), Some("ZIP"));
    }

    #[test]
    fn test_document_headers_exclude_body_tags() {
        let text = "<DOCUMENT>\n<TYPE>EX-99\n<TEXT>\n<B>not a header\n</TEXT>\n</DOCUMENT>\n";
        let docs = chunk_filing(text).unwrap();
        assert_eq!(docs[0].headers.len(), 1);
        assert_eq!(docs[0].headers["type"], HeaderValue::Text("EX-99".to_string()));
    }

    #[test]
    fn test_missing_text_close_runs_to_document_end() {
        let text = "<DOCUMENT>\n<TYPE>EX-1\n<TEXT>\nunterminated\n</DOCUMENT>\n";
        let docs = chunk_filing(text).unwrap();
        assert_eq!(docs[0].body, "\nunterminated\n");
    }

    #[test]
    fn test_odd_marker_count_is_malformed() {
        let text = "<DOCUMENT>\n<TYPE>10-K\n<TEXT>\nx\n</TEXT>\n</DOCUMENT>\n<DOCUMENT>\n<TYPE>EX-1\n";
        assert!(matches!(chunk_filing(text), Err(ExtractError::MalformedFiling(_))));
    }

    #[test]
    fn test_non_alternating_markers_are_malformed() {
        let text = "</DOCUMENT>\n<DOCUMENT>\n";
        assert!(matches!(chunk_filing(text), Err(ExtractError::MalformedFiling(_))));
        let text = "<DOCUMENT>\n<DOCUMENT>\n</DOCUMENT>\n</DOCUMENT>\n";
        assert!(matches!(chunk_filing(text), Err(ExtractError::MalformedFiling(_))));
    }

    #[test]
    fn test_markers_only_count_at_line_start() {
        let text = "<DOCUMENT>\n<TEXT>\nsee the <DOCUMENT> tag\n</TEXT>\n</DOCUMENT>\n";
        let docs = chunk_filing(text).unwrap();
        assert_eq!(docs.len(), 1);
        assert!(docs[0].body.contains("see the <DOCUMENT> tag"));
    }

    #[test]
    fn test_empty_text_has_no_documents() {
        assert!(chunk_filing("").unwrap().is_empty());
        assert!(chunk_filing("no markers here").unwrap().is_empty());
    }

    #[test]
    fn test_get_by_sequence_number() {
        let docs = chunk_filing(FILING).unwrap();
        assert_eq!(get_by_sequence_number(&docs, 1).unwrap().doc_type(), Some("EX-21"));
        assert_eq!(get_by_sequence_number(&docs, 2).unwrap().doc_type(), Some("10-K"));
        assert!(get_by_sequence_number(&docs, 9).is_none());
        // Non-numeric sequences fall back to string comparison
        assert_eq!(get_by_sequence(&docs, "three").unwrap().doc_type(), Some("ZIP"));
        assert!(get_by_sequence_number(&[], 1).is_none());
    }

    #[test]
    fn test_get_by_tag() {
        let docs = chunk_filing(FILING).unwrap();
        let exact = get_by_tag(&docs, "TYPE", "EX-21", false).unwrap();
        assert_eq!(exact.len(), 1);
        assert_eq!(exact[0].filename(), Some("ex21.txt"));

        let re = get_by_tag(&docs, "filename", r"\.(htm|txt)$", true).unwrap();
        assert_eq!(re.len(), 2);

        let body = get_by_tag(&docs, "full_text", "Subsidiaries", true).unwrap();
        assert_eq!(body.len(), 1);

        assert!(get_by_tag(&docs, "type", "S-1", false).unwrap().is_empty());
        assert!(get_by_tag(&docs, "nope", "x", false).unwrap().is_empty());
        assert!(get_by_tag(&[], "type", "10-K", false).unwrap().is_empty());
        assert!(matches!(get_by_tag(&docs, "type", "(", true), Err(ExtractError::InvalidPattern(_))));
    }

    #[test]
    fn test_get_by_tag_list_and_section_values() {
        let text = "<DOCUMENT>\n\
<TYPE>EX-99\n\
<DESCRIPTION>PRESS RELEASE\n\
<DESCRIPTION>EARNINGS CALL SLIDES\n\
<TEXT>\nslides\n</TEXT>\n\
</DOCUMENT>\n\
<DOCUMENT>\n\
<TYPE>EX-101\n\
<X>\n\
<Y>EARNINGS CALL SLIDES\n\
</X>\n\
<TEXT>\nxbrl\n</TEXT>\n\
</DOCUMENT>\n";
        let docs = chunk_filing(text).unwrap();
        assert!(matches!(docs[0].headers["description"], HeaderValue::List(_)));
        assert!(matches!(docs[1].headers["x"], HeaderValue::Section(_)));

        // Any item of a repeated header can match
        let exact = get_by_tag(&docs, "description", "EARNINGS CALL SLIDES", false).unwrap();
        assert_eq!(exact.len(), 1);
        assert_eq!(exact[0].doc_type(), Some("EX-99"));
        let re = get_by_tag(&docs, "description", r"^EARNINGS", true).unwrap();
        assert_eq!(re.len(), 1);
        assert_eq!(re[0].index, 0);

        // Nested sections are never compared
        assert!(get_by_tag(&docs, "x", "EARNINGS CALL SLIDES", false).unwrap().is_empty());
        assert!(get_by_tag(&docs, "x", ".*", true).unwrap().is_empty());
    }

    #[test]
    fn test_first_document_text() {
        assert_eq!(first_document_text(FILING).unwrap(), "<html>main body</html>");
        assert!(first_document_text("<DOCUMENT>\n</DOCUMENT>\n").is_err());
    }
}
