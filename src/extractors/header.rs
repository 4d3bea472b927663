// src/extractors/header.rs

// --- Imports ---
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;

// --- Constants ---
/// Marks the end of the envelope header: the first sub-document.
pub const DOCUMENT_OPEN_TAG: &str = "<DOCUMENT>";
/// Web-rendered filings carry this line near the top; feed SGML does not.
const PLAINTEXT_SNIFF: &str = "ACCESSION NUMBER:";
const SNIFF_WINDOW: usize = 2000;

// --- Regex Patterns (Lazy Static) ---
// `R` makes `.`/`$` treat CRLF as a line break, so Windows-ended filings
// behave like the rest.

// <KEY>VALUE only. No </KEY> and no bare <KEY> lines.
static SGML_VALUE_TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?mR)^<(?P<key>[^/>\r\n][^>\r\n]*)>[ \t]*(?P<value>.+)$")
        .expect("Failed to compile SGML_VALUE_TAG_RE")
});

// Any line-start tag: <KEY>, <KEY>VALUE or </KEY>.
static SGML_ANY_TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?mR)^<(?P<key>/?[^>\r\n]*)>(?P<value>.*)$")
        .expect("Failed to compile SGML_ANY_TAG_RE")
});

// KEY: VALUE, with leading whitespace giving the nesting depth.
static PLAINTEXT_TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?mR)^(?P<indent>[ \t]*)(?P<key>[^\r\n:]+):[ \t]*(?P<value>.+)?$")
        .expect("Failed to compile PLAINTEXT_TAG_RE")
});

// --- Data Structures ---
pub type HeaderMap = BTreeMap<String, HeaderValue>;

/// One header slot. Leaves are `Text`; duplicates accumulate into `List`;
/// open/close tag pairs (or indented blocks) become `Section`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum HeaderValue {
    Text(String),
    List(Vec<HeaderValue>),
    Section(HeaderMap),
}

impl HeaderValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            HeaderValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_section(&self) -> Option<&HeaderMap> {
        match self {
            HeaderValue::Section(m) => Some(m),
            _ => None,
        }
    }

    /// The value itself if it is text, or the first text item of a list.
    pub fn first_text(&self) -> Option<&str> {
        match self {
            HeaderValue::Text(s) => Some(s),
            HeaderValue::List(items) => items.iter().find_map(HeaderValue::as_text),
            HeaderValue::Section(_) => None,
        }
    }

    /// Every text leaf held directly by this slot (sections are skipped).
    pub fn texts(&self) -> Vec<&str> {
        match self {
            HeaderValue::Text(s) => vec![s.as_str()],
            HeaderValue::List(items) => items.iter().filter_map(HeaderValue::as_text).collect(),
            HeaderValue::Section(_) => Vec::new(),
        }
    }
}

/// What to do when a key shows up twice in the same scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum DuplicatePolicy {
    /// First occurrence wins.
    Omit,
    /// Later occurrences are stored as `key_1`, `key_2`, ...
    Suffix,
    /// Later occurrences are appended to a list at `key`.
    #[default]
    Accumulate,
}

impl DuplicatePolicy {
    /// Maps the old `omit_duplicates` / `add_int_to_name` flag pair onto the
    /// enum. `omit` takes priority when both are set.
    pub fn from_legacy_flags(omit_duplicates: bool, add_int_to_name: bool) -> Self {
        if omit_duplicates {
            DuplicatePolicy::Omit
        } else if add_int_to_name {
            DuplicatePolicy::Suffix
        } else {
            DuplicatePolicy::Accumulate
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum HeaderLayout {
    #[default]
    Flat,
    Nested,
}

/// Header dialect: `<KEY>VALUE` tags from the bulk feed, or indented
/// `KEY: VALUE` lines from the website rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HeaderFormat {
    Sgml,
    Plaintext,
}

impl HeaderFormat {
    /// Heuristic sniff of the first ~2000 bytes.
    pub fn detect(text: &str) -> Self {
        let head = &text[..floor_char_boundary(text, SNIFF_WINDOW)];
        if head.contains(PLAINTEXT_SNIFF) {
            HeaderFormat::Plaintext
        } else {
            HeaderFormat::Sgml
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeaderOptions {
    pub layout: HeaderLayout,
    pub policy: DuplicatePolicy,
    /// `None` sniffs the format from the text.
    pub format: Option<HeaderFormat>,
}

// --- Public Entry Points ---

/// Parses the envelope header (everything before the first `<DOCUMENT>`).
pub fn parse_headers(text: &str, options: &HeaderOptions) -> HeaderMap {
    let format = options.format.unwrap_or_else(|| HeaderFormat::detect(text));
    tracing::trace!("Parsing {:?} headers as {:?}", options.layout, format);

    match (format, options.layout) {
        (HeaderFormat::Sgml, HeaderLayout::Flat) => parse_sgml_flat(text, 0, None, options.policy),
        (HeaderFormat::Sgml, HeaderLayout::Nested) => parse_sgml_nested(text, 0, None, options.policy),
        (HeaderFormat::Plaintext, HeaderLayout::Flat) => parse_plaintext_flat(text, 0, None, options.policy),
        (HeaderFormat::Plaintext, HeaderLayout::Nested) => {
            parse_plaintext_nested(text, 0, None, options.policy)
        }
    }
}

/// Every `<KEY>VALUE` line in `[pos, endpos)` in one flat map. Lines without
/// a value are skipped.
pub fn parse_sgml_flat(text: &str, pos: usize, endpos: Option<usize>, policy: DuplicatePolicy) -> HeaderMap {
    let (start, end) = resolve_range(text, pos, endpos);
    let mut map = HeaderMap::new();

    for caps in SGML_VALUE_TAG_RE.captures_iter(&text[start..end]) {
        let key = clean_key(&caps["key"]);
        let value = caps["value"].trim();
        if key.is_empty() || value.is_empty() {
            continue;
        }
        insert_text(&mut map, key, value.to_string(), policy);
    }

    map
}

/// Tag-delimited headers as a tree. A bare `<KEY>` opens a section only when
/// a matching `</KEY>` follows inside the range; otherwise it is ignored.
/// Any closing tag pops one scope (never the root), and sections still open
/// at the end of the range are closed there.
pub fn parse_sgml_nested(text: &str, pos: usize, endpos: Option<usize>, policy: DuplicatePolicy) -> HeaderMap {
    let (start, end) = resolve_range(text, pos, endpos);
    let window = &text[start..end];
    // ASCII lowering keeps byte offsets identical to `window`.
    let mut lowered: Option<String> = None;
    let mut scopes = ScopeStack::new(policy);

    for caps in SGML_ANY_TAG_RE.captures_iter(window) {
        let raw_key = &caps["key"];

        if raw_key.starts_with('/') {
            if !scopes.pop() {
                tracing::trace!("Ignoring unmatched closing tag <{}>", raw_key);
            }
            continue;
        }

        let key = clean_key(raw_key);
        if key.is_empty() {
            continue;
        }

        let value = caps["value"].trim();
        if !value.is_empty() {
            scopes.insert_text(key, value.to_string());
            continue;
        }

        let after = caps.get(0).map_or(window.len(), |m| m.end());
        let haystack = lowered.get_or_insert_with(|| window.to_ascii_lowercase());
        let closing = format!("</{}>", raw_key.trim().to_ascii_lowercase());

        if haystack[after..].contains(&closing) {
            scopes.push(key);
        } else {
            tracing::trace!("Stray <{}> with no value and no closing tag", raw_key);
        }
    }

    scopes.finish()
}

/// Every `KEY: VALUE` line in `[pos, endpos)` in one flat map, ignoring
/// indentation. Lines without a value are skipped.
pub fn parse_plaintext_flat(text: &str, pos: usize, endpos: Option<usize>, policy: DuplicatePolicy) -> HeaderMap {
    let (start, end) = resolve_range(text, pos, endpos);
    let mut map = HeaderMap::new();

    for caps in PLAINTEXT_TAG_RE.captures_iter(&text[start..end]) {
        let key = clean_plaintext_key(&caps["key"]);
        let value = caps.name("value").map_or("", |m| m.as_str().trim());
        if key.is_empty() || value.is_empty() {
            continue;
        }
        insert_text(&mut map, key, value.to_string(), policy);
    }

    map
}

/// Indented `KEY: VALUE` headers as a tree. A line with no value opens a
/// section; a line indented less than the current depth closes scopes until
/// the depth is `indent + 1`.
pub fn parse_plaintext_nested(
    text: &str,
    pos: usize,
    endpos: Option<usize>,
    policy: DuplicatePolicy,
) -> HeaderMap {
    let (start, end) = resolve_range(text, pos, endpos);
    let mut scopes = ScopeStack::new(policy);

    for caps in PLAINTEXT_TAG_RE.captures_iter(&text[start..end]) {
        let indent = caps.name("indent").map_or(0, |m| m.as_str().len());
        let key = clean_plaintext_key(&caps["key"]);
        if key.is_empty() {
            continue;
        }

        while scopes.depth() > indent + 1 {
            scopes.pop();
        }

        let value = caps.name("value").map_or("", |m| m.as_str().trim());
        if value.is_empty() {
            scopes.push(key);
        } else {
            scopes.insert_text(key, value.to_string());
        }
    }

    scopes.finish()
}

/// Value of the first `<KEY>VALUE` line in range (case-insensitive on the
/// key), trimmed, or an empty string.
pub fn get_header(text: &str, key: &str, pos: usize, endpos: Option<usize>) -> String {
    let (start, end) = resolve_range(text, pos, endpos);
    let pattern = format!(r"(?miR)^<{}>(.+)$", regex::escape(key));

    let re = match Regex::new(&pattern) {
        Ok(re) => re,
        Err(e) => {
            tracing::debug!("Could not build header pattern for {:?}: {}", key, e);
            return String::new();
        }
    };

    re.captures(&text[start..end])
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

/// Default header window: from `pos` to the first `<DOCUMENT>` after it, or
/// the end of the text.
pub fn header_bounds(text: &str, pos: usize) -> (usize, usize) {
    let pos = floor_char_boundary(text, pos);
    let end = text[pos..]
        .find(DOCUMENT_OPEN_TAG)
        .map_or(text.len(), |offset| pos + offset);
    (pos, end)
}

/// First text value stored directly under `key` in `map`.
pub fn first_text<'a>(map: &'a HeaderMap, key: &str) -> Option<&'a str> {
    map.get(key).and_then(HeaderValue::first_text)
}

/// Plaintext keys are lowercased and trimmed, and spaces become dashes.
/// Ordinal suffixes (`Filer 1` -> `filer-1`) and multi-word keys
/// (`ACCESSION NUMBER` -> `accession-number`) end up in the same shape as the
/// SGML tag names.
pub fn clean_plaintext_key(raw: &str) -> String {
    raw.trim().to_lowercase().replace(' ', "-")
}

// --- Internal Helpers ---

fn clean_key(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn floor_char_boundary(text: &str, mut idx: usize) -> usize {
    idx = idx.min(text.len());
    while idx > 0 && !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn resolve_range(text: &str, pos: usize, endpos: Option<usize>) -> (usize, usize) {
    match endpos {
        Some(endpos) => {
            let end = floor_char_boundary(text, endpos);
            (floor_char_boundary(text, pos.min(end)), end)
        }
        None => header_bounds(text, pos),
    }
}

fn next_free_suffix(map: &HeaderMap, key: &str) -> String {
    (1..)
        .map(|i| format!("{}_{}", key, i))
        .find(|candidate| !map.contains_key(candidate))
        .unwrap_or_else(|| format!("{}_overflow", key))
}

fn append_to_slot(slot: &mut HeaderValue, value: HeaderValue) {
    match slot {
        HeaderValue::List(items) => items.push(value),
        other => {
            let first = std::mem::replace(other, HeaderValue::List(Vec::with_capacity(2)));
            *other = HeaderValue::List(vec![first, value]);
        }
    }
}

fn insert_text(map: &mut HeaderMap, key: String, value: String, policy: DuplicatePolicy) {
    let Some(existing) = map.get_mut(&key) else {
        map.insert(key, HeaderValue::Text(value));
        return;
    };

    match policy {
        DuplicatePolicy::Omit => {}
        DuplicatePolicy::Accumulate => append_to_slot(existing, HeaderValue::Text(value)),
        DuplicatePolicy::Suffix => {
            let renamed = next_free_suffix(map, &key);
            map.insert(renamed, HeaderValue::Text(value));
        }
    }
}

// Sections are never dropped: under `Omit` a repeated section is renamed
// like `Suffix` would.
fn insert_section(map: &mut HeaderMap, key: String, section: HeaderMap, policy: DuplicatePolicy) {
    let Some(existing) = map.get_mut(&key) else {
        map.insert(key, HeaderValue::Section(section));
        return;
    };

    match policy {
        DuplicatePolicy::Accumulate => append_to_slot(existing, HeaderValue::Section(section)),
        DuplicatePolicy::Omit | DuplicatePolicy::Suffix => {
            let renamed = next_free_suffix(map, &key);
            map.insert(renamed, HeaderValue::Section(section));
        }
    }
}

/// Root scope plus the sections currently open above it. A section is
/// attached to its parent when it is popped; the parent cannot change while
/// the child is open, so duplicate handling sees the same state either way.
struct ScopeStack {
    root: HeaderMap,
    open: Vec<(String, HeaderMap)>,
    policy: DuplicatePolicy,
}

impl ScopeStack {
    fn new(policy: DuplicatePolicy) -> Self {
        Self { root: HeaderMap::new(), open: Vec::new(), policy }
    }

    fn depth(&self) -> usize {
        self.open.len() + 1
    }

    fn current(&mut self) -> &mut HeaderMap {
        match self.open.last_mut() {
            Some((_, map)) => map,
            None => &mut self.root,
        }
    }

    fn insert_text(&mut self, key: String, value: String) {
        let policy = self.policy;
        insert_text(self.current(), key, value, policy);
    }

    fn push(&mut self, key: String) {
        self.open.push((key, HeaderMap::new()));
    }

    /// Closes the innermost section. Returns false at the root.
    fn pop(&mut self) -> bool {
        let Some((key, section)) = self.open.pop() else {
            return false;
        };
        let policy = self.policy;
        insert_section(self.current(), key, section, policy);
        true
    }

    fn finish(mut self) -> HeaderMap {
        while self.pop() {}
        self.root
    }
}

// --- Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> HeaderValue {
        HeaderValue::Text(s.to_string())
    }

    const FEED_HEADER: &str = "<SUBMISSION>\n\
<ACCESSION-NUMBER>0001234567-20-000123\n\
<TYPE>10-K\n\
<PUBLIC-DOCUMENT-COUNT>2\n\
<ITEMS>5.02\n\
<ITEMS>9.01\n\
<FILER>\n\
<COMPANY-DATA>\n\
<CONFORMED-NAME>ACME CORP\n\
<CIK>0000123456\n\
</COMPANY-DATA>\n\
</FILER>\n\
<DOCUMENT>\n\
<TYPE>EX-99\n\
<TEXT>\nbody\n</TEXT>\n\
</DOCUMENT>\n\
</SUBMISSION>\n";

    #[test]
    fn test_nested_filer_block() {
        let map = parse_sgml_nested("<FILER>\n<CIK>0000123456\n</FILER>\n", 0, None, DuplicatePolicy::default());
        let mut filer = HeaderMap::new();
        filer.insert("cik".to_string(), text("0000123456"));
        let mut expected = HeaderMap::new();
        expected.insert("filer".to_string(), HeaderValue::Section(filer));
        assert_eq!(map, expected);
    }

    #[test]
    fn test_nested_envelope_stops_at_first_document() {
        let map = parse_sgml_nested(FEED_HEADER, 0, None, DuplicatePolicy::Accumulate);
        // <SUBMISSION> closes after the documents, outside the header window
        assert!(!map.contains_key("submission"));
        assert_eq!(first_text(&map, "type"), Some("10-K"));
        let company = map["filer"].as_section().unwrap()["company-data"].as_section().unwrap();
        assert_eq!(company["conformed-name"], text("ACME CORP"));
        assert_eq!(map["items"], HeaderValue::List(vec![text("5.02"), text("9.01")]));
    }

    #[test]
    fn test_flat_collects_all_leaves() {
        let map = parse_sgml_flat(FEED_HEADER, 0, None, DuplicatePolicy::Accumulate);
        assert_eq!(first_text(&map, "cik"), Some("0000123456"));
        assert_eq!(first_text(&map, "conformed-name"), Some("ACME CORP"));
        // Only the envelope TYPE, the document TYPE is past the boundary
        assert_eq!(map["type"], text("10-K"));
        assert!(!map.contains_key("filer"));
    }

    #[test]
    fn test_duplicate_policies() {
        let block = "<ITEMS>5.02\n<ITEMS>9.01\n";

        let omit = parse_sgml_flat(block, 0, None, DuplicatePolicy::Omit);
        assert_eq!(omit.len(), 1);
        assert_eq!(omit["items"], text("5.02"));

        let suffix = parse_sgml_flat(block, 0, None, DuplicatePolicy::Suffix);
        assert_eq!(suffix["items"], text("5.02"));
        assert_eq!(suffix["items_1"], text("9.01"));

        let acc = parse_sgml_flat(block, 0, None, DuplicatePolicy::Accumulate);
        assert_eq!(acc.len(), 1);
        assert_eq!(acc["items"], HeaderValue::List(vec![text("5.02"), text("9.01")]));
    }

    #[test]
    fn test_suffix_takes_first_free_integer() {
        let map = parse_sgml_flat("<A>1\n<A_1>x\n<A>2\n<A>3\n", 0, None, DuplicatePolicy::Suffix);
        assert_eq!(map["a"], text("1"));
        assert_eq!(map["a_1"], text("x"));
        assert_eq!(map["a_2"], text("2"));
        assert_eq!(map["a_3"], text("3"));
    }

    #[test]
    fn test_accumulate_grows_past_two() {
        let map = parse_sgml_flat("<A>1\n<A>2\n<A>3\n", 0, None, DuplicatePolicy::Accumulate);
        assert_eq!(map["a"], HeaderValue::List(vec![text("1"), text("2"), text("3")]));
    }

    #[test]
    fn test_legacy_flags_shim() {
        assert_eq!(DuplicatePolicy::from_legacy_flags(true, true), DuplicatePolicy::Omit);
        assert_eq!(DuplicatePolicy::from_legacy_flags(false, true), DuplicatePolicy::Suffix);
        assert_eq!(DuplicatePolicy::from_legacy_flags(false, false), DuplicatePolicy::Accumulate);
    }

    #[test]
    fn test_repeated_sections_are_kept() {
        let block = "<FILER>\n<CIK>1\n</FILER>\n<FILER>\n<CIK>2\n</FILER>\n";

        let acc = parse_sgml_nested(block, 0, None, DuplicatePolicy::Accumulate);
        match &acc["filer"] {
            HeaderValue::List(items) => {
                assert_eq!(items.len(), 2);
                assert_eq!(items[1].as_section().unwrap()["cik"], text("2"));
            }
            other => panic!("expected list of sections, got {:?}", other),
        }

        for policy in [DuplicatePolicy::Suffix, DuplicatePolicy::Omit] {
            let map = parse_sgml_nested(block, 0, None, policy);
            assert_eq!(map["filer"].as_section().unwrap()["cik"], text("1"));
            assert_eq!(map["filer_1"].as_section().unwrap()["cik"], text("2"));
        }
    }

    #[test]
    fn test_stray_open_tag_is_noop() {
        let map = parse_sgml_nested("<PAPER>\n<CIK>1\n", 0, None, DuplicatePolicy::default());
        assert!(!map.contains_key("paper"));
        assert_eq!(map["cik"], text("1"));
    }

    #[test]
    fn test_unmatched_close_is_ignored() {
        let map = parse_sgml_nested("</FILER>\n<CIK>1\n</FILER>\n<TYPE>4\n", 0, None, DuplicatePolicy::default());
        assert_eq!(map["cik"], text("1"));
        assert_eq!(map["type"], text("4"));
    }

    #[test]
    fn test_closing_tag_is_case_insensitive() {
        let map = parse_sgml_nested("<Filer>\n<CIK>1\n</FILER>\n", 0, None, DuplicatePolicy::default());
        assert_eq!(map["filer"].as_section().unwrap()["cik"], text("1"));
    }

    #[test]
    fn test_closing_tag_pops_innermost_scope() {
        // </A> closes B (a pure stack pop), then </B> closes A
        let map = parse_sgml_nested("<A>\n<B>\n<X>1\n</A>\n<Y>2\n</B>\n", 0, None, DuplicatePolicy::default());
        let a = map["a"].as_section().unwrap();
        assert_eq!(a["b"].as_section().unwrap()["x"], text("1"));
        assert_eq!(a["y"], text("2"));
    }

    #[test]
    fn test_unclosed_sections_close_at_range_end() {
        // Both <A> lines see a later </A>, but only one close exists
        let map = parse_sgml_nested("<A>\n<A>\n<X>1\n</A>\n<Y>2\n", 0, None, DuplicatePolicy::default());
        let outer = map["a"].as_section().unwrap();
        assert_eq!(outer["a"].as_section().unwrap()["x"], text("1"));
        assert_eq!(outer["y"], text("2"));
    }

    #[test]
    fn test_explicit_range_and_crlf() {
        let block = "<A>1\r\n<B> 2 \r\n<C>3\r\n";
        let end = block.find("<C>").unwrap();
        let map = parse_sgml_flat(block, 0, Some(end), DuplicatePolicy::default());
        assert_eq!(map["a"], text("1"));
        assert_eq!(map["b"], text("2"));
        assert!(!map.contains_key("c"));
    }

    #[test]
    fn test_range_clamped_to_char_boundaries() {
        let block = "<A>caf\u{e9}\n<B>2\n";
        // endpos inside the two-byte é and past the end are both tolerated
        let inside = block.find('\u{e9}').unwrap() + 1;
        let _ = parse_sgml_flat(block, 0, Some(inside), DuplicatePolicy::default());
        let map = parse_sgml_flat(block, 0, Some(10_000), DuplicatePolicy::default());
        assert_eq!(map["a"], text("caf\u{e9}"));
        assert!(parse_sgml_flat(block, 500, Some(10_000), DuplicatePolicy::default()).is_empty());
    }

    #[test]
    fn test_plaintext_detection_and_nesting() {
        let block = "ACCESSION NUMBER:\t0001234567-20-000123\nFiler 1:\n\tCIK:\t1234\n";
        assert_eq!(HeaderFormat::detect(block), HeaderFormat::Plaintext);

        let options = HeaderOptions { layout: HeaderLayout::Nested, ..Default::default() };
        let map = parse_headers(block, &options);
        assert_eq!(map["accession-number"], text("0001234567-20-000123"));
        assert_eq!(map["filer-1"].as_section().unwrap()["cik"], text("1234"));
    }

    #[test]
    fn test_plaintext_outdent_pops_scopes() {
        let block = "ACCESSION NUMBER:\t1\n\
FILER:\n\
\tCOMPANY DATA:\n\
\t\tCOMPANY CONFORMED NAME:\tACME CORP\n\
\t\tCENTRAL INDEX KEY:\t0000123456\n\
\tFILING VALUES:\n\
\t\tFORM TYPE:\t10-K\n\
CONFORMED SUBMISSION TYPE:\t10-K\n";
        let map = parse_plaintext_nested(block, 0, None, DuplicatePolicy::default());
        let filer = map["filer"].as_section().unwrap();
        assert_eq!(filer["company-data"].as_section().unwrap()["company-conformed-name"], text("ACME CORP"));
        assert_eq!(filer["filing-values"].as_section().unwrap()["form-type"], text("10-K"));
        assert_eq!(map["conformed-submission-type"], text("10-K"));
    }

    #[test]
    fn test_plaintext_flat() {
        let block = "ACCESSION NUMBER:\t1\nFILER:\n\tCIK:\t1\nFILER:\n\tCIK:\t2\n";
        let map = parse_plaintext_flat(block, 0, None, DuplicatePolicy::Accumulate);
        assert!(!map.contains_key("filer"));
        assert_eq!(map["cik"], HeaderValue::List(vec![text("1"), text("2")]));
    }

    #[test]
    fn test_sgml_forced_on_plaintext_looking_text() {
        let block = "ACCESSION NUMBER:\t1\n<TYPE>8-K\n";
        let options = HeaderOptions { format: Some(HeaderFormat::Sgml), ..Default::default() };
        let map = parse_headers(block, &options);
        assert_eq!(map.len(), 1);
        assert_eq!(map["type"], text("8-K"));
    }

    #[test]
    fn test_sniff_only_looks_at_head() {
        let block = format!("<TYPE>4\n{}ACCESSION NUMBER:\t1\n", " ".repeat(SNIFF_WINDOW));
        assert_eq!(HeaderFormat::detect(&block), HeaderFormat::Sgml);
    }

    #[test]
    fn test_clean_plaintext_key() {
        assert_eq!(clean_plaintext_key(" Filer 1 "), "filer-1");
        assert_eq!(clean_plaintext_key("ACCESSION NUMBER"), "accession-number");
        assert_eq!(clean_plaintext_key("STREET 2"), "street-2");
    }

    #[test]
    fn test_get_header() {
        assert_eq!(get_header(FEED_HEADER, "type", 0, None), "10-K");
        assert_eq!(get_header(FEED_HEADER, "CIK", 0, None), "0000123456");
        assert_eq!(get_header(FEED_HEADER, "PERIOD", 0, None), "");
        // Document-local lookup with an explicit window
        let doc = FEED_HEADER.find("<DOCUMENT>").unwrap();
        assert_eq!(get_header(FEED_HEADER, "TYPE", doc, Some(FEED_HEADER.len())), "EX-99");
        // Metacharacters in the key are literal
        assert_eq!(get_header("<A.B>1\n<AXB>2\n", "A.B", 0, None), "1");
    }

    #[test]
    fn test_header_bounds() {
        let doc = FEED_HEADER.find("<DOCUMENT>").unwrap();
        assert_eq!(header_bounds(FEED_HEADER, 0), (0, doc));
        assert_eq!(header_bounds("<A>1\n", 0), (0, 5));
    }

    #[test]
    fn test_serializes_as_plain_json() {
        let map = parse_sgml_nested("<FILER>\n<CIK>1\n</FILER>\n<A>x\n<A>y\n", 0, None, DuplicatePolicy::default());
        let json = serde_json::to_value(&map).unwrap();
        assert_eq!(json, serde_json::json!({"a": ["x", "y"], "filer": {"cik": "1"}}));
    }
}
