// src/storage/template.rs
use crate::edgar::identifiers::FilingId;
use crate::utils::error::StorageError;
use chrono::{Datelike, NaiveDate};
use std::fmt::Write;

// --- Constants ---
pub const MAX_TEMPLATE_LEN: usize = 250;
pub const DEFAULT_FILING_TEMPLATE: &str = "{accession[11:13]}/{accession}.nc";
pub const DEFAULT_FEED_TEMPLATE: &str = "sec_daily_{date:%Y-%m-%d}.tar.gz";
const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Which values a template may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    /// `cik`, `cik_str`, `accession`, `accession18`
    Filing,
    /// `date`, `year`, `quarter`
    Feed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Field {
    Cik,
    CikPadded,
    Accession,
    AccessionNoDashes,
    Date(String),
    Year,
    Quarter,
}

/// `[start:end]` with Python semantics: negative bounds count from the end,
/// out-of-range bounds clamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slice {
    start: Option<i64>,
    end: Option<i64>,
}

impl Slice {
    fn parse(inner: &str) -> Result<Self, StorageError> {
        let (start, end) = inner
            .split_once(':')
            .ok_or_else(|| template_error(format!("slice [{}] must look like [start:end]", inner)))?;
        Ok(Self { start: parse_bound(start)?, end: parse_bound(end)? })
    }

    fn apply(&self, value: &str) -> String {
        let chars: Vec<char> = value.chars().collect();
        let len = chars.len() as i64;
        let resolve = |bound: i64| if bound < 0 { (bound + len).max(0) } else { bound.min(len) };

        let start = self.start.map_or(0, resolve);
        let end = self.end.map_or(len, resolve);
        if start >= end {
            return String::new();
        }
        chars[start as usize..end as usize].iter().collect()
    }
}

fn parse_bound(raw: &str) -> Result<Option<i64>, StorageError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<i64>()
        .map(Some)
        .map_err(|_| template_error(format!("slice bound {:?} is not an integer", raw)))
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder { field: Field, slice: Option<Slice> },
}

/// A parsed path template. Parsing checks every placeholder, so rendering a
/// template of the right kind only fails if the result is not a relative
/// path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    source: String,
    kind: TemplateKind,
    segments: Vec<Segment>,
}

impl PathTemplate {
    pub fn for_filings(source: &str) -> Result<Self, StorageError> {
        Self::parse(source, TemplateKind::Filing)
    }

    pub fn for_feeds(source: &str) -> Result<Self, StorageError> {
        Self::parse(source, TemplateKind::Feed)
    }

    pub fn parse(source: &str, kind: TemplateKind) -> Result<Self, StorageError> {
        if source.trim().is_empty() {
            return Err(template_error("template is empty".to_string()));
        }
        if source.chars().count() > MAX_TEMPLATE_LEN {
            return Err(template_error(format!("template is longer than {} characters", MAX_TEMPLATE_LEN)));
        }

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = source;

        while !rest.is_empty() {
            if let Some(tail) = rest.strip_prefix("{{") {
                literal.push('{');
                rest = tail;
            } else if let Some(tail) = rest.strip_prefix("}}") {
                literal.push('}');
                rest = tail;
            } else if let Some(tail) = rest.strip_prefix('{') {
                let close = tail
                    .find('}')
                    .ok_or_else(|| template_error(format!("unclosed '{{' in {:?}", source)))?;
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(parse_placeholder(&tail[..close], kind)?);
                rest = &tail[close + 1..];
            } else if rest.starts_with('}') {
                return Err(template_error(format!("single '}}' in {:?}", source)));
            } else {
                let mut chars = rest.chars();
                if let Some(c) = chars.next() {
                    literal.push(c);
                }
                rest = chars.as_str();
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self { source: source.to_string(), kind, segments })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn kind(&self) -> TemplateKind {
        self.kind
    }

    pub fn render_filing(&self, id: &FilingId) -> Result<String, StorageError> {
        self.expect_kind(TemplateKind::Filing)?;
        self.render_with(|field| match field {
            Field::Cik => id.cik.to_string(),
            Field::CikPadded => id.cik_padded(),
            Field::Accession => id.accession.to_string(),
            Field::AccessionNoDashes => id.accession.no_dashes(),
            // Excluded by parse
            _ => String::new(),
        })
    }

    pub fn render_feed(&self, date: NaiveDate) -> Result<String, StorageError> {
        self.expect_kind(TemplateKind::Feed)?;
        self.render_with(|field| match field {
            Field::Date(format) => format_date(date, format).unwrap_or_default(),
            Field::Year => date.year().to_string(),
            Field::Quarter => (date.month0() / 3 + 1).to_string(),
            _ => String::new(),
        })
    }

    fn expect_kind(&self, kind: TemplateKind) -> Result<(), StorageError> {
        if self.kind != kind {
            return Err(template_error(format!(
                "{:?} is a {:?} template, not a {:?} template",
                self.source, self.kind, kind
            )));
        }
        Ok(())
    }

    fn render_with(&self, value: impl Fn(&Field) -> String) -> Result<String, StorageError> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder { field, slice } => {
                    let raw = value(field);
                    match slice {
                        Some(slice) => out.push_str(&slice.apply(&raw)),
                        None => out.push_str(&raw),
                    }
                }
            }
        }

        if out.is_empty() || out.starts_with('/') || out.starts_with('\\') {
            return Err(template_error(format!("{:?} rendered to non-relative path {:?}", self.source, out)));
        }
        Ok(out)
    }
}

fn parse_placeholder(body: &str, kind: TemplateKind) -> Result<Segment, StorageError> {
    // The format colon comes after any slice brackets
    let format_colon = match body.find(']') {
        Some(close) => body[close..].find(':').map(|offset| close + offset),
        None => body.find(':'),
    };
    let (head, format) = match format_colon {
        Some(colon) => (&body[..colon], Some(&body[colon + 1..])),
        None => (body, None),
    };

    let (name, slice) = match head.find('[') {
        Some(open) => {
            let inner = head[open + 1..]
                .strip_suffix(']')
                .ok_or_else(|| template_error(format!("unclosed slice in {{{}}}", body)))?;
            (&head[..open], Some(Slice::parse(inner)?))
        }
        None => (head, None),
    };

    let field = match (name.trim(), kind) {
        ("cik", TemplateKind::Filing) => Field::Cik,
        ("cik_str" | "cik_padded", TemplateKind::Filing) => Field::CikPadded,
        ("accession", TemplateKind::Filing) => Field::Accession,
        ("accession18" | "accession_no_dashes", TemplateKind::Filing) => Field::AccessionNoDashes,
        ("date", TemplateKind::Feed) => {
            let format = format.unwrap_or(DEFAULT_DATE_FORMAT);
            if NaiveDate::from_ymd_opt(2000, 1, 1).and_then(|d| format_date(d, format)).is_none() {
                return Err(template_error(format!("invalid date format {:?}", format)));
            }
            Field::Date(format.to_string())
        }
        ("year", TemplateKind::Feed) => Field::Year,
        ("quarter", TemplateKind::Feed) => Field::Quarter,
        (other, kind) => {
            return Err(template_error(format!("unknown field {:?} for a {:?} template", other, kind)));
        }
    };

    if format.is_some() && !matches!(field, Field::Date(_)) {
        return Err(template_error(format!("only date accepts a format spec: {{{}}}", body)));
    }

    Ok(Segment::Placeholder { field, slice })
}

/// `None` when the format has bad specifiers or asks for time fields.
fn format_date(date: NaiveDate, format: &str) -> Option<String> {
    let mut out = String::new();
    write!(out, "{}", date.format(format)).ok()?;
    Some(out)
}

fn template_error(message: String) -> StorageError {
    StorageError::Template(message)
}
