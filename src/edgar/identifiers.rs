// src/edgar/identifiers.rs
use crate::utils::error::EdgarError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

// --- Regex Patterns (Lazy Static) ---
// 10-2-6 digit groups, dashes optional. Searched anywhere in the input.
static ACCESSION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([0-9]{10})-?([0-9]{2})-?([0-9]{6})").expect("Failed to compile ACCESSION_RE")
});

// Same shape, but the whole (trimmed) value must be the accession.
static ACCESSION_EXACT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9]{10}-?[0-9]{2}-?[0-9]{6}$").expect("Failed to compile ACCESSION_EXACT_RE")
});

// .../edgar/data/<cik>/<accession>...
static EDGAR_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/([0-9]{1,10})/([0-9]{10}-?[0-9]{2}-?[0-9]{6})")
        .expect("Failed to compile EDGAR_URL_RE")
});

const CIK_KEYS: &[&str] = &["cik", "firm_id", "cik_str"];
const ACCESSION_KEYS: &[&str] = &["accession", "accession_number", "accession-number", "accession18"];

/// Parses a firm id (CIK) from user input. Surrounding whitespace is ignored.
pub fn normalize_cik(raw: &str) -> Result<u64, EdgarError> {
    raw.trim().parse::<u64>().map_err(|_| {
        EdgarError::InvalidIdentifier(format!(
            "CIKs must be non-negative integers, got {:?}",
            raw
        ))
    })
}

/// Finds a 10-2-6 accession anywhere in `raw` and renders it in the
/// 20-character dashed form, whatever dashes the input carried.
pub fn normalize_accession(raw: &str) -> Result<String, EdgarError> {
    let caps = ACCESSION_RE.captures(raw).ok_or_else(|| {
        EdgarError::InvalidIdentifier(format!(
            "Accessions must look like ##########-##-######, got {:?}",
            raw
        ))
    })?;

    Ok(format!("{}-{}-{}", &caps[1], &caps[2], &caps[3]))
}

/// True when the whole (trimmed) value is accession-shaped.
pub fn is_accession_shaped(raw: &str) -> bool {
    ACCESSION_EXACT_RE.is_match(raw.trim())
}

/// A filing accession number, always stored as `NNNNNNNNNN-NN-NNNNNN`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Accession(String);

impl Accession {
    pub fn parse(raw: &str) -> Result<Self, EdgarError> {
        normalize_accession(raw).map(Accession)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The 18-digit form used in EDGAR archive directory names.
    pub fn no_dashes(&self) -> String {
        self.0.replace('-', "")
    }

    /// The two-digit filing year embedded in the accession.
    pub fn year_digits(&self) -> &str {
        &self.0[11..13]
    }
}

impl fmt::Display for Accession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Accession {
    type Err = EdgarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Accession::parse(s)
    }
}

impl TryFrom<String> for Accession {
    type Error = EdgarError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Accession::parse(&value)
    }
}

impl From<Accession> for String {
    fn from(value: Accession) -> Self {
        value.0
    }
}

/// A fully resolved (CIK, accession) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilingId {
    pub cik: u64,
    pub accession: Accession,
}

impl FilingId {
    pub fn new(cik: u64, accession: &str) -> Result<Self, EdgarError> {
        Ok(Self { cik, accession: Accession::parse(accession)? })
    }

    /// Builds an id from two raw strings, in (cik, accession) order.
    pub fn parse(cik: &str, accession: &str) -> Result<Self, EdgarError> {
        Ok(Self { cik: normalize_cik(cik)?, accession: Accession::parse(accession)? })
    }

    /// CIK zero-padded to 10 digits.
    pub fn cik_padded(&self) -> String {
        format!("{:010}", self.cik)
    }
}

impl fmt::Display for FilingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.cik, self.accession)
    }
}

/// Anything that can hand over raw CIK/accession values.
pub trait HasFilingIdentifiers {
    fn raw_cik(&self) -> Option<String>;
    fn raw_accession(&self) -> Option<String>;
}

impl HasFilingIdentifiers for FilingId {
    fn raw_cik(&self) -> Option<String> {
        Some(self.cik.to_string())
    }

    fn raw_accession(&self) -> Option<String> {
        Some(self.accession.to_string())
    }
}

/// Result of identifier extraction. Either half may be missing; values that
/// are present have already been validated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentifierPair {
    pub cik: Option<u64>,
    pub accession: Option<Accession>,
}

impl IdentifierPair {
    /// Two positional values in either order. The accession-shaped one is the
    /// accession, the other must be a CIK. Both or neither accession-shaped
    /// is ambiguous and rejected.
    pub fn from_pair(first: &str, second: &str) -> Result<Self, EdgarError> {
        let (cik, accession) = match (is_accession_shaped(first), is_accession_shaped(second)) {
            (false, true) => (first, second),
            (true, false) => (second, first),
            (true, true) => {
                return Err(EdgarError::InvalidIdentifier(format!(
                    "Both {:?} and {:?} look like accessions",
                    first, second
                )))
            }
            (false, false) => {
                return Err(EdgarError::InvalidIdentifier(format!(
                    "Neither {:?} nor {:?} looks like an accession",
                    first, second
                )))
            }
        };

        Ok(Self { cik: Some(normalize_cik(cik)?), accession: Some(Accession::parse(accession)?) })
    }

    /// Key/value record. Keys are matched case-insensitively; for each half
    /// the first alias present wins (`cik`, `firm_id`, `cik_str` and
    /// `accession`, `accession_number`, `accession-number`, `accession18`).
    /// Blank values count as missing.
    pub fn from_record<I, K, V>(record: I) -> Result<Self, EdgarError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let lowered: HashMap<String, String> = record
            .into_iter()
            .map(|(k, v)| (k.as_ref().trim().to_lowercase(), v.as_ref().trim().to_string()))
            .filter(|(_, v)| !v.is_empty())
            .collect();

        let cik = CIK_KEYS
            .iter()
            .find_map(|k| lowered.get(*k))
            .map(|v| normalize_cik(v))
            .transpose()?;
        let accession = ACCESSION_KEYS
            .iter()
            .find_map(|k| lowered.get(*k))
            .map(|v| Accession::parse(v))
            .transpose()?;

        Ok(Self { cik, accession })
    }

    /// Object exposing its identifiers through `HasFilingIdentifiers`.
    pub fn from_object<T: HasFilingIdentifiers + ?Sized>(obj: &T) -> Result<Self, EdgarError> {
        let cik = obj
            .raw_cik()
            .filter(|v| !v.trim().is_empty())
            .map(|v| normalize_cik(&v))
            .transpose()?;
        let accession = obj
            .raw_accession()
            .filter(|v| !v.trim().is_empty())
            .map(|v| Accession::parse(&v))
            .transpose()?;

        Ok(Self { cik, accession })
    }

    pub fn is_complete(&self) -> bool {
        self.cik.is_some() && self.accession.is_some()
    }

    pub fn into_filing_id(self) -> Result<FilingId, EdgarError> {
        match (self.cik, self.accession) {
            (Some(cik), Some(accession)) => Ok(FilingId { cik, accession }),
            (cik, accession) => Err(EdgarError::InvalidIdentifier(format!(
                "Incomplete identifier: cik={:?}, accession={:?}",
                cik,
                accession.map(String::from)
            ))),
        }
    }
}

/// Pulls (CIK, accession) out of an EDGAR HTTP or FTP URL, e.g.
/// `https://www.sec.gov/Archives/edgar/data/2098/0001026608-05-000015.txt`.
pub fn parse_edgar_url(url: &str) -> Option<IdentifierPair> {
    let caps = EDGAR_URL_RE.captures(url)?;
    let cik = normalize_cik(&caps[1]).ok()?;
    let accession = Accession::parse(&caps[2]).ok()?;
    Some(IdentifierPair { cik: Some(cik), accession: Some(accession) })
}

/// Accession from a feed member or cache file name such as
/// `./0001234567-20-000123.nc`.
pub fn accession_from_file_name(name: &str) -> Option<Accession> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    Accession::parse(base).ok()
}
