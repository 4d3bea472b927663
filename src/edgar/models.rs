// src/edgar/models.rs
use crate::edgar::forms::{FilingType, FormCategory};
use crate::edgar::identifiers::{Accession, FilingId, HasFilingIdentifiers};
use crate::extractors::encoding::DecodeMode;
use crate::extractors::header::{first_text, HeaderMap};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One row per filing, as handed to whatever builds the tabular index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilingRecord {
    pub cik: u64,
    pub accession: Accession,
    pub form_type: Option<String>,
    pub form_category: Option<FormCategory>,
    pub company_name: Option<String>,
    pub filed_date: Option<NaiveDate>,
    pub local_path: Option<PathBuf>,
    pub encoding: Option<String>,
    pub decode_mode: Option<DecodeMode>,
}

impl FilingRecord {
    pub fn new(id: FilingId) -> Self {
        Self {
            cik: id.cik,
            accession: id.accession,
            form_type: None,
            form_category: None,
            company_name: None,
            filed_date: None,
            local_path: None,
            encoding: None,
            decode_mode: None,
        }
    }

    /// Fills the descriptive columns from a flat header map. Feed headers
    /// use `<TYPE>`/`<FORM-TYPE>` and `<FILING-DATE>`; web headers use
    /// `conformed-submission-type` and `filed-as-of-date`.
    pub fn with_headers(mut self, headers: &HeaderMap) -> Self {
        let form_type = ["form-type", "type", "conformed-submission-type"]
            .iter()
            .find_map(|key| first_text(headers, key))
            .filter(|value| !value.is_empty());
        if let Some(exact) = form_type {
            let filing_type = FilingType::new(exact);
            self.form_category = Some(filing_type.category);
            self.form_type = Some(filing_type.exact);
        }

        self.company_name = ["conformed-name", "company-conformed-name"]
            .iter()
            .find_map(|key| first_text(headers, key))
            .map(str::to_string);

        self.filed_date = ["filing-date", "filed-as-of-date"]
            .iter()
            .find_map(|key| first_text(headers, key))
            .and_then(|raw| NaiveDate::parse_from_str(raw, "%Y%m%d").ok());

        self
    }

    pub fn filing_id(&self) -> FilingId {
        FilingId { cik: self.cik, accession: self.accession.clone() }
    }
}

impl HasFilingIdentifiers for FilingRecord {
    fn raw_cik(&self) -> Option<String> {
        Some(self.cik.to_string())
    }

    fn raw_accession(&self) -> Option<String> {
        Some(self.accession.to_string())
    }
}
