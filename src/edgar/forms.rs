// src/edgar/forms.rs
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse filing family derived from the filer-supplied `<TYPE>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormCategory {
    #[serde(rename = "3")]
    Form3,
    #[serde(rename = "4")]
    Form4,
    #[serde(rename = "8-K")]
    Form8K,
    #[serde(rename = "10-K")]
    Form10K,
    #[serde(rename = "10-Q")]
    Form10Q,
    #[serde(rename = "DEF14A")]
    FormDef14A,
    #[serde(rename = "13G")]
    Form13G,
    #[serde(rename = "13D")]
    Form13D,
    #[serde(rename = "13F")]
    Form13F,
    #[serde(rename = "other")]
    Other,
}

impl FormCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormCategory::Form3 => "3",
            FormCategory::Form4 => "4",
            FormCategory::Form8K => "8-K",
            FormCategory::Form10K => "10-K",
            FormCategory::Form10Q => "10-Q",
            FormCategory::FormDef14A => "DEF14A",
            FormCategory::Form13G => "13G",
            FormCategory::Form13D => "13D",
            FormCategory::Form13F => "13F",
            FormCategory::Other => "other",
        }
    }
}

impl fmt::Display for FormCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps an exact type string to its family. Rules are checked in order and
/// the first hit wins, so e.g. `10-K405` is a 10-K before any substring rule
/// gets a look.
pub fn classify(exact: &str) -> FormCategory {
    let prefix = exact.get(..4);

    if matches!(exact, "3" | "3/A") {
        FormCategory::Form3
    } else if matches!(exact, "4" | "4/A") {
        FormCategory::Form4
    } else if matches!(exact, "8-K" | "8-K/A") {
        FormCategory::Form8K
    } else if matches!(prefix, Some("10-Q") | Some("10QS")) {
        FormCategory::Form10Q
    } else if matches!(prefix, Some("10-K") | Some("10KS")) {
        FormCategory::Form10K
    } else if exact.ends_with("14A") {
        FormCategory::FormDef14A
    } else if exact.contains("SC 13G") {
        FormCategory::Form13G
    } else if exact.contains("SC 13D") {
        FormCategory::Form13D
    } else if exact.contains("13F-") {
        FormCategory::Form13F
    } else {
        FormCategory::Other
    }
}

/// Exact type string kept alongside its coarse family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilingType {
    pub exact: String,
    pub category: FormCategory,
}

impl FilingType {
    pub fn new(exact: impl Into<String>) -> Self {
        let exact = exact.into();
        let category = classify(&exact);
        Self { exact, category }
    }
}

impl fmt::Display for FilingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.exact, self.category)
    }
}
