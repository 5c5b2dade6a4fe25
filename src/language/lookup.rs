//! Single and full-table queries against a merged table

use indexmap::IndexMap;
use serde::Serialize;

use super::merge::{DELIMITER, MergedTable};

/// Language reported for a phone number that is not in the table
pub const NOT_FOUND: &str = "not-found";

/// Rendering requested by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LookupFormat {
    #[default]
    Json,
    Text,
}

impl LookupFormat {
    /// `json` when absent; anything other than `json` renders text
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            None | Some("json") => Self::Json,
            Some(_) => Self::Text,
        }
    }
}

/// Body of a single-phone json answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LanguageAnswer {
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupResponse {
    /// Full phone-to-language map
    Table(IndexMap<String, String>),
    /// One phone number's language, or the not-found sentinel
    Language(LanguageAnswer),
    /// Raw merged text or `header\nmatched line`
    Text(String),
}

pub struct LookupService;

impl LookupService {
    pub fn query(table: &MergedTable, phone: Option<&str>, format: LookupFormat) -> LookupResponse {
        match (phone, format) {
            (None, LookupFormat::Json) => LookupResponse::Table(table.entries.clone()),
            (None, LookupFormat::Text) => LookupResponse::Text(table.raw_text.clone()),
            (Some(phone), LookupFormat::Json) => LookupResponse::Language(LanguageAnswer {
                language: table.language_for(phone).unwrap_or(NOT_FOUND).to_string(),
            }),
            (Some(phone), LookupFormat::Text) => {
                LookupResponse::Text(Self::matching_line(table, phone).unwrap_or_default())
            }
        }
    }

    /// Header plus the first body line whose leading field is `phone`
    fn matching_line(table: &MergedTable, phone: &str) -> Option<String> {
        let mut lines = table.raw_text.lines();
        let header = lines.next()?;
        lines
            .find(|line| line.split(DELIMITER).next() == Some(phone))
            .map(|line| format!("{header}\n{line}"))
    }
}
