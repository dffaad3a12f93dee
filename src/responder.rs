//! Query resolution.
//!
//! The workflows only see the [`Responder`] trait; [`KeywordResponder`] is the shipped
//! implementation, a first-match scan over an ordered keyword table.

use std::path::Path;

use anyhow::{bail, Context};
use serde_json::{Map, Value};

pub const MATCHED_CONFIDENCE: f64 = 0.9;
pub const FALLBACK_CONFIDENCE: f64 = 0.3;
pub const FALLBACK_RESPONSE: &str = "I don't have information about that specific topic yet. \
Please contact your department for more details.";

const BUILTIN_TABLE: &str = include_str!("../data/responses.json");

#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub response_text: String,
    pub confidence: f64,
}

/// Produces an answer for a query. Must never fail and must not touch shared state.
pub trait Responder: Send + Sync {
    fn respond(&self, query_text: &str) -> Answer;
}

#[derive(Debug, Clone)]
pub struct KeywordResponder {
    // keywords are stored lowercased
    entries: Vec<(String, String)>,
    matched_confidence: f64,
    fallback_text: String,
    fallback_confidence: f64,
}

impl KeywordResponder {
    pub fn new(entries: Vec<(String, String)>) -> anyhow::Result<Self> {
        let mut normalized = Vec::with_capacity(entries.len());
        for (keyword, response) in entries {
            let keyword = keyword.trim().to_lowercase();
            if keyword.is_empty() {
                bail!("keyword table contains an empty keyword");
            }
            normalized.push((keyword, response));
        }

        Ok(Self {
            entries: normalized,
            matched_confidence: MATCHED_CONFIDENCE,
            fallback_text: FALLBACK_RESPONSE.to_string(),
            fallback_confidence: FALLBACK_CONFIDENCE,
        })
    }

    pub fn builtin() -> anyhow::Result<Self> {
        Self::from_json_str(BUILTIN_TABLE).context("built-in keyword table is invalid")
    }

    /// Loads a table from `.csv` (`keyword,response` rows) or JSON (object of
    /// keyword to response). Entry order is kept either way.
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let is_csv = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));

        if is_csv {
            let file = std::fs::File::open(path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            return Self::from_csv_reader(file);
        }

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json_str(&raw).with_context(|| format!("invalid table in {}", path.display()))
    }

    pub fn from_json_str(raw: &str) -> anyhow::Result<Self> {
        let table: Map<String, Value> = serde_json::from_str(raw)?;
        let mut entries = Vec::with_capacity(table.len());

        for (keyword, response) in table {
            let Value::String(response) = response else {
                bail!("response for '{keyword}' must be a string");
            };
            entries.push((keyword, response));
        }

        Self::new(entries)
    }

    pub fn from_csv_reader<R: std::io::Read>(reader: R) -> anyhow::Result<Self> {
        #[derive(serde::Deserialize)]
        struct CsvRow {
            keyword: String,
            response: String,
        }

        let mut reader = csv::Reader::from_reader(reader);
        let mut entries = Vec::new();
        for result in reader.deserialize::<CsvRow>() {
            let row = result?;
            entries.push((row.keyword, row.response));
        }

        Self::new(entries)
    }

    pub fn with_confidences(mut self, matched: f64, fallback: f64) -> Self {
        self.matched_confidence = matched.clamp(0.0, 1.0);
        self.fallback_confidence = fallback.clamp(0.0, 1.0);
        self
    }

    pub fn keyword_count(&self) -> usize {
        self.entries.len()
    }
}

impl Responder for KeywordResponder {
    fn respond(&self, query_text: &str) -> Answer {
        let haystack = query_text.to_lowercase();

        self.entries
            .iter()
            .find(|(keyword, _)| haystack.contains(keyword.as_str()))
            .map(|(_, response)| Answer {
                response_text: response.clone(),
                confidence: self.matched_confidence,
            })
            .unwrap_or_else(|| Answer {
                response_text: self.fallback_text.clone(),
                confidence: self.fallback_confidence,
            })
    }
}
