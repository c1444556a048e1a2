//! # Search
//!
//! Line-level search over the scripture database.
//!
//! ```rust,no_run
//! use gurbani::prelude::*;
//! # async fn example(client: &GurbaniClient) -> Result<(), GurbaniError> {
//! let hits = client.search("ਸਤਿ ਨਾਮੁ")
//!     .search_type(SearchType::FullWordGurmukhi)
//!     .source("G")
//!     .limit(20)
//!     .execute().await?;
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    Result,
    client::GurbaniClient,
    config::{DEFAULT_SEARCH_RESULTS, MAX_QUERY_LEN, MAX_SEARCH_RESULTS},
    error::GurbaniError,
    http_client::HttpRequest,
    shabad::{SourceInfo, Writer, string_or_number},
};

/// How the query is interpreted
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "kebab-case")]
pub enum SearchType {
    /// First letter of each word, from the start of the line
    #[default]
    FirstLettersStart,
    /// First letter of each word, anywhere in the line
    FirstLettersAnywhere,
    /// Whole Gurmukhi words
    FullWordGurmukhi,
    /// Words of the English translation
    FullWordTranslation,
    /// Romanized (transliterated) words
    Romanized,
}

impl SearchType {
    /// Numeric code used by the api
    pub fn code(self) -> u8 {
        match self {
            Self::FirstLettersStart => 0,
            Self::FirstLettersAnywhere => 1,
            Self::FullWordGurmukhi => 2,
            Self::FullWordTranslation => 3,
            Self::Romanized => 4,
        }
    }
}

/// One matching line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub shabad_id: u32,
    #[serde(deserialize_with = "string_or_number")]
    pub verse_id: String,
    #[serde(default)]
    pub page_no: u32,
    #[serde(rename = "verse")]
    pub gurmukhi: String,
    #[serde(default)]
    pub translation: BTreeMap<String, BTreeMap<String, String>>,
    pub source: SourceInfo,
    #[serde(default)]
    pub writer: Option<Writer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultsInfo {
    #[allow(dead_code)]
    total_results: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[allow(dead_code)]
    results_info: ResultsInfo,
    verses: Vec<SearchHit>,
}

/// Request builder for search
#[derive(Debug)]
pub struct SearchRequest<'a> {
    client: &'a GurbaniClient,
    query: String,
    search_type: SearchType,
    source: Option<String>,
    writer: Option<u32>,
    limit: u32,
}

impl SearchRequest<'_> {
    pub fn search_type(mut self, search_type: SearchType) -> Self {
        self.search_type = search_type;
        self
    }

    /// Restricts results to one source collection, for example "G"
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Restricts results to one writer id
    pub fn writer(mut self, writer: u32) -> Self {
        self.writer = Some(writer);
        self
    }

    /// Maximum number of results (1..=500)
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    fn validate(&self) -> Result<()> {
        let query = self.query.trim();
        if query.is_empty() {
            return Err(GurbaniError::Validation {
                message: "search query is empty".to_string(),
            });
        }
        if query.chars().count() > MAX_QUERY_LEN {
            return Err(GurbaniError::Validation {
                message: format!("search query longer than {MAX_QUERY_LEN} characters"),
            });
        }
        if self.limit == 0 || self.limit > MAX_SEARCH_RESULTS {
            return Err(GurbaniError::Validation {
                message: format!("search limit must be in 1..={MAX_SEARCH_RESULTS}"),
            });
        }
        Ok(())
    }

    pub(crate) fn to_request(&self) -> HttpRequest {
        let mut req = HttpRequest::get(["search".to_string(), self.query.trim().to_string()])
            .query("searchtype", self.search_type.code())
            .query("results", self.limit);
        if let Some(source) = &self.source {
            req = req.query("source", source);
        }
        if let Some(writer) = self.writer {
            req = req.query("writer", writer);
        }
        req
    }

    /// Executes the search
    pub async fn execute(self) -> Result<Vec<SearchHit>> {
        self.validate()?;
        let req = self.to_request();
        let response: SearchResponse = self.client.http().get_json(req, "Search").await?;
        Ok(response.verses)
    }
}

impl GurbaniClient {
    /// Returns a search request builder
    pub fn search(&self, query: impl Into<String>) -> SearchRequest<'_> {
        SearchRequest {
            client: self,
            query: query.into(),
            search_type: SearchType::default(),
            source: None,
            writer: None,
            limit: DEFAULT_SEARCH_RESULTS,
        }
    }
}
