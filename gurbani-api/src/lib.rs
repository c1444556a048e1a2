/*
 * Gurbani rust api client
 *
 * SPDX-FileCopyrightText: 2025-2026 Steve Schoettler
 * SPDX-License-Identifier: Apache-2.0
 */
//! # Gurbani Rust API Client
//!
//! A small async client for the Gurbani content api.
//!
//! ## Features
//!
//! - fetch a shabad (hymn) by numeric id, with translations, transliterations, and visraam
//! - daily hukamnama for any date
//! - search by first letters, words, or translation
//! - word-level visraam (pause) markers and larivaar rendering helpers
//! - http pipeline with request timeout, logging, and metrics
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gurbani::prelude::*;
//! # async fn example() -> Result<(), GurbaniError> {
//!
//! let client = GurbaniClient::new()?;
//!
//! // Fetch a shabad and print it with visraam markers
//! let shabad = client.shabad(1).get().await?;
//! for line in &shabad.lines {
//!     println!("{}", line.display_text(false));
//! }
//!
//! // Today's hukamnama
//! let hukam = client.hukamnama_today().get().await?;
//! println!("{} shabads", hukam.shabads.len());
//!
//! // Search by first letters
//! let hits = client.search("hhmh")
//!     .search_type(SearchType::FirstLettersStart)
//!     .limit(10)
//!     .execute().await?;
//! for hit in &hits {
//!     println!("{} {}", hit.shabad_id, hit.gurmukhi);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## API Structure
//!
//! Methods on `GurbaniClient` return request builders that are configured with chained
//! method calls and executed with a terminal `get()` or `execute()`.
//!
//! The [`ShabadSource`](source::ShabadSource) trait abstracts "fetch a shabad by id"
//! so that code which only needs canonical content (backup restore, imports)
//! can run against an in-memory source in tests.
//!
#![allow(clippy::missing_errors_doc)] // pedantic
#![allow(clippy::missing_const_for_fn)] //  nursery function
#![allow(clippy::must_use_candidate)] // pedantic
#![warn(clippy::default_trait_access)]
#![warn(clippy::doc_markdown)]
#![warn(clippy::explicit_iter_loop)]
#![warn(clippy::future_not_send)]
#![warn(clippy::implicit_clone)]
#![warn(clippy::literal_string_with_formatting_args)]
#![warn(clippy::match_same_arms)]
#![warn(clippy::min_ident_chars)]
#![warn(clippy::needless_raw_strings)]
#![warn(clippy::option_if_let_else)]
#![warn(clippy::redundant_clone)]
#![warn(clippy::ref_option)]
#![warn(clippy::redundant_closure)]
#![warn(clippy::uninlined_format_args)]
#![warn(clippy::unnecessary_wraps)]
#![warn(clippy::unused_async)]

pub mod client;
pub mod error;
pub mod hukamnama;
mod http_client;
pub mod search;
pub mod shabad;
pub mod source;

pub mod test_util;

/// Result type alias using `GurbaniError` as the default error.
pub type Result<T, E = crate::error::GurbaniError> = std::result::Result<T, E>;

/// Prelude module - import the commonly used types with `use gurbani::prelude::*;`
pub mod prelude {
    pub use super::{GURBANI_API_URL, GURBANI_URL_ENV};
    // Error types
    pub use crate::error::*;
    pub use crate::{
        client::{ClientConfig, GurbaniClient},
        // Hukamnama
        hukamnama::Hukamnama,
        // HTTP metrics
        http_client::HttpMetricsSnapshot,
        // Search
        search::{SearchHit, SearchType},
        // Shabads and lines
        shabad::{
            Line, Navigation, Raag, Shabad, ShabadInfo, SourceInfo, Visraam, VisraamKind,
            VisraamSource, Word, Writer,
        },
        source::ShabadSource,
    };
}

// ============================================================================
// CONSTANTS
// ============================================================================

/// Default api endpoint
pub const GURBANI_API_URL: &str = "https://api.gurbaninow.com/v2";

/// Environment variable for default endpoint URL
pub const GURBANI_URL_ENV: &str = "GURBANI_URL";

pub(crate) mod config {
    /// Default per-request timeout (seconds). An unresponsive lookup should not
    /// stall a whole import.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Default number of search results
    pub const DEFAULT_SEARCH_RESULTS: u32 = 50;

    /// Largest number of search results the api returns
    pub const MAX_SEARCH_RESULTS: u32 = 500;

    /// Longest accepted search query (characters)
    pub const MAX_QUERY_LEN: usize = 200;
}
