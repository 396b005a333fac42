//! Keyword and hashtag suggestion explorer.
//!
//! A [`SuggestQuery`] decoded from the page URL selects one of three
//! suggestion sources (Google keywords, Note hashtags, Note related hashtags);
//! [`SuggestController`] runs the fetch and owns the result list; every result
//! row carries a pivot link into a full search.

pub mod config;
pub mod controller;
pub mod fetch;
pub mod query;
pub mod rows;
#[cfg(feature = "web")]
pub mod web;

pub use config::{ConfigError, SuggestConfig};
pub use controller::{FetchOutcome, FetchRequest, FetchTicket, SuggestController};
pub use fetch::{FetchError, FetchMode, FetcherTable, SuggestionResult, SuggestionSource};
pub use query::{
    QueryHistory, SearchQuery, Service, SuggestQuery, SuggestQueryPatch, normalize_search_input,
};
pub use rows::SuggestionRow;
