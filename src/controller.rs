//! Reactive link between the query state and the result list.
//!
//! Every state change funnels into [`SuggestController::begin_refresh`], which
//! clears the results and hands out a [`FetchTicket`] stamped with a fresh
//! generation. [`SuggestController::complete`] only applies outcomes whose
//! generation is still current, so a response to a superseded query can never
//! overwrite a newer one.

use crate::fetch::{FetchMode, FetcherTable, SuggestionResult};
use crate::query::{
    MAX_SIZE, QueryHistory, Service, SuggestQuery, SuggestQueryPatch, normalize_search_input,
};
use crate::rows::SuggestionRow;
use tracing::{debug, warn};

/// A single outbound request derived from one query state.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct FetchRequest {
    pub mode: FetchMode,
    pub query: String,
    pub limit: Option<u32>,
}

impl FetchRequest {
    /// `None` for an empty query: nothing to fetch.
    pub fn for_state(state: &SuggestQuery) -> Option<Self> {
        if state.query.is_empty() {
            return None;
        }
        let mode = FetchMode::for_query(state);
        Some(Self {
            mode,
            query: state.query.clone(),
            limit: mode.uses_limit().then_some(state.size),
        })
    }
}

#[derive(Debug, Clone)]
pub struct FetchTicket {
    generation: u64,
    request: FetchRequest,
}

impl FetchTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn request(&self) -> &FetchRequest {
        &self.request
    }

    /// Runs the request. Failures are logged and collapse into an empty result.
    pub async fn run(self, fetchers: &FetcherTable) -> FetchOutcome {
        let FetchRequest { mode, query, limit } = self.request;
        let results = match fetchers.lookup(mode).fetch(&query, limit).await {
            Ok(results) => results,
            Err(err) => {
                warn!(%mode, query = %query, error = %err, "Error fetching keywords");
                Vec::new()
            }
        };
        FetchOutcome {
            generation: self.generation,
            results,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchOutcome {
    generation: u64,
    results: Vec<SuggestionResult>,
}

pub struct SuggestController {
    fetchers: FetcherTable,
    history: QueryHistory<SuggestQuery>,
    results: Vec<SuggestionResult>,
    generation: u64,
}

impl SuggestController {
    /// Creates a controller without fetching; call [`Self::refresh`] to load
    /// results for the initial state.
    pub fn new(fetchers: FetcherTable, initial: SuggestQuery) -> Self {
        Self {
            fetchers,
            history: QueryHistory::new(initial),
            results: Vec::new(),
            generation: 0,
        }
    }

    pub fn from_url(fetchers: FetcherTable, query_string: &str) -> Self {
        Self::new(fetchers, SuggestQuery::decode(query_string))
    }

    pub fn state(&self) -> &SuggestQuery {
        self.history.current()
    }

    pub fn results(&self) -> &[SuggestionResult] {
        &self.results
    }

    pub fn rows(&self) -> Vec<SuggestionRow> {
        self.results
            .iter()
            .map(|result| SuggestionRow::new(result, self.state()))
            .collect()
    }

    pub fn history(&self) -> &QueryHistory<SuggestQuery> {
        &self.history
    }

    /// Clears results and, unless the query is empty, returns the ticket for
    /// the fetch the current state calls for.
    pub fn begin_refresh(&mut self) -> Option<FetchTicket> {
        self.generation += 1;
        self.results.clear();
        let request = FetchRequest::for_state(self.state())?;
        debug!(
            generation = self.generation,
            mode = %request.mode,
            query = %request.query,
            limit = ?request.limit,
            "Dispatching suggestion fetch"
        );
        Some(FetchTicket {
            generation: self.generation,
            request,
        })
    }

    /// Applies `outcome` if it belongs to the latest refresh. Returns whether
    /// it was applied.
    pub fn complete(&mut self, outcome: FetchOutcome) -> bool {
        if outcome.generation != self.generation {
            debug!(
                stale = outcome.generation,
                current = self.generation,
                "Discarding superseded suggestion response"
            );
            return false;
        }
        let mut results = outcome.results;
        results.truncate(MAX_SIZE as usize);
        self.results = results;
        true
    }

    pub async fn refresh(&mut self) {
        if let Some(ticket) = self.begin_refresh() {
            let outcome = ticket.run(&self.fetchers).await;
            self.complete(outcome);
        }
    }

    /// Pushes the patched state as a new history entry and refreshes. A patch
    /// that changes nothing leaves history and results alone.
    pub async fn apply(&mut self, patch: SuggestQueryPatch) {
        let next = patch.apply(self.state());
        if self.history.push(next) {
            self.refresh().await;
        }
    }

    pub async fn set_query(&mut self, raw: &str) {
        let query = normalize_search_input(self.state().service, raw);
        self.apply(SuggestQueryPatch::query(query)).await;
    }

    pub async fn set_service(&mut self, service: Service) {
        self.apply(SuggestQueryPatch::service(service)).await;
    }

    /// Sizes outside `1..=MAX_SIZE` are ignored.
    pub async fn set_size(&mut self, size: u32) {
        self.apply(SuggestQueryPatch::size(size)).await;
    }

    /// Only Note has a related-hashtag mode; on Google this does nothing.
    pub async fn set_related(&mut self, related: bool) {
        if self.state().service != Service::Note {
            debug!(related, "Ignoring related toggle outside Note");
            return;
        }
        self.apply(SuggestQueryPatch::related(related)).await;
    }

    pub async fn back(&mut self) -> bool {
        if self.history.back().is_none() {
            return false;
        }
        self.refresh().await;
        true
    }

    pub async fn forward(&mut self) -> bool {
        if self.history.forward().is_none() {
            return false;
        }
        self.refresh().await;
        true
    }
}
