use crate::fetch::SuggestionResult;
use crate::query::{SearchQuery, SuggestQuery};
use serde::Serialize;

pub const MISSING_COUNT: &str = "N/A";

/// One rendered result: its name, count label and pivot link into a full
/// search that keeps the current service and size.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct SuggestionRow {
    pub name: String,
    pub count_label: String,
    pub pivot_href: String,
}

impl SuggestionRow {
    pub fn new(result: &SuggestionResult, state: &SuggestQuery) -> Self {
        Self {
            name: result.name.clone(),
            count_label: result
                .count
                .map(|count| count.to_string())
                .unwrap_or_else(|| MISSING_COUNT.to_string()),
            pivot_href: pivot_query(result, state).href(),
        }
    }
}

pub fn pivot_query(result: &SuggestionResult, state: &SuggestQuery) -> SearchQuery {
    SearchQuery {
        service: state.service,
        query: result.name.clone(),
        size: state.size,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Service;

    #[test]
    fn pivot_links_decode_back() {
        let state = SuggestQuery {
            service: Service::Google,
            query: "rust".into(),
            size: 15,
            related: true,
        };
        let result = SuggestionResult::keyword("rust & go");
        let row = SuggestionRow::new(&result, &state);
        assert_eq!(row.count_label, "N/A");
        let encoded = row.pivot_href.strip_prefix("/search?").unwrap();
        assert_eq!(SearchQuery::decode(encoded), pivot_query(&result, &state));
        assert_eq!(SearchQuery::decode(encoded).query, "rust & go");
    }

    #[test]
    fn counted_row() {
        let row = SuggestionRow::new(
            &SuggestionResult::counted("cat", 42),
            &SuggestQuery::default(),
        );
        assert_eq!(row.count_label, "42");
        assert_eq!(row.pivot_href, "/search?service=Note&query=cat&size=25");
    }
}
