use super::{FetchError, SuggestionResult, SuggestionSource, get_body, payload_error, truncate};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

/// Google-suggest-compatible keyword source.
///
/// Response shape: `["query", ["keyword", ...], ...]`.
pub struct GoogleSuggest {
    client: reqwest::Client,
    endpoint: String,
}

impl GoogleSuggest {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}/complete/search", base_url.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl SuggestionSource for GoogleSuggest {
    async fn fetch(
        &self,
        query: &str,
        limit: Option<u32>,
    ) -> Result<Vec<SuggestionResult>, FetchError> {
        if query.is_empty() {
            return Ok(Vec::new());
        }
        debug!(endpoint = %self.endpoint, query, ?limit, "Requesting Google suggestions");
        let request = self.client.get(&self.endpoint).query(&[
            ("client", "firefox"),
            ("ie", "utf-8"),
            ("oe", "utf-8"),
            ("q", query),
        ]);
        let body = get_body(request, &self.endpoint).await?;
        let keywords = parse_keywords(&body, &self.endpoint)?;
        Ok(truncate(
            keywords.into_iter().map(SuggestionResult::keyword).collect(),
            limit,
        ))
    }
}

fn parse_keywords(body: &[u8], url: &str) -> Result<Vec<String>, FetchError> {
    let value: Value = serde_json::from_slice(body).map_err(|err| payload_error(url, err.to_string()))?;
    let suggestions = value
        .as_array()
        .and_then(|array| array.get(1))
        .and_then(Value::as_array)
        .ok_or_else(|| payload_error(url, "expected [query, [suggestions...]]"))?;
    Ok(suggestions
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::spawn_backend;
    use axum::{Json, Router, extract::Query, http::StatusCode, routing::get};
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn parses_suggest_array() {
        let body = br#"["cat",["cat","catalog","cat food"],[],{"google:suggesttype":[]}]"#;
        let keywords = parse_keywords(body, "test").unwrap();
        assert_eq!(keywords, vec!["cat", "catalog", "cat food"]);
    }

    #[test]
    fn rejects_unexpected_shapes() {
        assert!(matches!(
            parse_keywords(br#"{"suggestions":[]}"#, "test"),
            Err(FetchError::Payload { .. })
        ));
        assert!(matches!(
            parse_keywords(b"<html>", "test"),
            Err(FetchError::Payload { .. })
        ));
    }

    #[tokio::test]
    async fn fetches_and_caps_at_limit() {
        let router = Router::new().route(
            "/complete/search",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                let q = params.get("q").cloned().unwrap_or_default();
                assert_eq!(params.get("client").map(String::as_str), Some("firefox"));
                Json(json!([q, [format!("{q} 1"), format!("{q} 2"), format!("{q} 3")]]))
            }),
        );
        let base = spawn_backend(router).await;
        let source = GoogleSuggest::new(reqwest::Client::new(), &base);
        let results = source.fetch("red panda", Some(2)).await.unwrap();
        assert_eq!(
            results,
            vec![
                SuggestionResult::keyword("red panda 1"),
                SuggestionResult::keyword("red panda 2"),
            ]
        );
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let router = Router::new().route(
            "/complete/search",
            get(|| async { StatusCode::SERVICE_UNAVAILABLE }),
        );
        let base = spawn_backend(router).await;
        let source = GoogleSuggest::new(reqwest::Client::new(), &base);
        let err = source.fetch("cats", Some(10)).await.unwrap_err();
        assert!(matches!(
            err,
            FetchError::Status { status, .. } if status == StatusCode::SERVICE_UNAVAILABLE
        ));
    }

    #[tokio::test]
    async fn empty_query_skips_the_request() {
        let source = GoogleSuggest::new(reqwest::Client::new(), "http://127.0.0.1:9");
        assert!(source.fetch("", Some(10)).await.unwrap().is_empty());
    }
}
