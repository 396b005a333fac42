use super::{FetchError, SuggestionResult, SuggestionSource, get_body, payload_error, truncate};
use crate::query::encode_component;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct HashtagItem {
    name: String,
    #[serde(default)]
    count: Option<u64>,
}

impl From<HashtagItem> for SuggestionResult {
    fn from(item: HashtagItem) -> Self {
        SuggestionResult {
            name: item.name,
            count: item.count,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    data: SearchData,
}

#[derive(Debug, Default, Deserialize)]
struct SearchData {
    #[serde(default)]
    hashtags: Option<HashtagPage>,
}

#[derive(Debug, Default, Deserialize)]
struct HashtagPage {
    #[serde(default)]
    contents: Vec<HashtagItem>,
}

#[derive(Debug, Deserialize)]
struct RelatedEnvelope {
    #[serde(default)]
    data: Vec<HashtagItem>,
}

/// Hashtags whose names start with the query, with article counts.
pub struct NoteHashtags {
    client: reqwest::Client,
    endpoint: String,
}

impl NoteHashtags {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}/api/v3/searches", base_url.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl SuggestionSource for NoteHashtags {
    async fn fetch(
        &self,
        query: &str,
        limit: Option<u32>,
    ) -> Result<Vec<SuggestionResult>, FetchError> {
        if query.is_empty() {
            return Ok(Vec::new());
        }
        debug!(endpoint = %self.endpoint, query, ?limit, "Requesting Note hashtag suggestions");
        let mut request = self
            .client
            .get(&self.endpoint)
            .query(&[("context", "hashtag"), ("q", query), ("start", "0")]);
        if let Some(limit) = limit {
            request = request.query(&[("size", limit)]);
        }
        let body = get_body(request, &self.endpoint).await?;
        let envelope: SearchEnvelope = serde_json::from_slice(&body)
            .map_err(|err| payload_error(&self.endpoint, err.to_string()))?;
        let items = envelope
            .data
            .hashtags
            .map(|page| page.contents)
            .unwrap_or_default();
        Ok(truncate(items.into_iter().map(Into::into).collect(), limit))
    }
}

/// Hashtags topically related to the query. Takes no size parameter.
pub struct NoteRelatedHashtags {
    client: reqwest::Client,
    base_url: String,
}

impl NoteRelatedHashtags {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, query: &str) -> String {
        format!(
            "{}/api/v2/hashtags/{}/related_hashtags",
            self.base_url,
            encode_component(query)
        )
    }
}

#[async_trait]
impl SuggestionSource for NoteRelatedHashtags {
    async fn fetch(
        &self,
        query: &str,
        limit: Option<u32>,
    ) -> Result<Vec<SuggestionResult>, FetchError> {
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let endpoint = self.endpoint(query);
        debug!(%endpoint, query, "Requesting Note related hashtags");
        let body = get_body(self.client.get(&endpoint), &endpoint).await?;
        let envelope: RelatedEnvelope = serde_json::from_slice(&body)
            .map_err(|err| payload_error(&endpoint, err.to_string()))?;
        Ok(truncate(
            envelope.data.into_iter().map(Into::into).collect(),
            limit,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::spawn_backend;
    use axum::{
        Json, Router,
        extract::{Path, Query},
        routing::get,
    };
    use serde_json::json;
    use std::collections::HashMap;

    #[tokio::test]
    async fn hashtag_suggest_reads_contents() {
        let router = Router::new().route(
            "/api/v3/searches",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                assert_eq!(params.get("context").map(String::as_str), Some("hashtag"));
                assert_eq!(params.get("size").map(String::as_str), Some("10"));
                Json(json!({
                    "data": {
                        "hashtags": {
                            "contents": [
                                { "name": format!("#{}", params["q"]), "count": 42 },
                                { "name": "#catlover" }
                            ]
                        }
                    }
                }))
            }),
        );
        let base = spawn_backend(router).await;
        let source = NoteHashtags::new(reqwest::Client::new(), &base);
        let results = source.fetch("cat", Some(10)).await.unwrap();
        assert_eq!(
            results,
            vec![
                SuggestionResult::counted("#cat", 42),
                SuggestionResult::keyword("#catlover"),
            ]
        );
    }

    #[tokio::test]
    async fn hashtag_suggest_tolerates_missing_section() {
        let router = Router::new().route(
            "/api/v3/searches",
            get(|| async { Json(json!({ "data": {} })) }),
        );
        let base = spawn_backend(router).await;
        let source = NoteHashtags::new(reqwest::Client::new(), &base);
        assert!(source.fetch("cat", Some(10)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn hashtag_suggest_rejects_malformed_body() {
        let router = Router::new().route("/api/v3/searches", get(|| async { "not json" }));
        let base = spawn_backend(router).await;
        let source = NoteHashtags::new(reqwest::Client::new(), &base);
        let err = source.fetch("cat", Some(10)).await.unwrap_err();
        assert!(matches!(err, FetchError::Payload { .. }));
    }

    #[tokio::test]
    async fn related_hashtags_use_path_and_ignore_size() {
        let router = Router::new().route(
            "/api/v2/hashtags/:tag/related_hashtags",
            get(
                |Path(tag): Path<String>, Query(params): Query<HashMap<String, String>>| async move {
                    assert!(params.get("size").is_none());
                    Json(json!({
                        "data": [
                            { "name": format!("{tag}好き"), "count": 7 },
                            { "name": "ペット", "count": 3 }
                        ]
                    }))
                },
            ),
        );
        let base = spawn_backend(router).await;
        let source = NoteRelatedHashtags::new(reqwest::Client::new(), &base);
        let results = source.fetch("猫", None).await.unwrap();
        assert_eq!(
            results,
            vec![
                SuggestionResult::counted("猫好き", 7),
                SuggestionResult::counted("ペット", 3),
            ]
        );
    }

    #[test]
    fn related_endpoint_encodes_query() {
        let source = NoteRelatedHashtags::new(reqwest::Client::new(), "https://note.com/");
        assert_eq!(
            source.endpoint("a/b c"),
            "https://note.com/api/v2/hashtags/a%2Fb%20c/related_hashtags"
        );
    }
}
