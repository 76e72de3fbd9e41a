//! Elasticsearch backend
//!
//! Talks to the document, delete and search endpoints over plain HTTP. An
//! index built without an endpoint is disabled and answers every call with
//! an empty success.

use crate::config::SearchConfig;
use crate::search::{IndexDocument, SearchError, SearchHits, SearchIndex};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;

/// Elasticsearch client for one cluster
#[derive(Debug, Clone)]
pub struct ElasticsearchIndex {
    client: Client,
    endpoint: Option<Url>,
}

impl ElasticsearchIndex {
    /// Creates a client for `endpoint`, or a disabled index when it is `None`
    pub fn new(endpoint: Option<&str>) -> Result<Self, SearchError> {
        let endpoint = endpoint
            .map(|raw| {
                crate::config::validate_endpoint(raw)
                    .map_err(|e| SearchError::InvalidEndpoint(e.to_string()))
            })
            .transpose()?;

        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .connect_timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self { client, endpoint })
    }

    /// An index that never talks to anything
    pub fn disabled() -> Self {
        Self {
            client: Client::new(),
            endpoint: None,
        }
    }

    pub fn from_config(config: &SearchConfig) -> Result<Self, SearchError> {
        Self::new(config.elasticsearch_url.as_deref())
    }

    fn url(&self, base: &Url, path: &str) -> String {
        format!("{}/{}", base.as_str().trim_end_matches('/'), path)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, SearchError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(SearchError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

impl SearchIndex for ElasticsearchIndex {
    fn is_enabled(&self) -> bool {
        self.endpoint.is_some()
    }

    async fn upsert(&self, index: &str, document: &IndexDocument) -> Result<(), SearchError> {
        let Some(base) = &self.endpoint else {
            return Ok(());
        };

        let url = self.url(base, &format!("{}/_doc/{}", index, document.id));
        let response = self
            .client
            .put(url)
            .json(&Value::Object(document.fields.clone()))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn delete(&self, index: &str, id: i64) -> Result<(), SearchError> {
        let Some(base) = &self.endpoint else {
            return Ok(());
        };

        let url = self.url(base, &format!("{}/_doc/{}", index, id));
        let response = self.client.delete(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!(%index, id, "Document already absent from index");
            return Ok(());
        }
        Self::check(response).await?;
        Ok(())
    }

    async fn search(
        &self,
        index: &str,
        query: &str,
        offset: usize,
        limit: usize,
    ) -> Result<SearchHits, SearchError> {
        let Some(base) = &self.endpoint else {
            return Ok(SearchHits::default());
        };

        let body = json!({
            "query": { "multi_match": { "query": query, "fields": ["*"] } },
            "from": offset,
            "size": limit,
        });
        let url = self.url(base, &format!("{}/_search", index));
        let response = self.client.post(url).json(&body).send().await?;

        // The index is created lazily by the first upsert
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(SearchHits::default());
        }

        let raw: Value = Self::check(response).await?.json().await?;
        parse_hits(raw)
    }
}

/// Extracts ids and the total from a `_search` response body
fn parse_hits(raw: Value) -> Result<SearchHits, SearchError> {
    let hits = raw
        .pointer("/hits/hits")
        .and_then(Value::as_array)
        .ok_or_else(|| SearchError::MalformedResponse("missing hits.hits".to_string()))?;

    let mut ids = Vec::with_capacity(hits.len());
    for hit in hits {
        match hit.get("_id").and_then(Value::as_str).map(str::parse::<i64>) {
            Some(Ok(id)) => ids.push(id),
            _ => tracing::debug!(?hit, "Skipping hit without a numeric id"),
        }
    }

    // Elasticsearch 7+ reports {"value": n, "relation": ..}; older versions a bare number
    let total = match raw.pointer("/hits/total") {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::Object(o)) => o.get("value").and_then(Value::as_u64),
        _ => None,
    }
    .unwrap_or(ids.len() as u64);

    Ok(SearchHits { ids, total, raw })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hits_modern_total() {
        let raw = json!({
            "hits": {
                "total": { "value": 12, "relation": "eq" },
                "hits": [ { "_id": "3" }, { "_id": "1" }, { "_id": "2" } ]
            }
        });
        let hits = parse_hits(raw).unwrap();
        assert_eq!(hits.ids, vec![3, 1, 2]);
        assert_eq!(hits.total, 12);
    }

    #[test]
    fn test_parse_hits_legacy_total() {
        let raw = json!({ "hits": { "total": 1, "hits": [ { "_id": "7" } ] } });
        let hits = parse_hits(raw).unwrap();
        assert_eq!(hits.ids, vec![7]);
        assert_eq!(hits.total, 1);
    }

    #[test]
    fn test_parse_hits_skips_foreign_ids() {
        let raw = json!({ "hits": { "hits": [ { "_id": "abc" }, { "_id": "5" } ] } });
        let hits = parse_hits(raw).unwrap();
        assert_eq!(hits.ids, vec![5]);
        assert_eq!(hits.total, 1);
    }

    #[test]
    fn test_parse_hits_malformed() {
        assert!(matches!(
            parse_hits(json!({ "error": "boom" })),
            Err(SearchError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_invalid_endpoint() {
        assert!(matches!(
            ElasticsearchIndex::new(Some("not a url")),
            Err(SearchError::InvalidEndpoint(_))
        ));
    }

    #[tokio::test]
    async fn test_disabled_index_is_noop() {
        let index = ElasticsearchIndex::disabled();
        assert!(!index.is_enabled());

        let document = IndexDocument {
            id: 1,
            fields: Default::default(),
        };
        assert!(index.upsert("player", &document).await.is_ok());
        assert!(index.delete("player", 1).await.is_ok());

        let hits = index.search("player", "anything", 0, 10).await.unwrap();
        assert!(hits.ids.is_empty());
        assert_eq!(hits.total, 0);
    }
}
