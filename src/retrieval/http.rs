//! REST search client.
//!
//! Posts `{query, collection, columns, limit, filter}` to the configured
//! endpoint and expects `{"results": [{column: value, ...}, ...]}` back,
//! ordered by descending relevance.

use super::collection::CollectionConfig;
use super::filter::Filter;
use super::{RetrievalQuery, Retriever, rank_passages};
use crate::core::{Passage, SourceMetadata};
use crate::error::RetrievalError;
use crate::io::clip_bytes;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// Maximum bytes of an error body kept in [`RetrievalError::Status`].
const ERROR_BODY_MAX_BYTES: usize = 512;

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    collection: &'a str,
    columns: Vec<String>,
    limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<&'a Filter>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<Map<String, Value>>,
}

/// Search client for a REST search service.
pub struct HttpRetriever {
    client: Client,
    endpoint: String,
    token: Option<String>,
    collections: Vec<CollectionConfig>,
}

impl HttpRetriever {
    /// Creates a client for `endpoint` that knows the given collections.
    #[must_use]
    pub fn new(endpoint: impl Into<String>, collections: Vec<CollectionConfig>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            token: None,
            collections,
        }
    }

    /// Sets the bearer token sent with every request.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn collection(&self, name: &str) -> Result<&CollectionConfig, RetrievalError> {
        self.collections
            .iter()
            .find(|c| c.name == name && c.has_valid_service())
            .ok_or_else(|| RetrievalError::InvalidCollection {
                collection: name.to_string(),
            })
    }
}

#[async_trait]
impl Retriever for HttpRetriever {
    async fn search(&self, query: &RetrievalQuery) -> Result<Vec<Passage>, RetrievalError> {
        query.validate()?;
        let collection = self.collection(&query.collection)?;

        let body = SearchRequest {
            query: &query.query,
            collection: &collection.service,
            columns: collection.columns(),
            limit: query.limit,
            filter: query.filter.as_ref(),
        };

        debug!(
            endpoint = %self.endpoint,
            service = %collection.service,
            limit = query.limit,
            filtered = query.filter.is_some(),
            "Sending search request"
        );

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(RetrievalError::Status {
                status: status.as_u16(),
                body: clip_bytes(&text, ERROR_BODY_MAX_BYTES).to_string(),
            });
        }

        let decoded: SearchResponse = serde_json::from_str(&text)
            .map_err(|e| RetrievalError::MalformedResponse(e.to_string()))?;

        let passages = rank_passages(
            decoded
                .results
                .iter()
                .map(|record| record_to_passage(record, collection)),
            query.limit,
        );
        debug!(count = passages.len(), "Search returned passages");
        Ok(passages)
    }
}

/// Extracts passage text and provenance from one result record.
fn record_to_passage(
    record: &Map<String, Value>,
    collection: &CollectionConfig,
) -> (String, SourceMetadata) {
    let text = column_value(record, &collection.search_column).unwrap_or_default();
    let mut source = SourceMetadata::titled(
        column_value(record, &collection.title_column).unwrap_or_default(),
    );
    source.path = optional_column(record, collection.path_column.as_deref());
    source.url = optional_column(record, collection.url_column.as_deref());
    source.page = optional_column(record, collection.page_column.as_deref());
    (text, source)
}

fn optional_column(record: &Map<String, Value>, column: Option<&str>) -> Option<String> {
    column
        .and_then(|c| column_value(record, c))
        .filter(|v| !v.is_empty())
}

/// Looks a column up case-insensitively and renders scalars as text.
fn column_value(record: &Map<String, Value>, column: &str) -> Option<String> {
    let value = record.get(column).or_else(|| {
        record
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(column))
            .map(|(_, v)| v)
    })?;
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::default_collections;
    use crate::testing::serve_once;
    use serde_json::json;

    fn record(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn test_record_to_passage_mixed_case_columns() {
        let collection = &default_collections()[0];
        let record = record(json!({
            "CHUNK_TEXT": "Independent directors form the majority.",
            "FILE_NAME": "AMOne_2024.pdf",
            "relative_path": "am/AMOne_2024.pdf",
            "PAGE_INDEX": 3
        }));

        let (text, source) = record_to_passage(&record, collection);
        assert_eq!(text, "Independent directors form the majority.");
        assert_eq!(source.title, "AMOne_2024.pdf");
        assert_eq!(source.path.as_deref(), Some("am/AMOne_2024.pdf"));
        assert_eq!(source.page.as_deref(), Some("3"));
        assert_eq!(source.url, None);
    }

    #[test]
    fn test_missing_columns_are_tolerated() {
        let collection = &default_collections()[0];
        let (text, source) = record_to_passage(&record(json!({"other": 1})), collection);
        assert!(text.is_empty());
        assert!(source.title.is_empty());
        assert_eq!(source.page, None);
    }

    #[test]
    fn test_request_serialization() {
        let filter = Filter::eq("file_name", "a.pdf");
        let body = SearchRequest {
            query: "voting",
            collection: "DB.S.SVC",
            columns: vec!["chunk_text".to_string()],
            limit: 5,
            filter: Some(&filter),
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["filter"], json!({"@eq": {"file_name": "a.pdf"}}));
        assert_eq!(value["limit"], json!(5));

        let unfiltered = SearchRequest { filter: None, ..body };
        assert!(serde_json::to_value(&unfiltered).unwrap().get("filter").is_none());
    }

    #[tokio::test]
    async fn test_unknown_collection_rejected_before_sending() {
        let retriever = HttpRetriever::new("http://127.0.0.1:9", default_collections());
        let err = retriever
            .search(&RetrievalQuery::new("voting", "missing", 5))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            RetrievalError::InvalidCollection {
                collection: "missing".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_search_ranks_service_results() {
        let (endpoint, request) = serve_once(
            200,
            r#"{"results": [
                {"CHUNK_TEXT": "Independent directors.",
                 "FILE_NAME": "ReportA.pdf", "PAGE_INDEX": 3},
                {"CHUNK_TEXT": "Votes are disclosed.",
                 "FILE_NAME": "ReportA.pdf", "PAGE_INDEX": 7},
                {"CHUNK_TEXT": "Beyond the limit.", "FILE_NAME": "ReportB.pdf"}
            ]}"#,
        )
        .await;
        let retriever = HttpRetriever::new(endpoint, default_collections()).with_token("secret");
        let query = RetrievalQuery::new("board independence", "stewardship", 2)
            .with_filter(Filter::eq("file_name", "ReportA.pdf"));

        let passages = retriever.search(&query).await.unwrap();

        assert_eq!(passages.len(), 2);
        assert_eq!(passages[0].rank, 1);
        assert_eq!(passages[0].text, "Independent directors.");
        assert_eq!(passages[0].source.page.as_deref(), Some("3"));
        assert_eq!(passages[1].rank, 2);
        assert_eq!(passages[1].source.page.as_deref(), Some("7"));

        let sent: Value = serde_json::from_str(&request.await.unwrap()).unwrap();
        assert_eq!(
            sent["collection"],
            json!("DEMO_DB.DEMO_SUSTAINABILITY.SUSTAINABILITY_REPORT")
        );
        assert_eq!(sent["limit"], json!(2));
        assert_eq!(sent["filter"], json!({"@eq": {"file_name": "ReportA.pdf"}}));
    }

    #[tokio::test]
    async fn test_search_error_status() {
        let (endpoint, _request) = serve_once(500, "index offline").await;
        let retriever = HttpRetriever::new(endpoint, default_collections());

        let err = retriever
            .search(&RetrievalQuery::new("voting", "stewardship", 5))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            RetrievalError::Status {
                status: 500,
                body: "index offline".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_search_malformed_body() {
        let (endpoint, _request) = serve_once(200, "<html>gateway</html>").await;
        let retriever = HttpRetriever::new(endpoint, default_collections());

        let err = retriever
            .search(&RetrievalQuery::new("voting", "stewardship", 5))
            .await
            .unwrap_err();

        assert!(matches!(err, RetrievalError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_empty_query_rejected_before_sending() {
        let retriever = HttpRetriever::new("http://127.0.0.1:9", default_collections());
        let err = retriever
            .search(&RetrievalQuery::new("", "stewardship", 5))
            .await
            .unwrap_err();
        assert_eq!(err, RetrievalError::EmptyQuery);
    }
}
