//! Retrieval client.
//!
//! A [`Retriever`] turns a [`RetrievalQuery`] into a bounded list of ranked
//! [`Passage`]s. Ranks start at 1 and follow the order returned by the
//! search service; that order is the citation numbering used downstream.
//! An empty result is a valid outcome, not an error.

pub mod collection;
pub mod filter;
pub mod http;

pub use collection::{
    CollectionConfig, GLOBAL_PENSION_COLLECTION, STEWARDSHIP_COLLECTION, default_collections,
};
pub use filter::Filter;
pub use http::HttpRetriever;

use crate::core::{Passage, SourceMetadata};
use crate::error::RetrievalError;
use async_trait::async_trait;

/// A semantic search request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalQuery {
    /// Search text.
    pub query: String,
    /// Collection name.
    pub collection: String,
    /// Maximum number of passages, at least 1.
    pub limit: usize,
    /// Optional record filter.
    pub filter: Option<Filter>,
}

impl RetrievalQuery {
    /// Creates a query. A zero `limit` is raised to 1.
    #[must_use]
    pub fn new(query: impl Into<String>, collection: impl Into<String>, limit: usize) -> Self {
        Self {
            query: query.into(),
            collection: collection.into(),
            limit: limit.max(1),
            filter: None,
        }
    }

    /// Attaches a filter.
    #[must_use]
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Checks the query before it is sent.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::EmptyQuery`] for blank search text and
    /// [`RetrievalError::InvalidCollection`] for a blank collection name.
    pub fn validate(&self) -> Result<(), RetrievalError> {
        if self.query.trim().is_empty() {
            return Err(RetrievalError::EmptyQuery);
        }
        if self.collection.trim().is_empty() {
            return Err(RetrievalError::InvalidCollection {
                collection: self.collection.clone(),
            });
        }
        Ok(())
    }
}

/// Semantic search over a document collection.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Returns at most `query.limit` passages ranked 1..=n by relevance.
    async fn search(&self, query: &RetrievalQuery) -> Result<Vec<Passage>, RetrievalError>;
}

/// Assigns ranks 1..=n to records in service order, keeping at most `limit`.
#[must_use]
pub fn rank_passages<I>(records: I, limit: usize) -> Vec<Passage>
where
    I: IntoIterator<Item = (String, SourceMetadata)>,
{
    records
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(index, (text, source))| Passage::new(text, source, index + 1))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_validate_empty_query() {
        let query = RetrievalQuery::new("   ", STEWARDSHIP_COLLECTION, 5);
        assert_eq!(query.validate(), Err(RetrievalError::EmptyQuery));
    }

    #[test]
    fn test_validate_empty_collection() {
        let query = RetrievalQuery::new("voting policy", "", 5);
        assert!(matches!(
            query.validate(),
            Err(RetrievalError::InvalidCollection { .. })
        ));
    }

    #[test]
    fn test_limit_is_positive() {
        assert_eq!(RetrievalQuery::new("q", "c", 0).limit, 1);
    }

    #[test]
    fn test_rank_passages_truncates() {
        let records = (0..8).map(|i| (format!("text {i}"), SourceMetadata::titled("r.pdf")));
        let passages = rank_passages(records, 3);
        assert_eq!(passages.len(), 3);
        assert_eq!(passages[2].text, "text 2");
        assert_eq!(passages[2].rank, 3);
    }

    proptest! {
        #[test]
        fn prop_ranks_follow_positions(count in 0usize..30, limit in 1usize..20) {
            let records =
                (0..count).map(|i| (format!("p{i}"), SourceMetadata::titled(format!("doc{i}"))));
            let passages = rank_passages(records, limit);

            prop_assert_eq!(passages.len(), count.min(limit));
            for (index, passage) in passages.iter().enumerate() {
                prop_assert_eq!(passage.rank, index + 1);
                prop_assert_eq!(&passage.text, &format!("p{index}"));
            }
        }
    }
}
