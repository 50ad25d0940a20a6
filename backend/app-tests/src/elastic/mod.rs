//! Elasticsearch ingestion suite.

pub mod client;
pub mod documents;
pub mod index_and_search;

pub use client::{BulkItemFailure, BulkSummary, ElasticsearchClient, ElasticsearchError};
pub use documents::{Document, DocumentGenerator};
pub use index_and_search::{configure, ElasticIndexAndSearchTest, ElasticTestError, TEST_NAME};
