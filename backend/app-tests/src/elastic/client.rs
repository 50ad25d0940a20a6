use crate::config::ElasticConfig;
use elasticsearch::{
    http::{
        request::JsonBody,
        response::Response,
        transport::{BuildError, SingleNodeConnectionPool, TransportBuilder},
        StatusCode,
    },
    indices::{IndicesCreateParts, IndicesRefreshParts},
    BulkParts, CountParts, Elasticsearch,
};
use resilience::{with_retry, RetryError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Error)]
pub enum ElasticsearchError {
    #[error("invalid Elasticsearch URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("failed to build transport: {0}")]
    TransportBuild(#[from] BuildError),
    #[error("transport error: {0}")]
    Transport(#[from] elasticsearch::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("{operation} returned {status}: {body}")]
    UnexpectedStatus {
        operation: &'static str,
        status: StatusCode,
        body: String,
    },
}

/// Thin wrapper over the official client exposing the calls the
/// index-and-search test needs.
#[derive(Clone)]
pub struct ElasticsearchClient {
    client: Elasticsearch,
    url: Url,
}

/// Outcome of a bulk write, aggregated over every chunk sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkSummary {
    pub submitted: usize,
    pub indexed: usize,
    pub failed: Vec<BulkItemFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkItemFailure {
    pub id: Option<String>,
    pub status: u16,
    pub reason: String,
}

impl ElasticsearchClient {
    pub fn new(url: &str, request_timeout: Duration) -> Result<Self, ElasticsearchError> {
        let parsed = Url::parse(url)?;
        let pool = SingleNodeConnectionPool::new(parsed.clone());
        let transport = TransportBuilder::new(pool).timeout(request_timeout).build()?;

        Ok(Self {
            client: Elasticsearch::new(transport),
            url: parsed,
        })
    }

    /// Build a client and ping it, retrying per the configured connect policy.
    pub async fn connect(
        config: &ElasticConfig,
    ) -> Result<Self, RetryError<ElasticsearchError>> {
        with_retry(config.connect_retry(), move || async move {
            let url = config.url()?;
            let client = Self::new(url.as_str(), config.request_timeout)?;
            client.ping().await?;
            Ok::<_, ElasticsearchError>(client)
        })
        .await
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub async fn ping(&self) -> Result<(), ElasticsearchError> {
        let response = self.client.ping().send().await?;
        ensure_success("ping", response).await?;
        Ok(())
    }

    pub async fn info(&self) -> Result<Value, ElasticsearchError> {
        let response = self.client.info().send().await?;
        let response = ensure_success("info", response).await?;
        Ok(response.json::<Value>().await?)
    }

    pub async fn create_index(&self, index: &str) -> Result<(), ElasticsearchError> {
        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(index))
            .send()
            .await?;
        ensure_success("create index", response).await?;
        Ok(())
    }

    /// Index every document yielded by `docs` into `index`.
    ///
    /// Documents are pulled from the iterator `chunk_size` at a time, so only
    /// one chunk is held in memory. Each chunk is one `_bulk` request.
    pub async fn bulk_index<I, T>(
        &self,
        index: &str,
        docs: I,
        chunk_size: usize,
    ) -> Result<BulkSummary, ElasticsearchError>
    where
        I: IntoIterator<Item = T>,
        T: Serialize,
    {
        let chunk_size = chunk_size.max(1);
        let mut docs = docs.into_iter();
        let mut summary = BulkSummary::default();

        loop {
            // Two lines per document, sized by what is actually left
            let capacity = chunk_size.min(docs.size_hint().0).saturating_mul(2);
            let mut body: Vec<JsonBody<Value>> = Vec::with_capacity(capacity);
            for doc in docs.by_ref().take(chunk_size) {
                body.push(json!({ "index": {} }).into());
                body.push(serde_json::to_value(&doc)?.into());
            }
            if body.is_empty() {
                break;
            }

            let sent = body.len() / 2;
            let response = self
                .client
                .bulk(BulkParts::Index(index))
                .body(body)
                .send()
                .await?;
            let response = ensure_success("bulk", response).await?;
            let parsed: BulkResponse = response.json().await?;

            summary.submitted += sent;
            summary.absorb(parsed);
            debug!(
                index,
                submitted = summary.submitted,
                failed = summary.failed.len(),
                "Bulk chunk written"
            );
        }

        if !summary.failed.is_empty() {
            warn!(
                index,
                failed = summary.failed.len(),
                first_reason = %summary.failed[0].reason,
                "Bulk indexing rejected documents"
            );
        }

        Ok(summary)
    }

    pub async fn refresh(&self, index: &str) -> Result<(), ElasticsearchError> {
        let response = self
            .client
            .indices()
            .refresh(IndicesRefreshParts::Index(&[index]))
            .send()
            .await?;
        ensure_success("refresh", response).await?;
        Ok(())
    }

    pub async fn count(&self, index: &str) -> Result<u64, ElasticsearchError> {
        let response = self
            .client
            .count(CountParts::Index(&[index]))
            .send()
            .await?;
        let response = ensure_success("count", response).await?;
        let parsed: CountResponse = response.json().await?;
        Ok(parsed.count)
    }
}

async fn ensure_success(
    operation: &'static str,
    response: Response,
) -> Result<Response, ElasticsearchError> {
    let status = response.status_code();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    debug!(operation, %status, "Elasticsearch returned an error status");
    Err(ElasticsearchError::UnexpectedStatus {
        operation,
        status,
        body,
    })
}

impl BulkSummary {
    fn absorb(&mut self, response: BulkResponse) {
        for item in response.items {
            // One entry per item, keyed by the action name ("index")
            for (_, result) in item {
                match result.failure() {
                    Some(failure) => self.failed.push(failure),
                    None => self.indexed += 1,
                }
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct BulkResponse {
    #[serde(default)]
    items: Vec<HashMap<String, BulkItemResult>>,
}

#[derive(Debug, Deserialize)]
struct BulkItemResult {
    #[serde(rename = "_id")]
    id: Option<String>,
    status: u16,
    error: Option<Value>,
}

impl BulkItemResult {
    fn failure(self) -> Option<BulkItemFailure> {
        if self.error.is_none() && self.status < 300 {
            return None;
        }
        let reason = match &self.error {
            Some(err) => err
                .get("reason")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| err.to_string()),
            None => format!("status {}", self.status),
        };
        Some(BulkItemFailure {
            id: self.id,
            status: self.status,
            reason,
        })
    }
}

#[derive(Debug, Deserialize)]
struct CountResponse {
    count: u64,
}
