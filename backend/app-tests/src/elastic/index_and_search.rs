use super::client::{BulkSummary, ElasticsearchClient, ElasticsearchError};
use super::documents::DocumentGenerator;
use crate::config::{Config, ElasticConfig};
use crate::proc::{AppController, SubprocessAppController};
use crate::result::{RunOutput, TestResult};
use crate::runner::{ApplicationTest, Runner, TestScope};
use crate::utils::random_string;
use crate::validation::validate_all;
use anyhow::Context;
use async_trait::async_trait;
use tracing::info;

pub const TEST_NAME: &str = "index and search test";
const INDEX_SUFFIX_LEN: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum ElasticTestError {
    #[error("could not connect to Elasticsearch at {address} after {attempts} attempts")]
    Connection {
        address: String,
        attempts: u32,
        #[source]
        last_error: ElasticsearchError,
    },
}

/// Bulk-indexes a batch of synthetic documents into a fresh index and checks
/// that all of them are counted after a refresh.
pub struct ElasticIndexAndSearchTest {
    config: ElasticConfig,
    app_controller: Box<dyn AppController>,
}

impl ElasticIndexAndSearchTest {
    pub fn new(config: ElasticConfig, app_controller: Box<dyn AppController>) -> Self {
        Self {
            config,
            app_controller,
        }
    }

    async fn connect_to_es(&self) -> Result<ElasticsearchClient, ElasticTestError> {
        ElasticsearchClient::connect(&self.config)
            .await
            .map_err(|e| ElasticTestError::Connection {
                address: format!("{}:{}", self.config.host, self.config.port),
                attempts: e.attempts(),
                last_error: e.into_last_error(),
            })
    }
}

/// Fold the observed numbers into the test verdict.
///
/// The count check comes first so a plain count mismatch reports exactly
/// `Expected to have N docs in index, but found M`.
pub fn evaluate(expected: usize, docs_in_index: u64, bulk: &BulkSummary) -> TestResult {
    validate_all([
        (
            docs_in_index == expected as u64,
            format!("Expected to have {expected} docs in index, but found {docs_in_index}"),
        ),
        (
            bulk.failed.is_empty(),
            format!(
                "Bulk indexing rejected {} of {} documents",
                bulk.failed.len(),
                bulk.submitted
            ),
        ),
        (
            bulk.indexed + bulk.failed.len() == bulk.submitted,
            format!(
                "Bulk response acknowledged {} of {} documents",
                bulk.indexed + bulk.failed.len(),
                bulk.submitted
            ),
        ),
    ])
}

#[async_trait]
impl ApplicationTest for ElasticIndexAndSearchTest {
    fn name(&self) -> &str {
        TEST_NAME
    }

    fn app_controller(&self) -> &dyn AppController {
        self.app_controller.as_ref()
    }

    async fn do_run(&self, _scope: &TestScope) -> anyhow::Result<RunOutput> {
        info!(
            "Connecting to Elasticsearch at {}:{}",
            self.config.host, self.config.port
        );
        let es = self.connect_to_es().await?;

        let cluster = es.info().await.context("fetching cluster info")?;
        info!(%cluster, "Elastic info");

        let documents_num = self.config.documents;
        info!("Sending {} documents to Elastic.", documents_num);

        let index = format!("test_{}", random_string(INDEX_SUFFIX_LEN));
        es.create_index(&index)
            .await
            .with_context(|| format!("creating index {index}"))?;

        let bulk = es
            .bulk_index(
                &index,
                DocumentGenerator::new(documents_num),
                self.config.bulk_chunk_size,
            )
            .await
            .with_context(|| format!("bulk indexing into {index}"))?;

        info!(index = %index, "Refreshing elastic index");
        es.refresh(&index)
            .await
            .with_context(|| format!("refreshing {index}"))?;

        let docs_in_index = es
            .count(&index)
            .await
            .with_context(|| format!("counting documents in {index}"))?;
        info!(index = %index, docs_in_index, "Index count retrieved");

        Ok((evaluate(documents_num, docs_in_index, &bulk), None))
    }
}

/// Register the Elasticsearch suite with `runner`.
pub fn configure(runner: &mut Runner, config: &Config) {
    let app_controller = SubprocessAppController::new(
        vec![config.elastic.entrypoint.clone()],
        "elastic",
        &config.harness.scope_path,
        &config.harness.logs_path,
        config.elastic.start_wait,
    );

    runner.add_tests(vec![Box::new(ElasticIndexAndSearchTest::new(
        config.elastic.clone(),
        Box::new(app_controller),
    ))]);
}
