//! Test registration and sequential execution.

use crate::config::HarnessConfig;
use crate::proc::AppController;
use crate::result::{RunOutput, RunSummary, TestReport, TestResult};
use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info, warn};

/// Per-run context handed to [`ApplicationTest::do_run`].
#[derive(Debug, Clone)]
pub struct TestScope {
    pub test_name: String,
    pub scope_path: PathBuf,
    pub logs_path: PathBuf,
}

/// A test that needs an external application running while it executes.
#[async_trait]
pub trait ApplicationTest: Send + Sync {
    fn name(&self) -> &str;

    fn app_controller(&self) -> &dyn AppController;

    async fn do_run(&self, scope: &TestScope) -> anyhow::Result<RunOutput>;
}

pub struct Runner {
    config: HarnessConfig,
    tests: Vec<Box<dyn ApplicationTest>>,
}

impl Runner {
    pub fn new(config: HarnessConfig) -> Self {
        Self {
            config,
            tests: Vec::new(),
        }
    }

    pub fn add_tests(&mut self, tests: Vec<Box<dyn ApplicationTest>>) {
        self.tests.extend(tests);
    }

    pub fn test_names(&self) -> Vec<&str> {
        self.tests.iter().map(|t| t.name()).collect()
    }

    /// Run every registered test in order and write `report.json` to the logs path.
    pub async fn run(&self) -> anyhow::Result<RunSummary> {
        let mut summary = RunSummary::default();

        for test in &self.tests {
            summary.reports.push(self.run_one(test.as_ref()).await);
        }

        self.write_report(&summary).await?;

        info!(
            passed = summary.passed(),
            failed = summary.failed(),
            "Test run finished"
        );
        Ok(summary)
    }

    async fn run_one(&self, test: &dyn ApplicationTest) -> TestReport {
        let started_at = Utc::now();
        let clock = Instant::now();
        let controller = test.app_controller();
        info!(test = test.name(), app = controller.name(), "Running test");

        let (result, auxiliary) = match controller.start().await {
            Err(e) => {
                error!(test = test.name(), error = %e, "Application failed to start");
                (
                    TestResult::failure(format!("Application failed to start: {e}")),
                    None,
                )
            }
            Ok(()) => {
                let scope = TestScope {
                    test_name: test.name().to_string(),
                    scope_path: self.config.scope_path.clone(),
                    logs_path: self.config.logs_path.clone(),
                };

                let outcome = match test.do_run(&scope).await {
                    Ok(output) => output,
                    Err(e) => {
                        error!(test = test.name(), error = %format!("{e:#}"), "Test run failed");
                        (TestResult::failure(format!("Test run failed: {e:#}")), None)
                    }
                };

                if let Err(e) = controller.stop().await {
                    warn!(test = test.name(), error = %e, "Failed to stop application");
                }
                outcome
            }
        };

        if result.success {
            info!(test = test.name(), "PASSED");
        } else {
            warn!(
                test = test.name(),
                message = result.message.as_deref().unwrap_or(""),
                "FAILED"
            );
        }

        TestReport {
            name: test.name().to_string(),
            result,
            auxiliary,
            started_at,
            duration_ms: clock.elapsed().as_millis() as u64,
        }
    }

    async fn write_report(&self, summary: &RunSummary) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.config.logs_path)
            .await
            .with_context(|| format!("creating {}", self.config.logs_path.display()))?;

        let path = self.config.logs_path.join("report.json");
        let body = serde_json::to_vec_pretty(summary).context("serializing run report")?;
        tokio::fs::write(&path, body)
            .await
            .with_context(|| format!("writing {}", path.display()))?;

        info!(path = %path.display(), "Run report written");
        Ok(())
    }
}
