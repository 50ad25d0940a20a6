pub mod config;
pub mod elastic;
pub mod proc;
pub mod result;
pub mod runner;
pub mod utils;
pub mod validation;

pub use config::{Config, ConfigError, ElasticConfig, HarnessConfig};
pub use proc::{AppController, ControllerError, SubprocessAppController};
pub use result::{RunOutput, RunSummary, TestReport, TestResult};
pub use runner::{ApplicationTest, Runner, TestScope};
pub use validation::validate_all;
