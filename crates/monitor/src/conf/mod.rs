//! Configuration module — YAML schema, environment overrides, loading and
//! the compiled immutable snapshot the pipeline reads.

pub mod env;
pub mod load;
pub mod model;
pub mod snapshot;

use std::path::PathBuf;

use thiserror::Error;

use crate::filter::FilterError;
use crate::rules::template::TemplateError;

pub use load::ConfigLoader;
pub use model::{FileConfig, Settings};
pub use snapshot::{ConfigSnapshot, EffectiveSettings, MonitoredEntity};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid YAML in {origin}: {source}")]
    Yaml {
        origin: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("Invalid value for environment variable {var}: '{value}'")]
    Env { var: String, value: String },
    #[error("Invalid configuration: {0}")]
    Validation(String),
    #[error("Rule '{rule}' in {scope} failed to compile: {source}")]
    RuleCompilation {
        scope: String,
        rule: String,
        #[source]
        source: FilterError,
    },
    #[error("Rule '{rule}' in {scope} has an unusable template: {source}")]
    RuleTemplate {
        scope: String,
        rule: String,
        #[source]
        source: TemplateError,
    },
}
