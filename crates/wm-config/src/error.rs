//! Configuration errors

use std::path::PathBuf;
use thiserror::Error;

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Raised while reading, tag-processing or validating a [`crate::ModuleConfig`]
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML in {path}: {source}")]
    ParseYaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Host property dump is not valid JSON or does not match the schema
    #[error("invalid module properties: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("unknown secret '{key}'")]
    SecretNotFound { key: String },

    #[error("bad include path '{path}': {reason}")]
    InvalidIncludePath { path: String, reason: String },

    /// Target of `!include_dir_merge_list` is missing
    #[error("no such directory: {path}")]
    DirectoryNotFound { path: PathBuf },

    #[error("{path} includes itself")]
    CircularInclude { path: PathBuf },

    #[error("'{var}' is not set in the environment")]
    EnvVarNotFound { var: String },

    #[error("bad value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },
}
