//! Store and walker configuration.
//!
//! Values can be set programmatically or through environment variables.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `XMLBIND_MAX_READ_ATTEMPTS` | 3 | Stability-checked read attempts per load |
//! | `XMLBIND_RETRY_DELAY_MS` | 50 | Pause between read attempts (milliseconds) |
//! | `XMLBIND_WRITE_SUFFIX` | .w.tmp | Suffix of the temporary file written by save |
//! | `XMLBIND_READ_SUFFIX` | .r.tmp | Suffix of the private copy parsed by load |
//! | `XMLBIND_INDENT` | 2 | Spaces per indentation level |
//! | `XMLBIND_SYNC_ON_SAVE` | true | Flush the temporary file to disk before the rename |
//! | `XMLBIND_FAILURE_POLICY` | lenient | `lenient` absorbs member failures, `strict` propagates them |
//! | `XMLBIND_ACCESS_MODE` | compiled | `compiled` or `reflective` accessors |
//!
//! # Example
//!
//! ```rust
//! use xmlbind::{FailurePolicy, StoreConfig};
//!
//! // Create from environment
//! let config = StoreConfig::from_env();
//!
//! // Or create programmatically
//! let config = StoreConfig {
//!     failure_policy: FailurePolicy::Strict,
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use std::time::Duration;

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};

/// What the walker does when a single member cannot be written or read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Log the failure, degrade the member and keep walking.
    #[default]
    Lenient,
    /// Abort the whole call with the member's error.
    Strict,
}

impl FailurePolicy {
    pub fn is_lenient(self) -> bool {
        self == FailurePolicy::Lenient
    }
}

/// How accessor thunks are produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    /// Monomorphic closures, compiled once per member and memoized.
    #[default]
    Compiled,
    /// Uncached dynamic dispatch with per-call tracing, for debugging.
    Reflective,
}

/// Configuration for [`XmlFileStore`](crate::XmlFileStore) and the walker.
#[derive(Debug, Clone, PartialEq, Eq, Parser, Serialize, Deserialize)]
#[command(name = "xmlbind")]
#[command(about = "XML object store settings")]
#[serde(default)]
pub struct StoreConfig {
    /// Read attempts before a load gives up on a file that keeps changing.
    #[arg(long, env = "XMLBIND_MAX_READ_ATTEMPTS", default_value = "3")]
    pub max_read_attempts: u32,

    /// Pause between read attempts in milliseconds.
    #[arg(long, env = "XMLBIND_RETRY_DELAY_MS", default_value = "50")]
    pub retry_delay_ms: u64,

    /// Suffix appended to the target path for the save temporary.
    #[arg(long, env = "XMLBIND_WRITE_SUFFIX", default_value = ".w.tmp")]
    pub write_suffix: String,

    /// Suffix appended to the target path for the load copy.
    #[arg(long, env = "XMLBIND_READ_SUFFIX", default_value = ".r.tmp")]
    pub read_suffix: String,

    /// Spaces per indentation level (0 disables indentation).
    #[arg(long, env = "XMLBIND_INDENT", default_value = "2")]
    pub indent: usize,

    /// Flush the save temporary to disk before renaming it.
    #[arg(long, env = "XMLBIND_SYNC_ON_SAVE", default_value = "true")]
    pub sync_on_save: bool,

    /// Member failure policy.
    #[arg(long, env = "XMLBIND_FAILURE_POLICY", value_enum, default_value = "lenient")]
    pub failure_policy: FailurePolicy,

    /// Accessor strategy.
    #[arg(long, env = "XMLBIND_ACCESS_MODE", value_enum, default_value = "compiled")]
    pub access_mode: AccessMode,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_read_attempts: 3,
            retry_delay_ms: 50,
            write_suffix: ".w.tmp".to_string(),
            read_suffix: ".r.tmp".to_string(),
            indent: 2,
            sync_on_save: true,
            failure_policy: FailurePolicy::Lenient,
            access_mode: AccessMode::Compiled,
        }
    }
}

impl StoreConfig {
    /// Creates a StoreConfig from environment variables only.
    ///
    /// Command line arguments of the host process are ignored. Invalid values
    /// fall back to the defaults.
    pub fn from_env() -> Self {
        Self::try_parse_from([env!("CARGO_PKG_NAME")]).unwrap_or_default()
    }

    /// Pause between read attempts.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Validates the configuration and returns errors if any.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.max_read_attempts == 0 {
            errors.push("Max read attempts cannot be 0".to_string());
        }

        if self.write_suffix.is_empty() {
            errors.push("Write suffix cannot be empty".to_string());
        }

        if self.read_suffix.is_empty() {
            errors.push("Read suffix cannot be empty".to_string());
        }

        if !self.write_suffix.is_empty() && self.write_suffix == self.read_suffix {
            errors.push("Write and read suffixes must differ".to_string());
        }

        if self.indent > 16 {
            errors.push("Indent cannot exceed 16 spaces".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
