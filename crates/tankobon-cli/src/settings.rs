//! Optional TOML settings file.
//!
//! ```toml
//! [session]
//! auto_fetch_when_empty = false
//!
//! [logging]
//! format = "compact"
//! timestamps = true
//! ```
//!
//! Every key is optional. Command line flags win over the file.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tankobon_chapters::SessionConfig;

use crate::logging::LogFormat;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub session: SessionConfig,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Output format when `--log-format` is not given.
    pub format: Option<LogFormat>,
    pub timestamps: bool,
    /// Include module paths in log lines.
    pub target: bool,
}

impl Settings {
    /// Load settings, or defaults when no path is given.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or is not valid settings TOML.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = fs::read_to_string(path)
            .with_context(|| format!("read settings file {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parse settings file {}", path.display()))
    }
}
