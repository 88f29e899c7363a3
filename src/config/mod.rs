//! Site configuration: the parsed rule DSL plus per-run options.
//!
//! | Type            | Source                                  |
//! |-----------------|-----------------------------------------|
//! | [`SiteConfig`]  | the config file (`site.conf`)           |
//! | [`BuildOptions`]| CLI flags that change how a build runs  |
//! | [`ServeOptions`]| CLI flags for the dev server            |
//!
//! The config is re-read from disk for every build, so watch mode picks up
//! rule and template changes without restarting.

mod error;
pub mod parser;
pub mod rules;

pub use error::ConfigError;
pub use rules::{Command, Rule, RuleTable};

use educe::Educe;
use serde::{Serialize, Serializer};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

/// Default config filename
pub const CONFIG_FILE: &str = "site.conf";

// ============================================================================
// SiteConfig
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct SiteConfig {
    /// Path of the config file itself
    pub config_path: PathBuf,
    /// Directory the config lives in; every relative path resolves here
    pub base: PathBuf,
    pub templates: Vec<PathBuf>,
    pub source: PathBuf,
    pub output: PathBuf,
    /// Limit for a single external command
    #[serde(serialize_with = "serialize_secs")]
    pub timeout: Option<Duration>,
    /// Every variable that is not one of the well-known keys
    pub vars: BTreeMap<String, String>,
    pub rules: RuleTable,
    /// Config mtime; templates are folded in when the site loads
    #[serde(skip)]
    pub changed_at: SystemTime,
}

impl SiteConfig {
    /// Read and parse a config file.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let io_err = |e| ConfigError::Io(path.to_path_buf(), e);

        let path = fs::canonicalize(path).map_err(io_err)?;
        let text = fs::read_to_string(&path).map_err(io_err)?;
        let changed_at = fs::metadata(&path)
            .and_then(|m| m.modified())
            .map_err(io_err)?;
        let base = path.parent().unwrap_or(Path::new("/")).to_path_buf();

        let mut config = parser::parse(&text, &base)?;
        config.config_path = path;
        config.changed_at = changed_at;
        Ok(config)
    }

    /// Source or output path made relative to the config directory, for logs.
    pub fn display_path<'a>(&self, path: &'a Path) -> std::borrow::Cow<'a, str> {
        path.strip_prefix(&self.base)
            .unwrap_or(path)
            .to_string_lossy()
    }
}

fn serialize_secs<S: Serializer>(timeout: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
    match timeout {
        Some(d) => s.serialize_some(&d.as_secs()),
        None => s.serialize_none(),
    }
}

// ============================================================================
// Run options
// ============================================================================

/// Options for one build.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Treat every page as changed
    pub force: bool,
    /// Overrides the config's `TIMEOUT`
    pub timeout: Option<Duration>,
}

impl BuildOptions {
    pub fn timeout(&self, config: &SiteConfig) -> Option<Duration> {
        self.timeout.or(config.timeout)
    }
}

/// Dev server settings.
#[derive(Debug, Clone, Educe)]
#[educe(Default)]
pub struct ServeOptions {
    /// Network interface to bind.
    #[educe(Default = String::from("127.0.0.1"))]
    pub interface: String,

    /// HTTP port number (default: 8000).
    #[educe(Default = 8000)]
    pub port: u16,
}
