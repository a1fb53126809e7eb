use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use listsync_core::{BackoffPolicy, LibraryState, SourceConfig};
use listsync_engine::{EngineSettings, FetchSettings};
use serde::Deserialize;
use sync_logging::sync_warn;

/// Everything read from the `--config` file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub sources: Vec<SourceConfig>,
    /// Tokens keyed by the `auth_ref` sources point at.
    pub credentials: BTreeMap<String, String>,
    pub fetch: FetchConfig,
    pub engine: EngineSettings,
    pub backoff: BackoffPolicy,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub base_url: String,
    pub user_agent: Option<String>,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub requests_per_second: u32,
    pub max_page_bytes: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        let settings = FetchSettings::default();
        Self {
            base_url: settings.base_url,
            user_agent: None,
            connect_timeout_secs: settings.connect_timeout.as_secs(),
            request_timeout_secs: settings.request_timeout.as_secs(),
            requests_per_second: settings.requests_per_second,
            max_page_bytes: settings.max_page_bytes,
        }
    }
}

impl FetchConfig {
    pub fn to_settings(&self) -> FetchSettings {
        let defaults = FetchSettings::default();
        FetchSettings {
            base_url: self.base_url.clone(),
            user_agent: self.user_agent.clone().unwrap_or(defaults.user_agent),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            max_page_bytes: self.max_page_bytes,
            requests_per_second: self.requests_per_second,
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let config: AppConfig = ron::from_str(text)?;
        let mut seen = std::collections::BTreeSet::new();
        for source in &config.sources {
            if !seen.insert(source.id) {
                anyhow::bail!("source id {} is configured twice", source.id);
            }
            if let Some(auth_ref) = &source.auth_ref {
                if !config.credentials.contains_key(auth_ref) {
                    sync_warn!(
                        "Source {} refers to credential '{}' which is not configured",
                        source.id,
                        auth_ref
                    );
                }
            }
        }
        Ok(config)
    }
}

/// Reads the library export, or an empty library when none is given.
pub fn load_library(path: Option<&Path>) -> anyhow::Result<LibraryState> {
    let Some(path) = path else {
        sync_warn!("No library export given, treating the library as empty");
        return Ok(LibraryState::new());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading library {}", path.display()))?;
    ron::from_str(&text).with_context(|| format!("parsing library {}", path.display()))
}
