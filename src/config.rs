// src/config.rs
//! Runtime settings from the environment and the sources file.

use anyhow::{anyhow, bail, Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::http::DEFAULT_USER_AGENT;
use crate::ingest::types::SourceConfig;

pub const ENV_SOURCES_PATH: &str = "IMPORTER_SOURCES_PATH";
pub const ENV_STATE_PATH: &str = "IMPORTER_STATE_PATH";
pub const ENV_MEDIA_DIR: &str = "IMPORTER_MEDIA_DIR";
pub const ENV_INTERVAL: &str = "IMPORTER_INTERVAL";
pub const ENV_GLOBAL_LIMIT: &str = "IMPORTER_GLOBAL_LIMIT";
pub const ENV_HTTP_TIMEOUT_SECS: &str = "IMPORTER_HTTP_TIMEOUT_SECS";
pub const ENV_USER_AGENT: &str = "IMPORTER_USER_AGENT";

pub const DEFAULT_SOURCES_TOML: &str = "config/sources.toml";
pub const DEFAULT_SOURCES_JSON: &str = "config/sources.json";
pub const DEFAULT_STATE_PATH: &str = "state/content.json";
pub const DEFAULT_MEDIA_DIR: &str = "state/media";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

pub const INTERVAL_HOURLY: u64 = 3_600;
pub const INTERVAL_TWICEDAILY: u64 = 43_200;
pub const INTERVAL_DAILY: u64 = 86_400;

/// `hourly`, `twicedaily`, `daily`, or a plain number of seconds.
pub fn parse_interval(s: &str) -> Result<u64> {
    let s = s.trim().to_ascii_lowercase();
    let secs = match s.as_str() {
        "hourly" => INTERVAL_HOURLY,
        "twicedaily" => INTERVAL_TWICEDAILY,
        "daily" => INTERVAL_DAILY,
        other => other
            .parse::<u64>()
            .map_err(|_| anyhow!("unknown interval {other:?} (expected hourly, twicedaily, daily or seconds)"))?,
    };
    if secs == 0 {
        bail!("interval must be greater than zero");
    }
    Ok(secs)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub state_path: PathBuf,
    pub media_dir: PathBuf,
    pub interval_secs: u64,
    /// Applied to sources with `limit = 0`; 0 leaves them unlimited.
    pub global_limit: u32,
    pub http_timeout: Duration,
    pub user_agent: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            state_path: PathBuf::from(DEFAULT_STATE_PATH),
            media_dir: PathBuf::from(DEFAULT_MEDIA_DIR),
            interval_secs: INTERVAL_HOURLY,
            global_limit: 0,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_non_empty(name) {
        Some(v) => v
            .parse::<T>()
            .map_err(|e| anyhow!("{name}={v:?}: {e}")),
        None => Ok(default),
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let d = Self::default();
        let interval_secs = match env_non_empty(ENV_INTERVAL) {
            Some(v) => parse_interval(&v).with_context(|| format!("reading {ENV_INTERVAL}"))?,
            None => d.interval_secs,
        };
        Ok(Self {
            state_path: env_non_empty(ENV_STATE_PATH).map(PathBuf::from).unwrap_or(d.state_path),
            media_dir: env_non_empty(ENV_MEDIA_DIR).map(PathBuf::from).unwrap_or(d.media_dir),
            interval_secs,
            global_limit: env_parse(ENV_GLOBAL_LIMIT, d.global_limit)?,
            http_timeout: Duration::from_secs(env_parse(ENV_HTTP_TIMEOUT_SECS, DEFAULT_HTTP_TIMEOUT_SECS)?),
            user_agent: env_non_empty(ENV_USER_AGENT).unwrap_or(d.user_agent),
        })
    }
}

/// Load source definitions from an explicit path. Supports TOML or JSON.
pub fn load_sources_from(path: &Path) -> Result<Vec<SourceConfig>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading sources from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_sources(&content, ext.as_str()).with_context(|| format!("parsing {}", path.display()))
}

/// Load sources using env var + fallbacks:
/// 1) $IMPORTER_SOURCES_PATH
/// 2) config/sources.toml
/// 3) config/sources.json
pub fn load_sources_default() -> Result<Vec<SourceConfig>> {
    if let Some(p) = env_non_empty(ENV_SOURCES_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_sources_from(&pb);
        }
        bail!("{ENV_SOURCES_PATH} points to non-existent path {}", pb.display());
    }
    let toml_p = PathBuf::from(DEFAULT_SOURCES_TOML);
    if toml_p.exists() {
        return load_sources_from(&toml_p);
    }
    let json_p = PathBuf::from(DEFAULT_SOURCES_JSON);
    if json_p.exists() {
        return load_sources_from(&json_p);
    }
    Ok(Vec::new())
}

#[derive(serde::Deserialize)]
struct SourcesFile {
    #[serde(default)]
    sources: Vec<SourceConfig>,
}

fn parse_sources(s: &str, hint_ext: &str) -> Result<Vec<SourceConfig>> {
    let parsed = if hint_ext == "json" {
        parse_json(s)?
    } else if hint_ext == "toml" {
        toml::from_str::<SourcesFile>(s)?.sources
    } else {
        // no usable extension: JSON first, then TOML
        parse_json(s).or_else(|_| {
            toml::from_str::<SourcesFile>(s)
                .map(|f| f.sources)
                .map_err(anyhow::Error::from)
        })?
    };
    validate(parsed)
}

/// Bare array or `{ "sources": [...] }`.
fn parse_json(s: &str) -> Result<Vec<SourceConfig>> {
    #[derive(serde::Deserialize)]
    #[serde(untagged)]
    enum JsonSources {
        List(Vec<SourceConfig>),
        Wrapped(SourcesFile),
    }
    Ok(match serde_json::from_str::<JsonSources>(s)? {
        JsonSources::List(v) => v,
        JsonSources::Wrapped(f) => f.sources,
    })
}

fn validate(sources: Vec<SourceConfig>) -> Result<Vec<SourceConfig>> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(sources.len());
    for mut src in sources {
        src.id = src.id.trim().to_string();
        src.name = src.name.trim().to_string();
        if src.id.is_empty() {
            bail!("source with empty id");
        }
        if !seen.insert(src.id.clone()) {
            bail!("duplicate source id {:?}", src.id);
        }
        if src.name.is_empty() {
            src.name = src.id.clone();
        }
        out.push(src);
    }
    Ok(out)
}
