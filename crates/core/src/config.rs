use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_i64(profile: &str, key: &str, default: i64) -> i64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_usize(profile: &str, key: &str, default: usize) -> usize {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub risk: RiskConfig,
    pub store: PolicyStoreConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `SQLRISK_PROFILE`. When set (e.g. `PROD`), every
    /// key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Result<Self, CoreError> {
        let profile = env_or("SQLRISK_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Result<Self, CoreError> {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Ok(Self {
            profile: p.to_string(),
            risk: RiskConfig::from_env_profiled(p),
            store: PolicyStoreConfig::from_env_profiled(p)?,
        })
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  risk:   tx_duration={}s, rows_threshold={}, size_threshold={}MB, cache={}",
            self.risk.tx_duration_secs,
            self.risk.tab_rows_threshold,
            self.risk.tab_size_threshold_mb,
            self.risk.fact_cache_capacity
        );
        tracing::info!("  store:  kind={}, path={}", self.store.kind, self.store.path.display());
    }
}

// ── Risk thresholds ───────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Open transactions older than this many seconds count as big transactions.
    pub tx_duration_secs: i64,
    /// Tables at or below this row count get an exact affected-row count.
    pub tab_rows_threshold: i64,
    /// Tables below this size (MB) get an exact affected-row count.
    pub tab_size_threshold_mb: i64,
    /// Capacity of the per-work-order fact cache.
    pub fact_cache_capacity: usize,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            tx_duration_secs: 10,
            tab_rows_threshold: 100_000,
            tab_size_threshold_mb: 2048,
            fact_cache_capacity: 1024,
        }
    }
}

impl RiskConfig {
    fn from_env_profiled(p: &str) -> Self {
        let d = Self::default();
        Self {
            tx_duration_secs: profiled_env_i64(p, "SQLRISK_TX_DURATION_SECS", d.tx_duration_secs),
            tab_rows_threshold: profiled_env_i64(p, "SQLRISK_TAB_ROWS_THRESHOLD", d.tab_rows_threshold),
            tab_size_threshold_mb: profiled_env_i64(
                p,
                "SQLRISK_TAB_SIZE_THRESHOLD_MB",
                d.tab_size_threshold_mb,
            ),
            fact_cache_capacity: profiled_env_usize(
                p,
                "SQLRISK_FACT_CACHE_CAPACITY",
                d.fact_cache_capacity,
            ),
        }
    }

    /// Whether a table is small enough for an exact `COUNT(*)`.
    pub fn is_small_table(&self, rows: i64, size_mb: i64) -> bool {
        rows <= self.tab_rows_threshold && size_mb < self.tab_size_threshold_mb
    }
}

// ── Policy store ──────────────────────────────────────────────

/// Backend that persists the policy catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    File,
    Sqlite,
}

impl StoreKind {
    pub fn default_path(self) -> PathBuf {
        match self {
            StoreKind::File => PathBuf::from("policies/policies.yml"),
            StoreKind::Sqlite => PathBuf::from("policies/policies.db"),
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreKind::File => write!(f, "file"),
            StoreKind::Sqlite => write!(f, "sqlite"),
        }
    }
}

impl FromStr for StoreKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "file" | "yaml" => Ok(StoreKind::File),
            "sqlite" | "db" => Ok(StoreKind::Sqlite),
            other => Err(CoreError::Config(format!(
                "unknown policy store '{}', expected 'file' or 'sqlite'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyStoreConfig {
    pub kind: StoreKind,
    pub path: PathBuf,
}

impl PolicyStoreConfig {
    fn from_env_profiled(p: &str) -> Result<Self, CoreError> {
        let kind = match profiled_env_opt(p, "SQLRISK_POLICY_STORE") {
            Some(v) => v.parse()?,
            None => StoreKind::File,
        };
        let path = profiled_env_opt(p, "SQLRISK_POLICY_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| kind.default_path());
        Ok(Self { kind, path })
    }
}
