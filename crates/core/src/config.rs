use std::env;

use serde::{Deserialize, Serialize};

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

fn profiled_env_parse<T: std::str::FromStr>(profile: &str, key: &str, default: T) -> T {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub analysis: AnalysisConfig,
    pub transport: TransportConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `LOGDIFF_PROFILE`. When set (e.g. `PROD`), every
    /// key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("LOGDIFF_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            analysis: AnalysisConfig::from_env_profiled(p),
            transport: TransportConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  analysis:   cluster_limit={}, direction={:?}, diff_band=({}, {})",
            self.analysis.cluster_limit,
            self.analysis.direction,
            self.analysis.diff_band.0,
            self.analysis.diff_band.1
        );
        tracing::info!(
            "  transport:  max_attempts={}, timeout={}s, auth={}",
            self.transport.max_attempts,
            self.transport.timeout_secs,
            if self.transport.auth_token.is_some() { "set" } else { "(none)" }
        );
    }
}

// ── Analysis ──────────────────────────────────────────────────

/// Which deviation direction counts as anomalous for frequency checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Only counts above the baseline are anomalous (flag 0).
    Higher,
    /// Only counts below the baseline are anomalous (flag 1).
    Lower,
    /// Deviation in either direction is anomalous (any other flag).
    Both,
}

impl Direction {
    pub fn from_flag(flag: i64) -> Self {
        match flag {
            0 => Direction::Higher,
            1 => Direction::Lower,
            _ => Direction::Both,
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "higher" | "0" => Ok(Direction::Higher),
            "lower" | "1" => Ok(Direction::Lower),
            "both" | "2" => Ok(Direction::Both),
            other => Err(format!("unknown direction: {}", other)),
        }
    }
}

/// Document-frequency pruning applied before vectorizing texts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureFilter {
    /// Drop terms appearing in fewer documents than this.
    pub min_df: usize,
    /// Drop terms appearing in more than this fraction of documents.
    pub max_df: f64,
}

impl FeatureFilter {
    /// Filter used for the retry after the first attempt leaves no terms.
    pub fn relaxed() -> Self {
        Self {
            min_df: 1,
            max_df: 1.0,
        }
    }
}

impl Default for FeatureFilter {
    fn default() -> Self {
        Self {
            min_df: 1,
            max_df: 0.95,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Above this many distinct control labels the run is skipped.
    #[serde(default = "default_cluster_limit")]
    pub cluster_limit: usize,
    /// Relative threshold given to the zero-deviation classifier.
    #[serde(default = "default_zero_deviation_threshold")]
    pub zero_deviation_threshold: f64,
    #[serde(default = "default_direction")]
    pub direction: Direction,
    /// Exclusive similarity band in which a diff is attached.
    #[serde(default = "default_diff_band")]
    pub diff_band: (f64, f64),
    #[serde(default)]
    pub feature_filter: FeatureFilter,
    /// Minimum cosine similarity for a test text to match a control cluster.
    #[serde(default = "default_match_threshold")]
    pub match_threshold: f64,
    /// Number of tags kept per cluster.
    #[serde(default = "default_max_tags")]
    pub max_tags: usize,
}

fn default_cluster_limit() -> usize { 500 }
fn default_zero_deviation_threshold() -> f64 { 0.25 }
fn default_direction() -> Direction { Direction::Higher }
fn default_diff_band() -> (f64, f64) { (0.5, 0.9) }
fn default_match_threshold() -> f64 { 0.7 }
fn default_max_tags() -> usize { 5 }

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            cluster_limit: default_cluster_limit(),
            zero_deviation_threshold: default_zero_deviation_threshold(),
            direction: default_direction(),
            diff_band: default_diff_band(),
            feature_filter: FeatureFilter::default(),
            match_threshold: default_match_threshold(),
            max_tags: default_max_tags(),
        }
    }
}

impl AnalysisConfig {
    fn from_env_profiled(p: &str) -> Self {
        let defaults = Self::default();
        Self {
            cluster_limit: profiled_env_parse(p, "CLUSTER_LIMIT", defaults.cluster_limit),
            zero_deviation_threshold: profiled_env_parse(
                p,
                "ZERO_DEVIATION_THRESHOLD",
                defaults.zero_deviation_threshold,
            ),
            direction: profiled_env_parse(p, "FREQUENCY_DIRECTION", defaults.direction),
            diff_band: (
                profiled_env_parse(p, "DIFF_BAND_LOW", defaults.diff_band.0),
                profiled_env_parse(p, "DIFF_BAND_HIGH", defaults.diff_band.1),
            ),
            feature_filter: FeatureFilter {
                min_df: profiled_env_parse(p, "MIN_DF", defaults.feature_filter.min_df),
                max_df: profiled_env_parse(p, "MAX_DF", defaults.feature_filter.max_df),
            },
            match_threshold: profiled_env_parse(p, "MATCH_THRESHOLD", defaults.match_threshold),
            max_tags: profiled_env_parse(p, "MAX_TAGS", defaults.max_tags),
        }
    }
}

// ── Transport ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    pub auth_token: Option<String>,
    /// Total attempts per request, including the first.
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub timeout_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            auth_token: None,
            max_attempts: 3,
            initial_backoff_ms: 1000,
            timeout_secs: 30,
        }
    }
}

impl TransportConfig {
    fn from_env_profiled(p: &str) -> Self {
        let defaults = Self::default();
        Self {
            auth_token: profiled_env_opt(p, "AUTH_TOKEN"),
            max_attempts: profiled_env_parse(p, "HTTP_MAX_ATTEMPTS", defaults.max_attempts),
            initial_backoff_ms: profiled_env_parse(
                p,
                "HTTP_BACKOFF_MS",
                defaults.initial_backoff_ms,
            ),
            timeout_secs: profiled_env_parse(p, "HTTP_TIMEOUT_SECS", defaults.timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analysis_defaults() {
        let config = AnalysisConfig::default();
        assert_eq!(config.cluster_limit, 500);
        assert_eq!(config.zero_deviation_threshold, 0.25);
        assert_eq!(config.direction, Direction::Higher);
        assert_eq!(config.diff_band, (0.5, 0.9));
        assert_eq!(config.max_tags, 5);
    }

    #[test]
    fn analysis_config_fills_missing_fields() {
        let config: AnalysisConfig = serde_json::from_str(r#"{"cluster_limit": 20}"#).unwrap();
        assert_eq!(config.cluster_limit, 20);
        assert_eq!(config.feature_filter, FeatureFilter::default());
        assert_eq!(config.direction, Direction::Higher);
    }

    #[test]
    fn direction_from_flag() {
        assert_eq!(Direction::from_flag(0), Direction::Higher);
        assert_eq!(Direction::from_flag(1), Direction::Lower);
        assert_eq!(Direction::from_flag(2), Direction::Both);
        assert_eq!(Direction::from_flag(-3), Direction::Both);
        assert_eq!("BOTH".parse::<Direction>().unwrap(), Direction::Both);
        assert!("sideways".parse::<Direction>().is_err());
    }

    #[test]
    fn relaxed_filter_keeps_everything() {
        let relaxed = FeatureFilter::relaxed();
        assert_eq!(relaxed.min_df, 1);
        assert_eq!(relaxed.max_df, 1.0);
    }

    #[test]
    fn profile_label_defaults() {
        let config = Config::default();
        assert_eq!(config.profile_label(), "default");
        assert_eq!(config.transport.max_attempts, 3);
    }
}
