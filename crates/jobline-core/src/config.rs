use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "jobline.toml";
pub const DEFAULT_ROOT_LABEL: &str = "root";
/// Env var naming an explicit config file path.
pub const CONFIG_PATH_ENV: &str = "JOBLINE_CONFIG";

/// Top-level config (jobline.toml + JOBLINE_* env overrides).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JoblineConfig {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// Tuning for a scheduler tree. Children inherit the config of their parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Label of the root scheduler in log lines; children log as `parent/name`.
    #[serde(default = "default_root_label")]
    pub root_label: String,
    /// Yield to the runtime between jobs so sibling groups get a turn on a
    /// current-thread runtime.
    /// Override with env var: JOBLINE_SCHEDULER__YIELD_BETWEEN_JOBS=false
    #[serde(default = "bool_true")]
    pub yield_between_jobs: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            root_label: default_root_label(),
            yield_between_jobs: true,
        }
    }
}

fn default_root_label() -> String {
    DEFAULT_ROOT_LABEL.to_string()
}

fn bool_true() -> bool {
    true
}

impl JoblineConfig {
    /// Load config from a TOML file with JOBLINE_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. $JOBLINE_CONFIG
    ///   3. ./jobline.toml
    ///
    /// A missing file is not an error: defaults apply. Nested keys use `__`
    /// in env var names because field names themselves contain `_`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .or_else(|| std::env::var(CONFIG_PATH_ENV).ok())
            .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());

        tracing::debug!(%path, "loading jobline config");

        let config: JoblineConfig = Figment::from(Serialized::defaults(JoblineConfig::default()))
            .merge(Toml::file(&path))
            .merge(Env::prefixed("JOBLINE_").ignore(&["config"]).split("__"))
            .extract()
            .map_err(|e| crate::error::JoblineError::Config(e.to_string()))?;

        Ok(config)
    }
}
