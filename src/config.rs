use std::collections::{BTreeSet, HashMap};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::collapse::DEFAULT_UNRAVEL_STEP;
use crate::engine::EngineSettings;
use crate::filter::FilterConfig;
use crate::sequence::{SubMode, ViewContext, ViewMode};
use crate::window::{DEFAULT_FIRST_LOAD_SIZE, DEFAULT_LOAD_MORE_STEP};

const DEFAULT_ENV_PREFIX: &str = "THREADVIEW";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub view: ViewConfig,
    #[serde(default)]
    pub filters: FiltersConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DisplayConfig {
    #[serde(default = "default_first_load_size")]
    pub first_load_size: usize,
    #[serde(default = "default_load_more_step")]
    pub load_more_step: usize,
    #[serde(default = "default_unravel_step")]
    pub unravel_step: usize,
    #[serde(default = "default_idle_budget", with = "humantime_serde")]
    pub idle_budget: Duration,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            first_load_size: default_first_load_size(),
            load_more_step: default_load_more_step(),
            unravel_step: default_unravel_step(),
            idle_budget: default_idle_budget(),
        }
    }
}

fn default_first_load_size() -> usize {
    DEFAULT_FIRST_LOAD_SIZE
}

fn default_load_more_step() -> usize {
    DEFAULT_LOAD_MORE_STEP
}

fn default_unravel_step() -> usize {
    DEFAULT_UNRAVEL_STEP
}

fn default_idle_budget() -> Duration {
    Duration::from_millis(8)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ViewConfig {
    #[serde(default)]
    pub mode: ViewMode,
    #[serde(default)]
    pub sub_mode: SubMode,
    #[serde(default)]
    pub show_cover: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct FiltersConfig {
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub excluded_notices: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogConfig {
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_log_filter() -> String {
    "info".into()
}

impl Config {
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            first_load_size: self.display.first_load_size,
            load_more_step: self.display.load_more_step,
            unravel_step: self.display.unravel_step,
        }
    }

    pub fn view_context(&self) -> ViewContext {
        ViewContext {
            mode: self.view.mode,
            sub_mode: self.view.sub_mode,
            show_cover: self.view.show_cover,
        }
    }

    pub fn filter_config(&self) -> FilterConfig {
        FilterConfig {
            categories: self.filters.categories.iter().cloned().collect::<BTreeSet<_>>(),
            excluded_notices: self
                .filters
                .excluded_notices
                .iter()
                .cloned()
                .collect::<BTreeSet<_>>(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_file: Option<PathBuf>,
    pub env_prefix: Option<String>,
}

pub fn load(options: LoadOptions) -> Result<Config> {
    let mut cfg = Config::default();

    if let Some(path) = options.config_file.as_ref() {
        if path.exists() {
            let from_file = read_config_file(path)?;
            cfg = merge_config(cfg, from_file);
        }
    } else if let Some(default_path) = default_config_path() {
        if default_path.exists() {
            let from_file = read_config_file(&default_path)?;
            cfg = merge_config(cfg, from_file);
        }
    }

    let prefix = options.env_prefix.as_deref().unwrap_or(DEFAULT_ENV_PREFIX);
    apply_env(&mut cfg, prefix);

    Ok(cfg)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&data)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
    Ok(config)
}

fn merge_config(mut base: Config, other: Config) -> Config {
    if other.display.first_load_size != 0 {
        base.display.first_load_size = other.display.first_load_size;
    }
    if other.display.load_more_step != 0 {
        base.display.load_more_step = other.display.load_more_step;
    }
    if other.display.unravel_step != 0 {
        base.display.unravel_step = other.display.unravel_step;
    }
    if !other.display.idle_budget.is_zero() {
        base.display.idle_budget = other.display.idle_budget;
    }

    if other.view != ViewConfig::default() {
        base.view = other.view;
    }

    if !other.filters.categories.is_empty() {
        base.filters.categories = other.filters.categories;
    }
    if !other.filters.excluded_notices.is_empty() {
        base.filters.excluded_notices = other.filters.excluded_notices;
    }

    if !other.log.filter.is_empty() && other.log.filter != default_log_filter() {
        base.log.filter = other.log.filter;
    }

    base
}

/// Environment layer, applied key by key so unset keys keep earlier values.
fn apply_env(cfg: &mut Config, prefix: &str) {
    let upper_prefix = format!("{}_", prefix.to_uppercase());
    let map: HashMap<String, String> = env::vars()
        .filter_map(|(key, value)| {
            let stripped = key.strip_prefix(&upper_prefix)?;
            Some((stripped.to_ascii_lowercase().replace("__", "."), value))
        })
        .collect();

    for (key, value) in map {
        apply_env_value(cfg, &key, value);
    }
}

fn apply_env_value(cfg: &mut Config, key: &str, value: String) {
    match key {
        "display.first_load_size" => {
            if let Ok(parsed) = value.parse::<usize>() {
                cfg.display.first_load_size = parsed;
            }
        }
        "display.load_more_step" => {
            if let Ok(parsed) = value.parse::<usize>() {
                cfg.display.load_more_step = parsed;
            }
        }
        "display.unravel_step" => {
            if let Ok(parsed) = value.parse::<usize>() {
                cfg.display.unravel_step = parsed;
            }
        }
        "display.idle_budget" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.display.idle_budget = duration;
            }
        }
        "view.mode" => {
            if let Ok(mode) = value.parse() {
                cfg.view.mode = mode;
            }
        }
        "view.sub_mode" => {
            if let Ok(sub_mode) = value.parse() {
                cfg.view.sub_mode = sub_mode;
            }
        }
        "view.show_cover" => {
            cfg.view.show_cover = matches!(value.as_str(), "1" | "true" | "TRUE" | "True");
        }
        "filters.categories" => cfg.filters.categories = split_list(&value),
        "filters.excluded_notices" => cfg.filters.excluded_notices = split_list(&value),
        "log.filter" => cfg.log.filter = value,
        _ => tracing::debug!(key, "config_env_key_ignored"),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

pub fn default_path() -> Option<PathBuf> {
    default_config_path()
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("threadview").join("config.yaml"))
}

/// Writes `cfg` as YAML, to the default path when `path` is `None`.
pub fn save(path: Option<PathBuf>, cfg: &Config) -> Result<PathBuf> {
    anyhow::ensure!(
        cfg.display.first_load_size > 0,
        "config: display.first_load_size must be positive"
    );
    anyhow::ensure!(
        cfg.display.load_more_step > 0,
        "config: display.load_more_step must be positive"
    );

    let path = if let Some(path) = path {
        path
    } else {
        default_config_path().context("config: unable to determine default config path")?
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("config: failed to create directory {}", parent.display()))?;
    }

    let contents = serde_yaml::to_string(cfg).context("config: failed to serialize config")?;
    fs::write(&path, contents)
        .with_context(|| format!("config: failed to write file {}", path.display()))?;

    Ok(path)
}
