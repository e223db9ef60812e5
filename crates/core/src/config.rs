use std::env;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TracedeckError};
use crate::window::TimeWindowKey;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub db_path: PathBuf,
    pub query_tcp_addr: String,
    pub uds_path: PathBuf,
    pub default_window: TimeWindowKey,
    pub trace_list_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
        let xdg_runtime = env::var("XDG_RUNTIME_DIR").ok();
        let data_home = env::var("XDG_DATA_HOME").ok();

        let data_root = data_home
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(home).join(".local/share"));

        let uds_path = xdg_runtime
            .map(PathBuf::from)
            .unwrap_or_else(|| data_root.join("tracedeck"))
            .join("tracedeck.sock");

        Self {
            db_path: data_root.join("tracedeck/traces.duckdb"),
            query_tcp_addr: "127.0.0.1:1901".to_string(),
            uds_path,
            default_window: TimeWindowKey::LastDay,
            trace_list_limit: 20,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut cfg = Self::default();
        let config_path = config_file_path();
        if let Some(file_overrides) = load_file_overrides(&config_path)? {
            apply_overrides(&mut cfg, file_overrides, "config file")?;
        }
        let env_overrides = load_env_overrides();
        apply_overrides(&mut cfg, env_overrides, "environment")?;
        Ok(cfg)
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigOverrides {
    db_path: Option<PathBuf>,
    query_tcp_addr: Option<String>,
    uds_path: Option<PathBuf>,
    default_window: Option<String>,
    trace_list_limit: Option<usize>,
}

fn config_file_path() -> PathBuf {
    if let Ok(path) = env::var("TRACEDECK_CONFIG") {
        return PathBuf::from(path);
    }

    let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let config_home = env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(home).join(".config"));
    config_home.join("tracedeck/config.toml")
}

fn load_file_overrides(path: &PathBuf) -> Result<Option<ConfigOverrides>> {
    if !path.exists() {
        return Ok(None);
    }

    let raw = fs::read_to_string(path)
        .map_err(|e| TracedeckError::Config(format!("failed reading {}: {e}", path.display())))?;
    let parsed: ConfigOverrides = toml::from_str(&raw)
        .map_err(|e| TracedeckError::Config(format!("failed parsing {}: {e}", path.display())))?;
    Ok(Some(parsed))
}

fn load_env_overrides() -> ConfigOverrides {
    let trace_list_limit = env::var("TRACEDECK_TRACE_LIST_LIMIT")
        .ok()
        .and_then(|v| v.parse::<usize>().ok());

    ConfigOverrides {
        db_path: env::var("TRACEDECK_DB_PATH").ok().map(PathBuf::from),
        query_tcp_addr: env::var("TRACEDECK_QUERY_TCP_ADDR").ok(),
        uds_path: env::var("TRACEDECK_QUERY_UDS_PATH").ok().map(PathBuf::from),
        default_window: env::var("TRACEDECK_DEFAULT_WINDOW").ok(),
        trace_list_limit,
    }
}

fn apply_overrides(cfg: &mut Config, overrides: ConfigOverrides, source: &str) -> Result<()> {
    if let Some(v) = overrides.db_path {
        cfg.db_path = v;
    }
    if let Some(v) = overrides.query_tcp_addr {
        cfg.query_tcp_addr = v;
    }
    if let Some(v) = overrides.uds_path {
        cfg.uds_path = v;
    }
    if let Some(v) = overrides.default_window {
        cfg.default_window = TimeWindowKey::from_str(&v).map_err(|e| {
            TracedeckError::Config(format!("bad default_window in {source}: {e} (value={v})"))
        })?;
    }
    if let Some(v) = overrides.trace_list_limit {
        cfg.trace_list_limit = v;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_window_and_addr() {
        let cfg = Config::default();
        assert_eq!(cfg.default_window, TimeWindowKey::LastDay);
        assert_eq!(cfg.query_tcp_addr, "127.0.0.1:1901");
        assert_eq!(cfg.trace_list_limit, 20);
    }

    #[test]
    fn overrides_apply_in_order() {
        let mut cfg = Config::default();
        let file = ConfigOverrides {
            default_window: Some("7d".to_string()),
            trace_list_limit: Some(50),
            ..ConfigOverrides::default()
        };
        apply_overrides(&mut cfg, file, "config file").unwrap();
        assert_eq!(cfg.default_window, TimeWindowKey::LastWeek);
        assert_eq!(cfg.trace_list_limit, 50);
    }

    #[test]
    fn bad_window_override_is_rejected() {
        let mut cfg = Config::default();
        let file = ConfigOverrides {
            default_window: Some("fortnight".to_string()),
            ..ConfigOverrides::default()
        };
        assert!(apply_overrides(&mut cfg, file, "config file").is_err());
    }
}
