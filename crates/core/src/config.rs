use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LogdockError, Result};

pub const DEFAULT_RETENTION_CAP: usize = 1000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub data_path: PathBuf,
    pub http_addr: String,
    pub query_tcp_addr: String,
    pub uds_path: PathBuf,
    pub retention_cap: usize,
    pub channel_capacity: usize,
    pub broadcast_capacity: usize,
    pub ws_ping_interval: Duration,
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
            .unwrap_or_else(|| data_root.join("logdock"))
            .join("logdock.sock");

        Self {
            data_path: data_root.join("logdock/logs.json"),
            http_addr: "127.0.0.1:3001".to_string(),
            query_tcp_addr: "127.0.0.1:3002".to_string(),
            uds_path,
            retention_cap: DEFAULT_RETENTION_CAP,
            channel_capacity: 256,
            broadcast_capacity: 1024,
            ws_ping_interval: Duration::from_secs(30),
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
        let env_overrides = load_env_overrides()?;
        apply_overrides(&mut cfg, env_overrides, "environment")?;
        Ok(cfg)
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigOverrides {
    data_path: Option<PathBuf>,
    http_addr: Option<String>,
    query_tcp_addr: Option<String>,
    uds_path: Option<PathBuf>,
    retention_cap: Option<usize>,
    channel_capacity: Option<usize>,
    broadcast_capacity: Option<usize>,
    ws_ping_interval: Option<String>,
}

fn config_file_path() -> PathBuf {
    if let Ok(path) = env::var("LOGDOCK_CONFIG") {
        return PathBuf::from(path);
    }

    let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let config_home = env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(home).join(".config"));
    config_home.join("logdock/config.toml")
}

fn load_file_overrides(path: &PathBuf) -> Result<Option<ConfigOverrides>> {
    if !path.exists() {
        return Ok(None);
    }

    let raw = fs::read_to_string(path)
        .map_err(|e| LogdockError::Config(format!("failed reading {}: {e}", path.display())))?;
    let parsed: ConfigOverrides = toml::from_str(&raw)
        .map_err(|e| LogdockError::Config(format!("failed parsing {}: {e}", path.display())))?;
    Ok(Some(parsed))
}

fn load_env_overrides() -> Result<ConfigOverrides> {
    let retention_cap = match env::var("LOGDOCK_RETENTION_CAP") {
        Ok(v) => Some(v.parse::<usize>().map_err(|e| {
            LogdockError::Config(format!("bad LOGDOCK_RETENTION_CAP in environment: {e}"))
        })?),
        Err(_) => None,
    };

    Ok(ConfigOverrides {
        data_path: env::var("LOGDOCK_DATA_PATH").ok().map(PathBuf::from),
        http_addr: env::var("LOGDOCK_HTTP_ADDR").ok(),
        query_tcp_addr: env::var("LOGDOCK_QUERY_TCP_ADDR").ok(),
        uds_path: env::var("LOGDOCK_QUERY_UDS_PATH").ok().map(PathBuf::from),
        retention_cap,
        channel_capacity: None,
        broadcast_capacity: None,
        ws_ping_interval: env::var("LOGDOCK_WS_PING_INTERVAL").ok(),
    })
}

fn apply_overrides(cfg: &mut Config, overrides: ConfigOverrides, source: &str) -> Result<()> {
    if let Some(v) = overrides.data_path {
        cfg.data_path = v;
    }
    if let Some(v) = overrides.http_addr {
        cfg.http_addr = v;
    }
    if let Some(v) = overrides.query_tcp_addr {
        cfg.query_tcp_addr = v;
    }
    if let Some(v) = overrides.uds_path {
        cfg.uds_path = v;
    }
    if let Some(v) = overrides.retention_cap {
        if v == 0 {
            return Err(LogdockError::Config(format!(
                "bad retention_cap in {source}: must be at least 1"
            )));
        }
        cfg.retention_cap = v;
    }
    if let Some(v) = overrides.channel_capacity {
        cfg.channel_capacity = v.max(1);
    }
    if let Some(v) = overrides.broadcast_capacity {
        cfg.broadcast_capacity = v.max(1);
    }
    if let Some(v) = overrides.ws_ping_interval {
        cfg.ws_ping_interval = humantime::parse_duration(&v).map_err(|e| {
            LogdockError::Config(format!("bad ws_ping_interval in {source}: {e} (value={v})"))
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_has_expected_addrs() {
        let cfg = Config::default();
        assert_eq!(cfg.http_addr, "127.0.0.1:3001");
        assert_eq!(cfg.query_tcp_addr, "127.0.0.1:3002");
        assert!(cfg.data_path.ends_with("logdock/logs.json"));
    }

    #[test]
    fn default_retention_cap_is_one_thousand() {
        assert_eq!(Config::default().retention_cap, 1000);
    }

    #[test]
    fn file_overrides_parse_from_toml() {
        let parsed: ConfigOverrides = toml::from_str(
            r#"
            data_path = "/tmp/logdock/logs.json"
            retention_cap = 50
            ws_ping_interval = "5s"
            "#,
        )
        .unwrap();

        let mut cfg = Config::default();
        apply_overrides(&mut cfg, parsed, "config file").unwrap();
        assert_eq!(cfg.data_path, PathBuf::from("/tmp/logdock/logs.json"));
        assert_eq!(cfg.retention_cap, 50);
        assert_eq!(cfg.ws_ping_interval, Duration::from_secs(5));
    }

    #[test]
    fn rejects_zero_retention_cap() {
        let mut cfg = Config::default();
        let err = apply_overrides(
            &mut cfg,
            ConfigOverrides {
                retention_cap: Some(0),
                ..ConfigOverrides::default()
            },
            "environment",
        )
        .unwrap_err();
        assert!(err.to_string().contains("retention_cap"));
    }

    #[test]
    fn rejects_bad_ping_interval() {
        let mut cfg = Config::default();
        let res = apply_overrides(
            &mut cfg,
            ConfigOverrides {
                ws_ping_interval: Some("often".to_string()),
                ..ConfigOverrides::default()
            },
            "config file",
        );
        assert!(res.is_err());
    }
}
