use anyhow::{bail, Result};
use clap::Parser;
use lib_adcp::core::builders::EpochZone;
use lib_adcp::core::hub::{HubConfig, DEFAULT_OUTBOUND_CAPACITY};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_FILE: &str = "server_adcp.conf";
const DEFAULT_LOG_KEEP_FILES: usize = 1;

#[derive(Parser, Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[command(about = "ADCP live display hub", version)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[arg(long, env = "ADCP_PORT", help = "Port to listen on for displays and instruments.")]
    pub port: Option<u16>,

    #[arg(long, env = "ADCP_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    pub config_path: Option<PathBuf>,

    #[arg(long, env = "ADCP_LOG_DIR", help = "Directory for log files.")]
    pub log_dir: Option<PathBuf>,

    #[arg(long, env = "ADCP_LOG_LEVEL", help = "Logging level (trace, debug, info, warn, error).")]
    pub log_level: Option<String>,

    #[arg(long, env = "ADCP_LOG_KEEP_FILES", help = "Earlier log files kept at startup.")]
    pub log_keep_files: Option<usize>,

    #[arg(long, env = "ADCP_OUTBOUND_QUEUE_CAPACITY", help = "Payloads a display may have queued before it is dropped.")]
    pub outbound_queue_capacity: Option<usize>,

    #[arg(long, env = "ADCP_TIME_ZONE", help = "IANA zone for ensemble timestamps. Defaults to the host zone.")]
    pub time_zone: Option<String>,

    #[arg(long, env = "ADCP_TLS_CERT_PATH", help = "Path to the TLS certificate file.")]
    pub tls_cert_path: Option<PathBuf>,

    #[arg(long, env = "ADCP_TLS_KEY_PATH", help = "Path to the TLS private key file.")]
    pub tls_key_path: Option<PathBuf>,
}

/// Fully resolved server settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub port: u16,
    pub log_dir: PathBuf,
    pub log_level: String,
    pub log_keep_files: usize,
    pub hub: HubConfig,
    /// Certificate and key, when TLS is enabled.
    pub tls: Option<(PathBuf, PathBuf)>,
}

impl Config {
    // Merge two Config structs, where 'other' overrides 'self' for Some values
    fn merge(self, other: Config) -> Config {
        Config {
            port: other.port.or(self.port),
            config_path: other.config_path.or(self.config_path),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            log_keep_files: other.log_keep_files.or(self.log_keep_files),
            outbound_queue_capacity: other.outbound_queue_capacity.or(self.outbound_queue_capacity),
            time_zone: other.time_zone.or(self.time_zone),
            tls_cert_path: other.tls_cert_path.or(self.tls_cert_path),
            tls_key_path: other.tls_key_path.or(self.tls_key_path),
        }
    }

    fn defaults() -> Config {
        Config {
            port: Some(8080),
            log_dir: Some(PathBuf::from("./logs")),
            log_level: Some("info".to_string()),
            log_keep_files: Some(DEFAULT_LOG_KEEP_FILES),
            outbound_queue_capacity: Some(DEFAULT_OUTBOUND_CAPACITY),
            ..Default::default()
        }
    }

    /// Resolves every option to a concrete value and validates it.
    pub fn into_settings(self) -> Result<Settings> {
        let merged = Config::defaults().merge(self);

        let outbound_capacity = merged.outbound_queue_capacity.unwrap_or(DEFAULT_OUTBOUND_CAPACITY);
        if outbound_capacity == 0 {
            bail!("outboundQueueCapacity must be at least 1");
        }

        let epoch_zone = EpochZone::from_name(merged.time_zone.as_deref()).map_err(anyhow::Error::msg)?;

        let tls = match (merged.tls_cert_path, merged.tls_key_path) {
            (Some(cert), Some(key)) => Some((cert, key)),
            (None, None) => None,
            _ => bail!("tlsCertPath and tlsKeyPath must be set together"),
        };

        Ok(Settings {
            port: merged.port.unwrap_or(8080),
            log_dir: merged.log_dir.unwrap_or_else(|| PathBuf::from("./logs")),
            log_level: merged.log_level.unwrap_or_else(|| "info".to_string()),
            log_keep_files: merged.log_keep_files.unwrap_or(DEFAULT_LOG_KEEP_FILES),
            hub: HubConfig { outbound_capacity, epoch_zone },
            tls,
        })
    }
}

/// Defaults, then `server_adcp.conf` (or `--config-path`), then environment and CLI.
pub fn load_config() -> Config {
    load_config_from(Config::parse())
}

pub fn load_config_from(cli: Config) -> Config {
    let config_file_path = cli
        .config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    let mut current_config = Config::defaults();
    if let Some(file_config) = read_config_file(&config_file_path) {
        current_config = current_config.merge(file_config);
    }

    // clap already folded environment variables into the CLI values.
    current_config.merge(cli)
}

// Logging is not installed yet while the config is loaded, so problems go to stderr.
fn read_config_file(path: &Path) -> Option<Config> {
    if !path.exists() {
        return None;
    }
    match fs::read_to_string(path) {
        Ok(config_str) => match serde_json::from_str::<Config>(&config_str) {
            Ok(file_config) => Some(file_config),
            Err(e) => {
                eprintln!("Failed to parse config file {}: {}. Falling back to other sources.", path.display(), e);
                None
            }
        },
        Err(e) => {
            eprintln!("Failed to read config file {}: {}. Falling back to other sources.", path.display(), e);
            None
        }
    }
}
