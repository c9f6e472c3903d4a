use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::downloader::extractors::ExtractorConfig;
use crate::downloader::relay::RelayConfig;

const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_address: SocketAddr,
    /// Reported by the health endpoint (`development`, `production`, ...)
    pub environment: String,
    pub scratch_dir: PathBuf,
    /// Explicit yt-dlp binary; otherwise common install paths and PATH are tried
    pub ytdlp_path: Option<PathBuf>,
    pub metadata_timeout: Duration,
    pub tool_timeout: Duration,
    /// TCP connect bound for the shared HTTP client (scrape and proxy)
    pub connect_timeout: Duration,
    pub stall_timeout: Duration,
    pub sweep_interval: Duration,
    pub temp_max_age: Duration,
    pub min_output_bytes: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            environment: "development".to_string(),
            scratch_dir: default_scratch_dir(),
            ytdlp_path: None,
            metadata_timeout: Duration::from_secs(5),
            tool_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            stall_timeout: Duration::from_secs(15),
            sweep_interval: Duration::from_secs(3600),
            temp_max_age: Duration::from_secs(3600),
            min_output_bytes: 1,
        }
    }
}

fn default_scratch_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("yt-audio-relay")
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults, malformed ones are errors
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let bind_address = match lookup("BIND_ADDRESS") {
            Some(addr) => addr
                .parse()
                .with_context(|| format!("invalid BIND_ADDRESS: {}", addr))?,
            None => {
                let port = parse_var(&lookup, "PORT")?.unwrap_or(DEFAULT_PORT);
                SocketAddr::from(([0, 0, 0, 0], port))
            }
        };

        let secs = |key: &str, default: Duration| -> Result<Duration> {
            Ok(parse_var::<u64, _>(&lookup, key)?
                .map(Duration::from_secs)
                .unwrap_or(default))
        };

        Ok(Self {
            bind_address,
            environment: lookup("APP_ENV").unwrap_or(defaults.environment),
            scratch_dir: lookup("SCRATCH_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.scratch_dir),
            ytdlp_path: lookup("YTDLP_PATH").map(PathBuf::from),
            metadata_timeout: secs("METADATA_TIMEOUT_SECS", defaults.metadata_timeout)?,
            tool_timeout: secs("TOOL_TIMEOUT_SECS", defaults.tool_timeout)?,
            connect_timeout: secs("CONNECT_TIMEOUT_SECS", defaults.connect_timeout)?,
            stall_timeout: secs("STALL_TIMEOUT_SECS", defaults.stall_timeout)?,
            sweep_interval: secs("SWEEP_INTERVAL_SECS", defaults.sweep_interval)?,
            temp_max_age: secs("TEMP_MAX_AGE_SECS", defaults.temp_max_age)?,
            min_output_bytes: parse_var(&lookup, "MIN_OUTPUT_BYTES")?
                .unwrap_or(defaults.min_output_bytes),
        })
    }

    /// Command-line flags win over the environment
    pub fn apply(mut self, cli: &Cli) -> Self {
        if let Some(bind) = cli.bind {
            self.bind_address = bind;
        }
        if let Some(dir) = &cli.scratch_dir {
            self.scratch_dir = dir.clone();
        }
        if let Some(path) = &cli.ytdlp {
            self.ytdlp_path = Some(path.clone());
        }
        self
    }

    pub fn extractor_config(&self) -> ExtractorConfig {
        ExtractorConfig::default()
            .with_metadata_timeout(self.metadata_timeout)
            .with_tool_timeout(self.tool_timeout)
    }

    pub fn http_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .build()
            .context("building HTTP client")
    }

    pub fn relay_config(&self, ytdlp_path: PathBuf) -> RelayConfig {
        RelayConfig::new(ytdlp_path, self.scratch_dir.clone())
            .with_stall_timeout(self.stall_timeout)
            .with_min_output_bytes(self.min_output_bytes)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("invalid {}: {}", key, raw))
        })
        .transpose()
}

#[derive(Debug, Default, Parser)]
#[command(name = "yt-audio-relay", version, about = "Streams the audio track of a YouTube video over HTTP")]
pub struct Cli {
    /// Address to listen on, e.g. 127.0.0.1:8080
    #[arg(long)]
    pub bind: Option<SocketAddr>,

    /// Directory for temporary audio files
    #[arg(long)]
    pub scratch_dir: Option<PathBuf>,

    /// Path to the yt-dlp binary
    #[arg(long)]
    pub ytdlp: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.bind_address.port(), 3000);
        assert_eq!(config.environment, "development");
        assert_eq!(config.metadata_timeout, Duration::from_secs(5));
        assert_eq!(config.tool_timeout, Duration::from_secs(30));
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.stall_timeout, Duration::from_secs(15));
        assert_eq!(config.temp_max_age, Duration::from_secs(3600));
        assert_eq!(config.min_output_bytes, 1);
        assert!(config.scratch_dir.ends_with("yt-audio-relay"));
    }

    #[test]
    fn test_env_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("PORT", "8080"),
            ("APP_ENV", "production"),
            ("STALL_TIMEOUT_SECS", "30"),
            ("CONNECT_TIMEOUT_SECS", "2"),
            ("TOOL_TIMEOUT_SECS", "90"),
            ("YTDLP_PATH", "/opt/yt-dlp"),
        ]))
        .unwrap();
        assert_eq!(config.connect_timeout, Duration::from_secs(2));
        assert_eq!(config.tool_timeout, Duration::from_secs(90));
        assert!(config.http_client().is_ok());
        assert_eq!(config.bind_address, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.environment, "production");
        assert_eq!(config.stall_timeout, Duration::from_secs(30));
        assert_eq!(config.ytdlp_path, Some(PathBuf::from("/opt/yt-dlp")));
    }

    #[test]
    fn test_bind_address_wins_over_port() {
        let config = AppConfig::from_lookup(lookup(&[
            ("PORT", "8080"),
            ("BIND_ADDRESS", "127.0.0.1:9000"),
        ]))
        .unwrap();
        assert_eq!(config.bind_address, "127.0.0.1:9000".parse().unwrap());
    }

    #[test]
    fn test_malformed_value_is_error() {
        let err = AppConfig::from_lookup(lookup(&[("PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn test_cli_overrides_env() {
        let cli = Cli::parse_from(["yt-audio-relay", "--bind", "127.0.0.1:4000", "--ytdlp", "/bin/yt"]);
        let config = AppConfig::from_lookup(lookup(&[("PORT", "8080")])).unwrap().apply(&cli);
        assert_eq!(config.bind_address, "127.0.0.1:4000".parse().unwrap());
        assert_eq!(config.ytdlp_path, Some(PathBuf::from("/bin/yt")));
    }
}
