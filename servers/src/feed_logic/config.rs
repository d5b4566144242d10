use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use lib_pricefeed::core::GeneratorConfig;
use lib_pricefeed::ingestors::EchoWssConfig;
use lib_pricefeed::loggers::LogOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::feed_logic::monitor::Backoff;

const DEFAULT_CONFIG_FILE: &str = "feed_server.conf";

#[derive(ValueEnum, Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// WebSocket echo endpoint.
    Wss,
    /// In-process echo, no network.
    Loopback,
}

#[derive(Parser, Deserialize, Serialize, Debug, Clone, Default)]
#[clap(about = "Ranked synthetic price feed over a WebSocket echo endpoint", version)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[clap(long, value_enum, env = "FEED_TRANSPORT", help = "Transport to run the feed over.")]
    pub transport: Option<TransportKind>,

    #[clap(long, env = "FEED_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    pub config_path: Option<PathBuf>,

    #[clap(long, env = "FEED_WS_URL", help = "WebSocket echo endpoint URL.")]
    pub ws_url: Option<String>,

    #[clap(long, env = "FEED_TICK_INTERVAL_MS", help = "Milliseconds between two generator rounds.")]
    pub tick_interval_ms: Option<u64>,

    #[clap(long, env = "FEED_MAX_MOVE_PCT", help = "Largest price move per tick, in percent.")]
    pub max_move_pct: Option<f64>,

    #[clap(long, env = "FEED_UNIVERSE_PATH", help = "JSON file with the symbol universe. Built-in set when absent.")]
    pub universe_path: Option<PathBuf>,

    #[clap(long, env = "FEED_LOG_DIR", help = "Directory for log files.")]
    pub log_dir: Option<PathBuf>,

    #[clap(long, env = "FEED_LOG_LEVEL", help = "Logging level or filter directive.")]
    pub log_level: Option<String>,

    #[clap(long, env = "FEED_LOG_JSON", help = "Write the log file as JSON lines (true/false).")]
    pub log_json: Option<bool>,

    #[clap(long, env = "FEED_RECONNECT_BASE_DELAY_MS", help = "Base delay in milliseconds for reconnect attempts.")]
    pub reconnect_base_delay_ms: Option<u64>,

    #[clap(long, env = "FEED_RECONNECT_MAX_DELAY_MS", help = "Maximum delay in milliseconds for reconnect attempts.")]
    pub reconnect_max_delay_ms: Option<u64>,

    #[clap(long, env = "FEED_WATCHDOG_SECONDS", help = "Seconds of silence before the socket is dropped. 0 disables.")]
    pub watchdog_seconds: Option<u64>,

    #[clap(long, env = "FEED_REPORT_INTERVAL_SECONDS", help = "Seconds between two ranking reports.")]
    pub report_interval_seconds: Option<u64>,

    #[clap(long, env = "FEED_REPORT_TOP", help = "Number of symbols shown in a ranking report.")]
    pub report_top: Option<usize>,

    #[clap(long, env = "FEED_OPEN_LINK", help = "A stocks://symbol/<TICKER> link to resolve at startup.")]
    pub open_link: Option<String>,
}

impl Config {
    // Merge two Config structs, where 'other' overrides 'self' for Some values
    fn merge(self, other: Config) -> Config {
        Config {
            transport: other.transport.or(self.transport),
            config_path: other.config_path.or(self.config_path),
            ws_url: other.ws_url.or(self.ws_url),
            tick_interval_ms: other.tick_interval_ms.or(self.tick_interval_ms),
            max_move_pct: other.max_move_pct.or(self.max_move_pct),
            universe_path: other.universe_path.or(self.universe_path),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            log_json: other.log_json.or(self.log_json),
            reconnect_base_delay_ms: other.reconnect_base_delay_ms.or(self.reconnect_base_delay_ms),
            reconnect_max_delay_ms: other.reconnect_max_delay_ms.or(self.reconnect_max_delay_ms),
            watchdog_seconds: other.watchdog_seconds.or(self.watchdog_seconds),
            report_interval_seconds: other.report_interval_seconds.or(self.report_interval_seconds),
            report_top: other.report_top.or(self.report_top),
            open_link: other.open_link.or(self.open_link),
        }
    }

    fn defaults() -> Config {
        Config {
            transport: Some(TransportKind::Wss),
            ws_url: Some(lib_pricefeed::ingestors::echo_wss::DEFAULT_ECHO_URL.to_string()),
            tick_interval_ms: Some(2000),
            max_move_pct: Some(5.0),
            log_dir: Some(PathBuf::from("./logs")),
            log_level: Some("info".to_string()),
            log_json: Some(true),
            reconnect_base_delay_ms: Some(1000),
            reconnect_max_delay_ms: Some(60000),
            watchdog_seconds: Some(30),
            report_interval_seconds: Some(10),
            report_top: Some(10),
            ..Default::default()
        }
    }
}

/// Fully resolved server settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub transport: TransportKind,
    pub ws_url: String,
    pub tick_interval: Duration,
    /// Fraction, not percent.
    pub max_move: f64,
    pub universe_path: Option<PathBuf>,
    pub log_dir: PathBuf,
    pub log_level: String,
    pub log_json: bool,
    pub reconnect_base_delay: Duration,
    pub reconnect_max_delay: Duration,
    pub watchdog: Option<Duration>,
    pub report_interval: Duration,
    pub report_top: usize,
    pub open_link: Option<String>,
}

impl Settings {
    pub fn generator_config(&self) -> GeneratorConfig {
        GeneratorConfig {
            interval: self.tick_interval,
            max_move: self.max_move,
            ..GeneratorConfig::default()
        }
    }

    pub fn echo_config(&self) -> EchoWssConfig {
        EchoWssConfig {
            url: self.ws_url.clone(),
            watchdog: self.watchdog,
        }
    }

    pub fn log_options(&self) -> LogOptions {
        LogOptions {
            level: self.log_level.clone(),
            log_dir: self.log_dir.clone(),
            file_prefix: "server_feed".to_string(),
            json: self.log_json,
            console: true,
        }
    }

    pub fn backoff(&self) -> Backoff {
        Backoff::new(self.reconnect_base_delay, self.reconnect_max_delay)
    }
}

fn resolve(config: Config) -> Result<Settings> {
    let tick_interval_ms = config.tick_interval_ms.unwrap_or(2000);
    if tick_interval_ms == 0 {
        bail!("tickIntervalMs must be greater than zero");
    }

    let max_move_pct = config.max_move_pct.unwrap_or(5.0);
    if !(0.0..100.0).contains(&max_move_pct) {
        bail!("maxMovePct must be within [0, 100), got {}", max_move_pct);
    }

    let base = config.reconnect_base_delay_ms.unwrap_or(1000);
    let max = config.reconnect_max_delay_ms.unwrap_or(60000);
    if base == 0 || base > max {
        bail!("reconnect delays must satisfy 0 < base ({}) <= max ({})", base, max);
    }

    let ws_url = config.ws_url.unwrap_or_default();
    let transport = config.transport.unwrap_or(TransportKind::Wss);
    if transport == TransportKind::Wss {
        url::Url::parse(&ws_url).with_context(|| format!("invalid wsUrl {:?}", ws_url))?;
    }

    Ok(Settings {
        transport,
        ws_url,
        tick_interval: Duration::from_millis(tick_interval_ms),
        max_move: max_move_pct / 100.0,
        universe_path: config.universe_path,
        log_dir: config.log_dir.unwrap_or_else(|| PathBuf::from("./logs")),
        log_level: config.log_level.unwrap_or_else(|| "info".to_string()),
        log_json: config.log_json.unwrap_or(true),
        reconnect_base_delay: Duration::from_millis(base),
        reconnect_max_delay: Duration::from_millis(max),
        watchdog: config
            .watchdog_seconds
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs),
        report_interval: Duration::from_secs(config.report_interval_seconds.unwrap_or(10).max(1)),
        report_top: config.report_top.unwrap_or(10),
        open_link: config.open_link,
    })
}

/// Defaults, then the config file, then environment and CLI arguments.
pub fn load_from(cli: Config, default_file: &Path) -> Result<Settings> {
    let config_file_path = cli
        .config_path
        .clone()
        .unwrap_or_else(|| default_file.to_path_buf());

    let mut current_config = Config::defaults();

    if config_file_path.exists() {
        let config_str = fs::read_to_string(&config_file_path)
            .with_context(|| format!("failed to read config file {}", config_file_path.display()))?;
        let file_config = serde_json::from_str::<Config>(&config_str)
            .with_context(|| format!("failed to parse config file {}", config_file_path.display()))?;
        current_config = current_config.merge(file_config);
    }

    // clap has already folded the environment into the CLI values.
    resolve(current_config.merge(cli))
}

pub fn load_config() -> Result<Settings> {
    load_from(Config::parse(), Path::new(DEFAULT_CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn cli(args: &[&str]) -> Config {
        let mut argv = vec!["server_feed"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).unwrap()
    }

    fn missing_file() -> PathBuf {
        PathBuf::from("/nonexistent/feed_server.conf")
    }

    #[test]
    fn test_defaults_apply_without_file() {
        let settings = load_from(Config::default(), &missing_file()).unwrap();
        assert_eq!(settings.transport, TransportKind::Wss);
        assert_eq!(settings.ws_url, "wss://ws.postman-echo.com/raw");
        assert_eq!(settings.tick_interval, Duration::from_secs(2));
        assert!((settings.max_move - 0.05).abs() < 1e-12);
        assert_eq!(settings.watchdog, Some(Duration::from_secs(30)));
        assert_eq!(settings.report_top, 10);
    }

    #[test]
    fn test_cli_overrides_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"tickIntervalMs": 500, "transport": "loopback", "reportTop": 3}}"#
        )
        .unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let settings = load_from(
            cli(&["--config-path", &path, "--tick-interval-ms", "250"]),
            &missing_file(),
        )
        .unwrap();

        assert_eq!(settings.tick_interval, Duration::from_millis(250));
        assert_eq!(settings.transport, TransportKind::Loopback);
        assert_eq!(settings.report_top, 3);
    }

    #[test]
    fn test_broken_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(load_from(Config::default(), file.path()).is_err());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let bad_delay = Config {
            reconnect_base_delay_ms: Some(5000),
            reconnect_max_delay_ms: Some(1000),
            ..Config::default()
        };
        assert!(load_from(bad_delay, &missing_file()).is_err());

        let bad_move = Config {
            max_move_pct: Some(150.0),
            ..Config::default()
        };
        assert!(load_from(bad_move, &missing_file()).is_err());

        let bad_url = Config {
            ws_url: Some("not a url".to_string()),
            ..Config::default()
        };
        assert!(load_from(bad_url, &missing_file()).is_err());
    }

    #[test]
    fn test_zero_watchdog_disables_it() {
        let settings = load_from(
            Config {
                watchdog_seconds: Some(0),
                ..Config::default()
            },
            &missing_file(),
        )
        .unwrap();
        assert_eq!(settings.watchdog, None);
        assert_eq!(settings.echo_config().watchdog, None);
    }
}
