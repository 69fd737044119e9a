//! Command line options

use std::path::PathBuf;

use clap::Parser;

use crate::config::AppConfig;

/// `beatblink` server options
#[derive(Parser, Debug, Clone)]
#[command(
    name = "beatblink",
    about = "Beat & Blink real-time audio / level broadcast server",
    version
)]
pub struct ServerOpts {
    /// TOML configuration file
    #[arg(long, short, env = "BEATBLINK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Bind host (overrides the config file)
    #[arg(long, env = "BEATBLINK_HOST")]
    pub host: Option<String>,

    /// Bind port (overrides the config file)
    #[arg(long, short, env = "BEATBLINK_PORT")]
    pub port: Option<u16>,

    /// Log level: trace, debug, info, warn, error
    #[arg(long)]
    pub log_level: Option<String>,

    /// Also write logs to the log directory
    #[arg(long)]
    pub log_file: bool,

    /// Start new connections paused instead of streaming
    #[arg(long)]
    pub no_autoplay: bool,
}

impl ServerOpts {
    /// Apply command line overrides on top of the file configuration
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if self.log_file {
            config.logging.file_output = true;
        }
        if self.no_autoplay {
            config.hub.autoplay = false;
        }
    }
}

/// `beatblink-monitor` options
#[derive(Parser, Debug, Clone)]
#[command(
    name = "beatblink-monitor",
    about = "Terminal client that follows a Beat & Blink server",
    version
)]
pub struct MonitorOpts {
    /// WebSocket URL of the server
    #[arg(long, env = "BEATBLINK_URL", default_value = "ws://127.0.0.1:3001/ws")]
    pub url: String,

    /// Reconnect attempts before giving up (0 = forever)
    #[arg(long, default_value_t = 10)]
    pub max_attempts: u32,

    /// Log level: trace, debug, info, warn, error
    #[arg(long, default_value = "warn")]
    pub log_level: String,

    /// Print every audio frame instead of level changes only
    #[arg(long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_overrides() {
        let opts = ServerOpts::try_parse_from([
            "beatblink",
            "--host",
            "0.0.0.0",
            "--port",
            "4001",
            "--log-level",
            "debug",
            "--no-autoplay",
        ])
        .unwrap();

        let mut config = AppConfig::default();
        opts.apply(&mut config);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 4001);
        assert_eq!(config.logging.level, "debug");
        assert!(!config.hub.autoplay);
        assert!(!config.logging.file_output);
    }

    #[test]
    fn test_server_no_overrides() {
        let opts = ServerOpts::try_parse_from(["beatblink"]).unwrap();
        let mut config = AppConfig::default();
        opts.apply(&mut config);
        assert_eq!(config.server.port, 3001);
        assert!(config.hub.autoplay);
    }

    #[test]
    fn test_bad_port() {
        assert!(ServerOpts::try_parse_from(["beatblink", "--port", "99999"]).is_err());
    }

    #[test]
    fn test_monitor_defaults() {
        let opts = MonitorOpts::try_parse_from(["beatblink-monitor"]).unwrap();
        assert_eq!(opts.url, "ws://127.0.0.1:3001/ws");
        assert_eq!(opts.max_attempts, 10);
        assert!(!opts.verbose);
    }
}
