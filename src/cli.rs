//! Command-line argument parsing via `clap`'s derive API, matching the
//! modernized `clap = { features = ["derive"] }` dependency the sibling
//! `RustRobotics-hebo/hebo` binary carries.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "torii", version, about = "A single-threaded MQTT v3.1.1 (QoS 0) broker with a built-in schema registry")]
pub struct Cli {
    /// Address to bind the MQTT listener on (overrides the config file).
    #[arg(long)]
    pub bind: Option<SocketAddr>,

    /// Directory of `*.proto` schema files to load at startup (overrides the config file).
    #[arg(long)]
    pub schemas: Option<PathBuf>,

    /// Optional TOML configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Raise the log level; repeatable (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn log_level(&self) -> log::LevelFilter {
        match self.verbose {
            0 => log::LevelFilter::Info,
            1 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_invocation() {
        let cli = Cli::parse_from(["torii"]);
        assert!(cli.bind.is_none());
        assert_eq!(cli.verbose, 0);
        assert_eq!(cli.log_level(), log::LevelFilter::Info);
    }

    #[test]
    fn parses_full_flag_set() {
        let cli = Cli::parse_from([
            "torii",
            "--bind",
            "127.0.0.1:1884",
            "--schemas",
            "/tmp/schemas",
            "-vv",
        ]);
        assert_eq!(cli.bind, Some("127.0.0.1:1884".parse().unwrap()));
        assert_eq!(cli.schemas, Some(PathBuf::from("/tmp/schemas")));
        assert_eq!(cli.log_level(), log::LevelFilter::Trace);
    }
}
