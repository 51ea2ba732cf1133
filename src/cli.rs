//! CLI definitions for quicssh.

use clap::{builder::PossibleValuesParser, Parser, Subcommand};
use std::time::Duration;

/// ALPN protocol identifier negotiated by both ends of the tunnel.
pub const DEFAULT_ALPN: &str = "quicssh";

/// Default QUIC listen address of the server.
pub const DEFAULT_BIND: &str = "localhost:4242";

/// Default backend (sshd) address.
pub const DEFAULT_SSHD_ADDR: &str = "localhost:22";

/// Default UDP source address of the client.
pub const DEFAULT_LOCAL_ADDR: &str = ":0";

/// Parse a duration from a human-readable string.
fn parse_duration(s: &str) -> Result<Duration, humantime::DurationError> {
    humantime::parse_duration(s)
}

/// Client and server parts to proxy SSH (TCP) over QUIC (UDP) transport.
#[derive(Debug, Parser)]
#[command(name = "quicssh")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Log level (debug|info|warn|error)
    #[arg(long, global = true, default_value = "info", value_parser = PossibleValuesParser::new(["debug", "info", "warn", "error"]))]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Accept QUIC sessions and relay each stream to sshd
    Server(ServerArgs),

    /// Relay stdin/stdout over one QUIC stream (for SSH ProxyCommand)
    Client(ClientArgs),

    /// Show version information
    Version,
}

/// Arguments for the server subcommand.
#[derive(Debug, Clone, Parser)]
pub struct ServerArgs {
    /// bind address
    #[arg(long, default_value = DEFAULT_BIND)]
    pub bind: String,

    /// target address of sshd (host:port or txt://name)
    #[arg(long, default_value = DEFAULT_SSHD_ADDR)]
    pub sshdaddr: String,

    /// exit on idle interval (10s, 2m, 1h); 0s disables
    #[arg(long, value_parser = parse_duration, default_value = "0s")]
    pub idletimeout: Duration,
}

/// Arguments for the client subcommand.
#[derive(Debug, Clone, Parser)]
pub struct ClientArgs {
    /// address of server (host:port or txt://name)
    #[arg(long, default_value = DEFAULT_BIND)]
    pub addr: String,

    /// source address of UDP packets
    #[arg(long, default_value = DEFAULT_LOCAL_ADDR)]
    pub localaddr: String,
}

/// Build information for version command.
pub struct BuildInfo {
    pub version: &'static str,
    pub commit: &'static str,
    pub built: &'static str,
}

impl BuildInfo {
    /// Returns build information from environment variables or defaults.
    pub fn get() -> Self {
        Self {
            version: option_env!("CARGO_PKG_VERSION").unwrap_or("unknown"),
            commit: option_env!("QUICSSH_COMMIT").unwrap_or("unknown"),
            built: option_env!("QUICSSH_BUILD_DATE").unwrap_or("unknown"),
        }
    }

    /// Format version output.
    pub fn format(&self) -> String {
        format!(
            "quicssh version {}\n  commit: {}\n  built:  {}",
            self.version, self.commit, self.built
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_debug_assert() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_server_defaults() {
        let cli = Cli::try_parse_from(["quicssh", "server"]).unwrap();

        assert_eq!(cli.log_level, "info");
        match cli.command {
            Command::Server(args) => {
                assert_eq!(args.bind, DEFAULT_BIND);
                assert_eq!(args.sshdaddr, DEFAULT_SSHD_ADDR);
                assert_eq!(args.idletimeout, Duration::ZERO);
            }
            _ => panic!("Expected Server command"),
        }
    }

    #[test]
    fn test_parse_server_full() {
        let cli = Cli::try_parse_from([
            "quicssh",
            "--log-level",
            "debug",
            "server",
            "--bind",
            "0.0.0.0:4242",
            "--sshdaddr",
            "txt://sshd.example.com",
            "--idletimeout",
            "2m",
        ])
        .unwrap();

        assert_eq!(cli.log_level, "debug");
        match cli.command {
            Command::Server(args) => {
                assert_eq!(args.bind, "0.0.0.0:4242");
                assert_eq!(args.sshdaddr, "txt://sshd.example.com");
                assert_eq!(args.idletimeout, Duration::from_secs(120));
            }
            _ => panic!("Expected Server command"),
        }
    }

    #[test]
    fn test_parse_client_defaults() {
        let cli = Cli::try_parse_from(["quicssh", "client"]).unwrap();

        match cli.command {
            Command::Client(args) => {
                assert_eq!(args.addr, DEFAULT_BIND);
                assert_eq!(args.localaddr, DEFAULT_LOCAL_ADDR);
            }
            _ => panic!("Expected Client command"),
        }
    }

    #[test]
    fn test_parse_client_full() {
        let cli = Cli::try_parse_from([
            "quicssh",
            "client",
            "--addr",
            "server.example.com:4242",
            "--localaddr",
            "0.0.0.0:5000",
        ])
        .unwrap();

        match cli.command {
            Command::Client(args) => {
                assert_eq!(args.addr, "server.example.com:4242");
                assert_eq!(args.localaddr, "0.0.0.0:5000");
            }
            _ => panic!("Expected Client command"),
        }
    }

    #[test]
    fn test_parse_version() {
        let cli = Cli::try_parse_from(["quicssh", "version"]).unwrap();
        assert!(matches!(cli.command, Command::Version));
    }

    #[test]
    fn test_parse_global_log_level() {
        let cli = Cli::try_parse_from(["quicssh", "client", "--log-level", "warn"]).unwrap();
        assert_eq!(cli.log_level, "warn");
    }

    #[test]
    fn test_reject_unknown_log_level() {
        let result = Cli::try_parse_from(["quicssh", "--log-level", "trace", "server"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_duration_parsing() {
        let cli =
            Cli::try_parse_from(["quicssh", "server", "--idletimeout", "1m30s"]).unwrap();

        match cli.command {
            Command::Server(args) => assert_eq!(args.idletimeout, Duration::from_secs(90)),
            _ => panic!("Expected Server command"),
        }
    }

    #[test]
    fn test_bad_duration_names_flag() {
        let err = Cli::try_parse_from(["quicssh", "server", "--idletimeout", "soon"]).unwrap_err();
        assert!(err.to_string().contains("--idletimeout"));
    }

    #[test]
    fn test_build_info_format() {
        let info = BuildInfo {
            version: "1.0.0",
            commit: "abc1234",
            built: "2025-01-01T00:00:00Z",
        };
        let output = info.format();
        assert!(output.contains("quicssh version 1.0.0"));
        assert!(output.contains("commit: abc1234"));
        assert!(output.contains("built:  2025-01-01T00:00:00Z"));
    }
}
