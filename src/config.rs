//! Resolved runtime settings.
//!
//! Every endpoint flag is parsed, discovered and resolved here, before any
//! socket is opened, so a bad value fails fast with the flag's name.

use std::net::SocketAddr;
use std::time::Duration;

use crate::cli::{ClientArgs, ServerArgs, DEFAULT_ALPN};
use crate::common::DnsResolver;
use crate::error::Result;

/// Settings for one server run.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// UDP address the QUIC listener binds to.
    pub bind: SocketAddr,
    /// Backend TCP service dialed once per accepted stream.
    pub backend: SocketAddr,
    /// Self-shutdown after this much time without sessions; zero disables.
    pub idle_timeout: Duration,
    pub alpn: String,
}

impl ServerSettings {
    pub async fn resolve(args: &ServerArgs, resolver: &DnsResolver) -> Result<Self> {
        let bind = resolver.resolve_endpoint("--bind", &args.bind, false).await?;
        let backend = resolver
            .resolve_endpoint("--sshdaddr", &args.sshdaddr, true)
            .await?;

        Ok(Self {
            bind: bind.addr,
            backend: backend.addr,
            idle_timeout: args.idletimeout,
            alpn: DEFAULT_ALPN.to_string(),
        })
    }
}

/// Settings for one client run.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Server QUIC address.
    pub server: SocketAddr,
    /// Name presented for SNI.
    pub server_name: String,
    /// Local UDP source address.
    pub local: SocketAddr,
    pub alpn: String,
}

impl ClientSettings {
    pub async fn resolve(args: &ClientArgs, resolver: &DnsResolver) -> Result<Self> {
        let server = resolver.resolve_endpoint("--addr", &args.addr, true).await?;
        let local = resolver
            .resolve_endpoint("--localaddr", &args.localaddr, false)
            .await?;

        // A wildcard source must match the server's address family.
        let local_addr = match (server.addr, local.addr) {
            (SocketAddr::V6(_), SocketAddr::V4(v4)) if v4.ip().is_unspecified() => {
                SocketAddr::new(std::net::Ipv6Addr::UNSPECIFIED.into(), v4.port())
            }
            (_, addr) => addr,
        };

        Ok(Self {
            server: server.addr,
            server_name: server.host,
            local: local_addr,
            alpn: DEFAULT_ALPN.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn server_args(bind: &str, sshdaddr: &str) -> ServerArgs {
        ServerArgs {
            bind: bind.to_string(),
            sshdaddr: sshdaddr.to_string(),
            idletimeout: Duration::from_secs(30),
        }
    }

    fn client_args(addr: &str, localaddr: &str) -> ClientArgs {
        ClientArgs {
            addr: addr.to_string(),
            localaddr: localaddr.to_string(),
        }
    }

    #[tokio::test]
    async fn test_server_settings_resolve() {
        let settings = ServerSettings::resolve(
            &server_args("127.0.0.1:4242", "127.0.0.1:22"),
            &DnsResolver::new(),
        )
        .await
        .unwrap();

        assert_eq!(settings.bind, "127.0.0.1:4242".parse().unwrap());
        assert_eq!(settings.backend, "127.0.0.1:22".parse().unwrap());
        assert_eq!(settings.idle_timeout, Duration::from_secs(30));
        assert_eq!(settings.alpn, DEFAULT_ALPN);
    }

    #[tokio::test]
    async fn test_server_settings_name_bad_field() {
        let resolver = DnsResolver::new();

        let err = ServerSettings::resolve(&server_args("x:x", "127.0.0.1:22"), &resolver)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidAddress { field: "--bind", .. }));

        let err = ServerSettings::resolve(&server_args("127.0.0.1:4242", "x:x"), &resolver)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidAddress { field: "--sshdaddr", .. }));
    }

    #[tokio::test]
    async fn test_client_settings_resolve() {
        let settings =
            ClientSettings::resolve(&client_args("127.0.0.1:4242", ":0"), &DnsResolver::new())
                .await
                .unwrap();

        assert_eq!(settings.server, "127.0.0.1:4242".parse().unwrap());
        assert_eq!(settings.server_name, "127.0.0.1");
        assert_eq!(settings.local, "0.0.0.0:0".parse().unwrap());
    }

    #[tokio::test]
    async fn test_client_settings_wildcard_follows_ipv6_server() {
        let settings =
            ClientSettings::resolve(&client_args("[::1]:4242", ":0"), &DnsResolver::new())
                .await
                .unwrap();

        assert!(settings.local.is_ipv6());
        assert!(settings.local.ip().is_unspecified());
    }

    #[tokio::test]
    async fn test_client_settings_name_bad_field() {
        let resolver = DnsResolver::new();

        let err = ClientSettings::resolve(&client_args("x:x", ":0"), &resolver)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("--addr"));

        let err = ClientSettings::resolve(&client_args("127.0.0.1:4242", "x:x"), &resolver)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("--localaddr"));
    }
}
