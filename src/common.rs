//! Common types and functions shared by the client and server modules.

use crate::error::{Error, Result};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Buffer size of one copy pump read.
pub const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Endpoint prefix that triggers TXT record discovery.
pub const TXT_SCHEME: &str = "txt://";

/// An endpoint after discovery and name resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEndpoint {
    /// Concrete socket address.
    pub addr: SocketAddr,
    /// Host part as written (or as discovered), used for SNI.
    pub host: String,
}

/// Splits `host:port`, `[v6]:port` or `:port` into its parts.
///
/// An empty host is returned as-is and means "any interface".
pub fn split_host_port(endpoint: &str) -> std::result::Result<(String, u16), String> {
    let Some(colon_pos) = endpoint.rfind(':') else {
        return Err("missing port".to_string());
    };
    let host_part = &endpoint[..colon_pos];
    let port_part = &endpoint[colon_pos + 1..];

    let host = if host_part.starts_with('[') && host_part.ends_with(']') {
        &host_part[1..host_part.len() - 1]
    } else if host_part.contains(':') {
        return Err("IPv6 hosts must be enclosed in brackets".to_string());
    } else {
        host_part
    };

    let port: u16 = port_part
        .parse()
        .map_err(|_| format!("invalid port '{}'", port_part))?;

    Ok((host.to_string(), port))
}

/// Shared resolver for endpoint flags.
///
/// Host names go through the system resolver, so hosts files are honoured.
/// TXT discovery uses hickory-resolver, built on first use and reused.
pub struct DnsResolver {
    txt_resolver: Arc<
        Mutex<Option<hickory_resolver::Resolver<hickory_resolver::name_server::TokioConnectionProvider>>>,
    >,
}

impl DnsResolver {
    /// Creates a new DNS resolver.
    pub fn new() -> Self {
        Self {
            txt_resolver: Arc::new(Mutex::new(None)),
        }
    }

    /// Resolves an endpoint flag value.
    ///
    /// With `discovery` set, a `txt://name[:port]` value is first replaced by
    /// the first TXT record of `name`. Errors name `field`.
    pub async fn resolve_endpoint(
        &self,
        field: &'static str,
        value: &str,
        discovery: bool,
    ) -> Result<ResolvedEndpoint> {
        let endpoint = match value.strip_prefix(TXT_SCHEME) {
            Some(rest) if discovery => {
                let domain = txt_domain(rest);
                if domain.is_empty() {
                    return Err(Error::invalid_address(field, value, "empty discovery name"));
                }
                tracing::info!(field, domain, "resolving TXT record");
                let record = self.lookup_txt(domain).await?;
                tracing::info!(field, record = %record, "TXT record resolved");
                record
            }
            _ => value.to_string(),
        };

        let (host, port) =
            split_host_port(&endpoint).map_err(|reason| Error::invalid_address(field, value, reason))?;
        let addr = self
            .resolve(&host, port)
            .await
            .map_err(|reason| Error::invalid_address(field, value, reason))?;

        Ok(ResolvedEndpoint { addr, host })
    }

    /// Resolves a host and port into a socket address, preferring IPv4.
    pub async fn resolve(&self, host: &str, port: u16) -> std::result::Result<SocketAddr, String> {
        if host.is_empty() {
            return Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port));
        }

        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(SocketAddr::new(ip, port));
        }

        let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host, port))
            .await
            .map_err(|e| format!("failed to resolve '{}': {}", host, e))?
            .collect();

        addrs
            .iter()
            .find(|addr| addr.is_ipv4())
            .or_else(|| addrs.first())
            .copied()
            .ok_or_else(|| format!("no addresses found for '{}'", host))
    }

    /// Returns the first TXT record of `domain` as one string.
    pub async fn lookup_txt(&self, domain: &str) -> Result<String> {
        let mut resolver_guard = self.txt_resolver.lock().await;
        if resolver_guard.is_none() {
            let resolver = hickory_resolver::Resolver::builder_tokio()
                .map_err(|e| Error::Discovery(format!("failed to create DNS resolver: {}", e)))?
                .build();
            *resolver_guard = Some(resolver);
        }

        let Some(resolver) = resolver_guard.as_ref() else {
            return Err(Error::Discovery("DNS resolver unavailable".to_string()));
        };

        let response = resolver
            .txt_lookup(domain)
            .await
            .map_err(|e| Error::Discovery(format!("TXT lookup for '{}' failed: {}", domain, e)))?;

        let record = response
            .iter()
            .next()
            .ok_or_else(|| Error::Discovery(format!("no TXT records found for domain: {}", domain)))?;

        Ok(record
            .txt_data()
            .iter()
            .map(|chunk| String::from_utf8_lossy(chunk))
            .collect::<String>()
            .trim()
            .to_string())
    }
}

impl Default for DnsResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Strips an optional `:port` suffix from a discovery name.
fn txt_domain(rest: &str) -> &str {
    rest.split(':').next().unwrap_or_default()
}

/// Formats a duration compactly, e.g. `1h2m3s` or `500ms`.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let nanos = d.subsec_nanos();

    if secs == 0 && nanos == 0 {
        return "0s".to_string();
    }

    let mut result = String::new();

    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let secs_remainder = secs % 60;

    if hours > 0 {
        result.push_str(&format!("{}h", hours));
    }
    if mins > 0 {
        result.push_str(&format!("{}m", mins));
    }
    if secs_remainder > 0 || (hours == 0 && mins == 0 && nanos == 0) {
        result.push_str(&format!("{}s", secs_remainder));
    } else if nanos > 0 && hours == 0 && mins == 0 && secs_remainder == 0 {
        let ms = nanos / 1_000_000;
        if ms > 0 {
            result.push_str(&format!("{}ms", ms));
        }
    }

    if result.is_empty() {
        "0s".to_string()
    } else {
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_host_port() {
        assert_eq!(
            split_host_port("localhost:4242").unwrap(),
            ("localhost".to_string(), 4242)
        );
        assert_eq!(split_host_port(":0").unwrap(), (String::new(), 0));
        assert_eq!(split_host_port("[::1]:22").unwrap(), ("::1".to_string(), 22));
    }

    #[test]
    fn test_split_host_port_rejects_bad_port() {
        assert!(split_host_port("x:x").unwrap_err().contains("invalid port"));
        assert!(split_host_port("host:70000").is_err());
        assert_eq!(split_host_port("localhost").unwrap_err(), "missing port");
    }

    #[test]
    fn test_split_host_port_rejects_bare_ipv6() {
        assert!(split_host_port("::1:22").is_err());
    }

    #[test]
    fn test_txt_domain_strips_port() {
        assert_eq!(txt_domain("ssh.example.com:4242"), "ssh.example.com");
        assert_eq!(txt_domain("ssh.example.com"), "ssh.example.com");
        assert_eq!(txt_domain(""), "");
    }

    #[test]
    fn test_format_duration_seconds() {
        assert_eq!(format_duration(Duration::from_secs(10)), "10s");
        assert_eq!(format_duration(Duration::from_secs(3)), "3s");
    }

    #[test]
    fn test_format_duration_zero() {
        assert_eq!(format_duration(Duration::from_secs(0)), "0s");
    }

    #[test]
    fn test_format_duration_mixed() {
        assert_eq!(
            format_duration(Duration::from_secs(3600 + 1800 + 10)),
            "1h30m10s"
        );
        assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
    }

    #[tokio::test]
    async fn test_resolve_ip_address() {
        let resolver = DnsResolver::new();
        let addr = resolver.resolve("127.0.0.1", 8080).await.unwrap();
        assert_eq!(addr.ip(), Ipv4Addr::new(127, 0, 0, 1));
        assert_eq!(addr.port(), 8080);
    }

    #[tokio::test]
    async fn test_resolve_empty_host_is_wildcard() {
        let resolver = DnsResolver::new();
        let addr = resolver.resolve("", 0).await.unwrap();
        assert!(addr.ip().is_unspecified());
        assert_eq!(addr.port(), 0);
    }

    #[tokio::test]
    async fn test_resolve_endpoint_reports_field() {
        let resolver = DnsResolver::new();
        let err = resolver
            .resolve_endpoint("--sshdaddr", "x:x", true)
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("--sshdaddr"), "{msg}");
        assert!(msg.contains("invalid port"), "{msg}");
    }

    #[tokio::test]
    async fn test_resolve_endpoint_rejects_empty_discovery_name() {
        let resolver = DnsResolver::new();
        let err = resolver
            .resolve_endpoint("--addr", "txt://:4242", true)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("--addr"));
    }

    #[tokio::test]
    async fn test_resolve_endpoint_without_discovery_treats_txt_literally() {
        let resolver = DnsResolver::new();
        let result = resolver
            .resolve_endpoint("--bind", "txt://example.com", false)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_resolve_endpoint_ipv6() {
        let resolver = DnsResolver::new();
        let endpoint = resolver
            .resolve_endpoint("--addr", "[::1]:4242", true)
            .await
            .unwrap();
        assert_eq!(endpoint.addr.port(), 4242);
        assert_eq!(endpoint.host, "::1");
    }
}
