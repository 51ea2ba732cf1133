//! QUIC endpoint construction.
//!
//! Both roles share one set of transport parameters. The server endpoint
//! carries the ephemeral identity; the client endpoint skips certificate
//! verification and only checks that the peer negotiates the same ALPN.

use quinn::{
    ClientConfig as QuinnClientConfig, Connection, Endpoint, ServerConfig as QuinnServerConfig,
    TransportConfig,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::tls::{build_client_config_insecure, build_server_config, CertKeyPair};

/// QUIC idle timeout.
pub const MAX_IDLE_TIMEOUT: Duration = Duration::from_secs(10);

/// QUIC keep-alive interval.
pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(5);

fn transport_config() -> Result<TransportConfig> {
    let mut transport = TransportConfig::default();
    transport.max_idle_timeout(Some(
        MAX_IDLE_TIMEOUT
            .try_into()
            .map_err(|_| Error::Config("idle timeout too large".to_string()))?,
    ));
    transport.keep_alive_interval(Some(KEEP_ALIVE_INTERVAL));
    Ok(transport)
}

/// Creates a listening endpoint bound to `bind`.
pub fn server_endpoint(bind: SocketAddr, identity: &CertKeyPair, alpn: &str) -> Result<Endpoint> {
    let tls_config = build_server_config(identity, alpn)
        .map_err(|e| Error::Tls(format!("failed to build TLS config: {}", e)))?;

    let mut quinn_config = QuinnServerConfig::with_crypto(Arc::new(
        quinn::crypto::rustls::QuicServerConfig::try_from(tls_config)
            .map_err(|e| Error::Tls(format!("failed to create QUIC config: {}", e)))?,
    ));
    quinn_config.transport_config(Arc::new(transport_config()?));

    Endpoint::server(quinn_config, bind).map_err(|e| Error::ListenFailed(format!("{}: {}", bind, e)))
}

/// Creates a dialing endpoint whose UDP socket is bound to `local`.
pub fn client_endpoint(local: SocketAddr, alpn: &str) -> Result<Endpoint> {
    let crypto = build_client_config_insecure(alpn)
        .map_err(|e| Error::Tls(format!("failed to build TLS config: {}", e)))?;

    let mut client_config = QuinnClientConfig::new(Arc::new(
        quinn::crypto::rustls::QuicClientConfig::try_from(crypto)
            .map_err(|e| Error::Tls(format!("failed to create QUIC config: {}", e)))?,
    ));
    client_config.transport_config(Arc::new(transport_config()?));

    let mut endpoint = Endpoint::client(local)
        .map_err(|e| Error::ListenFailed(format!("{}: {}", local, e)))?;
    endpoint.set_default_client_config(client_config);
    Ok(endpoint)
}

/// Dials `server` and waits for the handshake to complete.
pub async fn dial(endpoint: &Endpoint, server: SocketAddr, server_name: &str) -> Result<Connection> {
    let connecting = endpoint
        .connect(server, server_name)
        .map_err(|e| Error::QuicConnectionFailed(format!("{}: {}", server, e)))?;

    connecting
        .await
        .map_err(|e| Error::QuicConnectionFailed(format!("{}: {}", server, e)))
}

/// Returns a name usable for SNI: the host as given, or `localhost`.
pub fn server_name(host: &str) -> &str {
    if host.is_empty() {
        "localhost"
    } else {
        host
    }
}
