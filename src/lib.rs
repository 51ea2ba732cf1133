//! quicssh - tunnel SSH (TCP) byte streams over QUIC (UDP).
//!
//! The server accepts QUIC sessions and relays every stream opened inside
//! them to a fixed backend TCP service. The client dials the server, opens
//! one stream and relays it to its own stdin/stdout, which makes it usable
//! as an SSH `ProxyCommand`.

pub mod cli;
pub mod client;
pub mod common;
pub mod config;
pub mod error;
pub mod pump;
pub mod server;
pub mod tls;
pub mod tracker;
pub mod transport;

pub use cli::{BuildInfo, Cli, ClientArgs, Command, ServerArgs, DEFAULT_ALPN};
pub use client::{pipe_session, run_client};
pub use common::{format_duration, split_host_port, DnsResolver, ResolvedEndpoint, READ_BUFFER_SIZE};
pub use config::{ClientSettings, ServerSettings};
pub use error::{Error, ExitCode, Result};
pub use pump::{pump, relay, Pipe, PumpOutcome, RelayOutcome};
pub use server::{run_server, Server, ACCEPT_BACKOFF};
pub use tls::{
    build_client_config_insecure, build_server_config, compute_fingerprint, format_fingerprint,
    generate_self_signed_cert, install_crypto_provider, CertKeyPair, TlsError, TlsResult,
};
pub use tracker::{run_idle_watchdog, SessionGuard, SessionTracker, IDLE_CHECK_PERIOD};
pub use transport::{client_endpoint, dial, server_endpoint, KEEP_ALIVE_INTERVAL, MAX_IDLE_TIMEOUT};
