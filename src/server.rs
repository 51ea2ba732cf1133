//! Server mode implementation for quicssh.
//!
//! The server accepts QUIC sessions and, for every bidirectional stream a
//! client opens, dials the backend TCP service and relays bytes both ways.
//! Session and stream failures are logged and contained; only bind and
//! identity errors end the server.

use quinn::{Connecting, Connection, ConnectionError, Endpoint, RecvStream, SendStream};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::cli::ServerArgs;
use crate::common::{format_duration, DnsResolver};
use crate::config::ServerSettings;
use crate::error::{Error, Result};
use crate::pump::{relay, Pipe, PumpOutcome};
use crate::tls::generate_self_signed_cert;
use crate::tracker::{run_idle_watchdog, SessionGuard, SessionTracker, IDLE_CHECK_PERIOD};
use crate::transport::server_endpoint;

/// Delay before retrying after a failed accept.
pub const ACCEPT_BACKOFF: Duration = Duration::from_secs(1);

/// Runs the quicssh server until it goes idle or receives Ctrl-C.
pub async fn run_server(args: &ServerArgs) -> Result<()> {
    let settings = ServerSettings::resolve(args, &DnsResolver::new()).await?;
    let server = Server::bind(settings)?;

    let shutdown = server.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received SIGINT, shutting down...");
            shutdown.cancel();
        }
    });

    server.run().await
}

/// A bound server, ready to accept sessions.
pub struct Server {
    endpoint: Endpoint,
    settings: ServerSettings,
    tracker: Arc<SessionTracker>,
    shutdown: CancellationToken,
}

impl Server {
    /// Generates a fresh identity and binds the QUIC listener.
    pub fn bind(settings: ServerSettings) -> Result<Self> {
        let identity = generate_self_signed_cert()
            .map_err(|e| Error::Tls(format!("failed to generate certificate: {}", e)))?;

        let endpoint = server_endpoint(settings.bind, &identity, &settings.alpn)?;
        let local_addr = endpoint.local_addr().map_err(Error::Io)?;

        tracing::info!(
            listen = %local_addr,
            backend = %settings.backend,
            alpn = %settings.alpn,
            idle_timeout = %format_duration(settings.idle_timeout),
            fingerprint = %identity.fingerprint,
            "server listening"
        );

        Ok(Self {
            endpoint,
            settings,
            tracker: Arc::new(SessionTracker::new()),
            shutdown: CancellationToken::new(),
        })
    }

    /// Address the listener is actually bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.endpoint.local_addr().map_err(Error::Io)
    }

    /// Cancelling this token stops the accept loop.
    ///
    /// Sessions already being handled are left running.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Session accounting shared with the idle watchdog.
    pub fn tracker(&self) -> Arc<SessionTracker> {
        Arc::clone(&self.tracker)
    }

    /// Accepts sessions until the shutdown token is cancelled.
    pub async fn run(self) -> Result<()> {
        let Server {
            endpoint,
            settings,
            tracker,
            shutdown,
        } = self;

        if !settings.idle_timeout.is_zero() {
            tracing::info!(
                "server runs with idle timeout: {}",
                format_duration(settings.idle_timeout)
            );
            tokio::spawn(run_idle_watchdog(
                Arc::clone(&tracker),
                settings.idle_timeout,
                IDLE_CHECK_PERIOD,
                shutdown.clone(),
            ));
        }

        accept_loop(&endpoint, settings.backend, &tracker, &shutdown)
            .instrument(tracing::info_span!("server"))
            .await;

        // Stops the watchdog if the endpoint closed on its own.
        shutdown.cancel();
        tracing::info!(
            active_sessions = tracker.active_sessions(),
            "server stopped accepting sessions"
        );
        Ok(())
    }
}

async fn accept_loop(
    endpoint: &Endpoint,
    backend: SocketAddr,
    tracker: &Arc<SessionTracker>,
    shutdown: &CancellationToken,
) {
    loop {
        tracing::debug!("accepting session...");
        let incoming = tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!("shutdown requested");
                return;
            }
            incoming = endpoint.accept() => incoming,
        };

        let Some(incoming) = incoming else {
            tracing::info!("endpoint closed");
            return;
        };

        let remote = incoming.remote_address();
        let connecting = match incoming.accept() {
            Ok(connecting) => connecting,
            Err(e) => {
                tracing::warn!(%remote, error = %e, "accept failed, retrying in {}", format_duration(ACCEPT_BACKOFF));
                tokio::select! {
                    _ = shutdown.cancelled() => return,
                    _ = tokio::time::sleep(ACCEPT_BACKOFF) => continue,
                }
            }
        };

        let guard = tracker.session_opened();
        let span = tracing::info_span!("session", %remote, id = tracing::field::Empty);
        tokio::spawn(handle_session(connecting, guard, backend).instrument(span));
    }
}

/// Handles one session: accepts streams until the session ends.
///
/// The session has its own cancellation scope, independent of the server's.
async fn handle_session(connecting: Connecting, _guard: SessionGuard, backend: SocketAddr) {
    let connection = match connecting.await {
        Ok(connection) => connection,
        Err(e) => {
            tracing::warn!(error = %e, "session handshake failed");
            return;
        }
    };

    tracing::Span::current().record("id", connection.stable_id());
    tracing::info!("handling session...");
    let scope = CancellationToken::new();

    accept_streams(&connection, backend, &scope).await;

    scope.cancel();
    connection.close(0u32.into(), b"close");
}

async fn accept_streams(connection: &Connection, backend: SocketAddr, scope: &CancellationToken) {
    loop {
        match connection.accept_bi().await {
            Ok((send, recv)) => {
                let span = tracing::info_span!("stream", id = %send.id());
                tokio::spawn(relay_stream(send, recv, backend, scope.child_token()).instrument(span));
            }
            Err(e @ (ConnectionError::ApplicationClosed(_) | ConnectionError::LocallyClosed)) => {
                tracing::info!(reason = %e, "session closed");
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "session error");
                return;
            }
        }
    }
}

/// Bridges one accepted stream to a fresh backend TCP connection.
async fn relay_stream(
    mut send: SendStream,
    mut recv: RecvStream,
    backend: SocketAddr,
    cancel: CancellationToken,
) {
    tracing::debug!("handling stream...");

    let tcp = match TcpStream::connect(backend).await {
        Ok(tcp) => tcp,
        Err(e) => {
            tracing::warn!(%backend, error = %e, "backend dial failed");
            let _ = send.finish();
            let _ = recv.stop(0u32.into());
            return;
        }
    };
    if let Err(e) = tcp.set_nodelay(true) {
        tracing::debug!(error = %e, "failed to set TCP_NODELAY");
    }

    let (tcp_read, tcp_write) = tcp.into_split();
    let outcome = relay(
        Pipe::new("to_backend", recv, tcp_write),
        Pipe::new("from_backend", tcp_read, send),
        &cancel,
    )
    .await;

    match outcome.outcome {
        PumpOutcome::Eof => tracing::debug!(%outcome, "piping finished"),
        _ => tracing::info!(%outcome, "stream relay ended"),
    }
}
