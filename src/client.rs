//! Client mode implementation for quicssh.
//!
//! Dials the server, opens exactly one stream and relays it to the local
//! process's stdin/stdout. Unlike the server, any failure here ends the
//! program: the single stream is the client's whole purpose.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::cli::ClientArgs;
use crate::common::DnsResolver;
use crate::config::ClientSettings;
use crate::error::{Error, Result};
use crate::pump::{relay, Pipe};
use crate::transport::{client_endpoint, dial, server_name};

/// Upper bound on waiting for the close to reach the server.
const CLOSE_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Runs the quicssh client on the process's stdin/stdout.
pub async fn run_client(args: &ClientArgs) -> Result<()> {
    let settings = ClientSettings::resolve(args, &DnsResolver::new()).await?;
    pipe_session(&settings, tokio::io::stdin(), tokio::io::stdout()).await
}

/// Dials the server and relays one stream to `input` and `output`.
///
/// Returns `Ok(())` when either side reaches end of input, and the observed
/// error otherwise.
pub async fn pipe_session<R, W>(settings: &ClientSettings, input: R, output: W) -> Result<()>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let span = tracing::info_span!("client", server = %settings.server);
    pipe_session_inner(settings, input, output)
        .instrument(span)
        .await
}

async fn pipe_session_inner<R, W>(settings: &ClientSettings, input: R, output: W) -> Result<()>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    tracing::info!(local = %settings.local, "dialing...");
    let endpoint = client_endpoint(settings.local, &settings.alpn)?;
    let connection = dial(&endpoint, settings.server, server_name(&settings.server_name)).await?;

    tracing::info!("opening stream...");
    let (send, recv) = match connection.open_bi().await {
        Ok(streams) => streams,
        Err(e) => {
            connection.close(0u32.into(), b"close");
            return Err(Error::StreamOpenFailed(e.to_string()));
        }
    };

    tracing::info!("piping stream with QUIC...");
    let outcome = relay(
        Pipe::new("stdin", input, send),
        Pipe::new("stdout", recv, output),
        &CancellationToken::new(),
    )
    .await;
    tracing::info!(%outcome, "piping finished");

    // The stream halves were dropped by the relay; close the session last.
    connection.close(0u32.into(), b"close");
    if tokio::time::timeout(CLOSE_DRAIN_TIMEOUT, endpoint.wait_idle())
        .await
        .is_err()
    {
        tracing::debug!("session close did not drain in time");
    }

    outcome.into_result()
}
