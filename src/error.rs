//! Error types for quicssh.

use thiserror::Error;

/// Process exit codes for the server and client subcommands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Normal exit
    Success = 0,
    /// Relay ended with an I/O failure or was cancelled
    Failure = 1,
    /// Invalid command line value
    Config = 2,
    /// Listen failed
    ListenFailed = 10,
    /// QUIC connection failed
    QuicConnectionFailed = 11,
    /// TLS setup failed
    TlsFailed = 12,
    /// Stream could not be opened
    StreamOpenFailed = 13,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

/// Main error type for quicssh.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid {field} address '{address}': {reason}")]
    InvalidAddress {
        field: &'static str,
        address: String,
        reason: String,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("discovery failed: {0}")]
    Discovery(String),

    #[error("listen failed: {0}")]
    ListenFailed(String),

    #[error("QUIC connection failed: {0}")]
    QuicConnectionFailed(String),

    #[error("failed to open stream: {0}")]
    StreamOpenFailed(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("relay {direction} failed: {source}")]
    Relay {
        direction: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns the exit code for this error.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Error::InvalidAddress { .. } | Error::Config(_) | Error::Discovery(_) => {
                ExitCode::Config
            }
            Error::ListenFailed(_) => ExitCode::ListenFailed,
            Error::QuicConnectionFailed(_) => ExitCode::QuicConnectionFailed,
            Error::StreamOpenFailed(_) => ExitCode::StreamOpenFailed,
            Error::Tls(_) => ExitCode::TlsFailed,
            Error::Relay { .. } | Error::Cancelled | Error::Io(_) => ExitCode::Failure,
        }
    }

    pub(crate) fn invalid_address(
        field: &'static str,
        address: &str,
        reason: impl Into<String>,
    ) -> Self {
        Error::InvalidAddress {
            field,
            address: address.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for quicssh operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_address_names_the_flag() {
        let err = Error::invalid_address("--bind", "x:x", "invalid port");
        assert_eq!(err.to_string(), "invalid --bind address 'x:x': invalid port");
        assert_eq!(err.exit_code(), ExitCode::Config);
    }

    #[test]
    fn relay_error_keeps_direction_and_source() {
        let err = Error::Relay {
            direction: "stdout",
            source: std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed"),
        };
        let msg = err.to_string();
        assert!(msg.contains("stdout"));
        assert!(msg.contains("pipe closed"));
        assert_eq!(i32::from(err.exit_code()), 1);
    }

    #[test]
    fn transport_errors_map_to_distinct_codes() {
        assert_eq!(
            Error::ListenFailed("in use".into()).exit_code(),
            ExitCode::ListenFailed
        );
        assert_eq!(
            Error::QuicConnectionFailed("timed out".into()).exit_code(),
            ExitCode::QuicConnectionFailed
        );
        assert_eq!(
            Error::StreamOpenFailed("closed".into()).exit_code(),
            ExitCode::StreamOpenFailed
        );
        assert_eq!(Error::Tls("bad key".into()).exit_code(), ExitCode::TlsFailed);
    }
}
