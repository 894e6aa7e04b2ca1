//! Errors raised while hosting the HTTP server.

use std::net::SocketAddr;

use thiserror::Error;

/// Failures from binding or running the API listener.
#[derive(Debug, Error)]
pub enum ApiServerError {
    /// Binding the listener failed.
    #[error("failed to bind api listener")]
    Bind {
        /// Address attempted.
        addr: SocketAddr,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// The server loop terminated with an IO error.
    #[error("api server terminated unexpectedly")]
    Serve {
        /// Underlying IO error.
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn bind_errors_keep_the_address_and_source() {
        let err = ApiServerError::Bind {
            addr: SocketAddr::from(([127, 0, 0, 1], 8000)),
            source: std::io::Error::other("in use"),
        };
        assert_eq!(err.to_string(), "failed to bind api listener");
        assert!(err.source().is_some());
    }
}
