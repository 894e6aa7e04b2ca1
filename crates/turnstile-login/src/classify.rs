//! Mapping of login failures to caller-facing outcomes.

use crate::directory::UserClientError;
use crate::login::LoginError;

/// Caller-facing failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    /// The directory did not answer before the deadline.
    UpstreamTimeout,
    /// The breaker refused the directory call.
    CircuitOpen,
    /// The directory could not be reached.
    NetworkError,
    /// The credentials are not allow-listed.
    BadCredentials,
    /// Anything else; details stay server-side.
    Internal,
}

impl FailureClass {
    /// Message shown to the caller.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::UpstreamTimeout => "users service timeout",
            Self::CircuitOpen => "users service unavailable (circuit open)",
            Self::NetworkError => "users service network error",
            Self::BadCredentials => "username or password is invalid",
            Self::Internal => "something went wrong, please try again later",
        }
    }

    /// HTTP status code for the class.
    #[must_use]
    pub const fn status_code(self) -> u16 {
        match self {
            Self::UpstreamTimeout | Self::CircuitOpen | Self::NetworkError => 503,
            Self::BadCredentials => 401,
            Self::Internal => 500,
        }
    }

    /// Metric label for the class.
    #[must_use]
    pub const fn outcome(self) -> &'static str {
        match self {
            Self::UpstreamTimeout => "upstream_timeout",
            Self::CircuitOpen => "circuit_open",
            Self::NetworkError => "network_error",
            Self::BadCredentials => "bad_credentials",
            Self::Internal => "internal",
        }
    }
}

/// Classify a login failure. Timeouts take precedence, then breaker
/// rejections, then transport errors, then bad credentials.
#[must_use]
pub fn classify(err: &LoginError) -> FailureClass {
    match err {
        LoginError::UserLookup {
            source: UserClientError::Timeout,
        } => FailureClass::UpstreamTimeout,
        LoginError::CircuitOpen | LoginError::TooManyRequests => FailureClass::CircuitOpen,
        LoginError::UserLookup {
            source: UserClientError::Network { .. },
        } => FailureClass::NetworkError,
        LoginError::InvalidCredentials => FailureClass::BadCredentials,
        LoginError::UserLookup { .. }
        | LoginError::Credentials { .. }
        | LoginError::Worker { .. } => FailureClass::Internal,
    }
}
