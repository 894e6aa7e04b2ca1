//! Downstream user directory client.
//!
//! # Design
//! - Each lookup mints a fresh service token; tokens are never cached.
//! - A configured request timeout narrows the caller's deadline. When the
//!   deadline elapses the request future is dropped, aborting the call.
//! - No retries. Every failure is reported once, with its kind preserved.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use url::Url;

use crate::context::CallContext;
use crate::model::User;
use crate::tokens::{TokenError, TokenMinter};

const ERROR_BODY_LIMIT: usize = 512;

/// Failures raised by a user directory lookup.
#[derive(Debug, Error)]
pub enum UserClientError {
    /// The request never produced a response.
    #[error("users service network error")]
    Network {
        /// Underlying transport error.
        source: reqwest::Error,
    },
    /// The call deadline elapsed before the lookup finished.
    #[error("users service timeout")]
    Timeout,
    /// The directory has no such user.
    #[error("user not found")]
    NotFound {
        /// Username that was looked up.
        username: String,
    },
    /// The directory answered with a non-success status.
    #[error("users service returned an error status")]
    Downstream {
        /// HTTP status code returned.
        status: u16,
        /// Truncated response body.
        body: String,
    },
    /// The response body was not a valid user record.
    #[error("users service returned an invalid user payload")]
    Decode {
        /// Underlying JSON error.
        source: serde_json::Error,
    },
    /// Minting the service token failed.
    #[error("failed to mint service token")]
    Token {
        /// Underlying token error.
        source: TokenError,
    },
    /// The configured base address cannot carry path segments.
    #[error("users service base address cannot be a base url")]
    InvalidBaseUrl,
    /// The HTTP client could not be constructed.
    #[error("failed to build http client")]
    Client {
        /// Underlying reqwest error.
        source: reqwest::Error,
    },
}

/// Lookup of canonical user records.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Fetch the record for `username`, honouring the deadline in `ctx`.
    async fn fetch_user(&self, ctx: &CallContext, username: &str) -> Result<User, UserClientError>;
}

/// [`UserDirectory`] backed by `GET {base}/users/{username}`.
#[derive(Debug, Clone)]
pub struct HttpUserDirectory {
    client: Client,
    base: Url,
    minter: Arc<TokenMinter>,
    request_timeout: Option<Duration>,
}

impl HttpUserDirectory {
    /// Build a client for `base`.
    ///
    /// # Errors
    ///
    /// Returns [`UserClientError::InvalidBaseUrl`] when `base` cannot carry
    /// path segments, or [`UserClientError::Client`] if the HTTP client fails
    /// to build.
    pub fn new(
        base: Url,
        minter: Arc<TokenMinter>,
        request_timeout: Option<Duration>,
    ) -> Result<Self, UserClientError> {
        if base.cannot_be_a_base() {
            return Err(UserClientError::InvalidBaseUrl);
        }
        let client = Client::builder()
            .user_agent(concat!("turnstile/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| UserClientError::Client { source })?;
        Ok(Self {
            client,
            base,
            minter,
            request_timeout: request_timeout.filter(|timeout| !timeout.is_zero()),
        })
    }

    fn user_url(&self, username: &str) -> Result<Url, UserClientError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| UserClientError::InvalidBaseUrl)?
            .pop_if_empty()
            .push("users")
            .push(username);
        Ok(url)
    }
}

#[async_trait]
impl UserDirectory for HttpUserDirectory {
    async fn fetch_user(&self, ctx: &CallContext, username: &str) -> Result<User, UserClientError> {
        let ctx = ctx.child(self.request_timeout);
        let token = self
            .minter
            .mint_service_token(username, Utc::now())
            .map_err(|source| UserClientError::Token { source })?;
        let url = self.user_url(username)?;

        let response = within(&ctx, self.client.get(url).bearer_auth(token).send())
            .await?
            .map_err(transport_err)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(UserClientError::NotFound {
                username: username.to_string(),
            });
        }
        if !status.is_success() {
            let body = within(&ctx, response.text())
                .await?
                .unwrap_or_default()
                .chars()
                .take(ERROR_BODY_LIMIT)
                .collect();
            return Err(UserClientError::Downstream {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = within(&ctx, response.bytes())
            .await?
            .map_err(transport_err)?;
        serde_json::from_slice(&bytes).map_err(|source| UserClientError::Decode { source })
    }
}

async fn within<F: Future>(ctx: &CallContext, fut: F) -> Result<F::Output, UserClientError> {
    match ctx.deadline() {
        Some(deadline) => tokio::time::timeout_at(deadline, fut)
            .await
            .map_err(|_| UserClientError::Timeout),
        None => Ok(fut.await),
    }
}

fn transport_err(source: reqwest::Error) -> UserClientError {
    if source.is_timeout() {
        UserClientError::Timeout
    } else {
        UserClientError::Network { source }
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;

    fn directory(server: &MockServer, timeout: Option<Duration>) -> anyhow::Result<HttpUserDirectory> {
        let minter = Arc::new(TokenMinter::new(b"s3cret")?);
        Ok(HttpUserDirectory::new(
            Url::parse(&server.base_url())?,
            minter,
            timeout,
        )?)
    }

    #[tokio::test]
    async fn fetches_and_decodes_user() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/users/admin")
                    .header_exists("authorization");
                then.status(200).json_body(json!({
                    "username": "admin",
                    "firstname": "Foo",
                    "lastname": "Bar",
                    "role": "admin"
                }));
            })
            .await;

        let user = directory(&server, None)?
            .fetch_user(&CallContext::background(), "admin")
            .await?;
        assert_eq!(user.first_name, "Foo");
        assert_eq!(user.role, "admin");
        mock.assert_async().await;
        Ok(())
    }

    #[tokio::test]
    async fn username_is_escaped_as_one_segment() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let dir = directory(&server, None)?;
        let url = dir.user_url("a/b c")?;
        assert!(url.path().ends_with("/users/a%2Fb%20c"));
        Ok(())
    }

    #[tokio::test]
    async fn missing_user_maps_to_not_found() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/users/ghost");
                then.status(404);
            })
            .await;

        let err = directory(&server, None)?
            .fetch_user(&CallContext::background(), "ghost")
            .await;
        assert!(matches!(err, Err(UserClientError::NotFound { username }) if username == "ghost"));
        Ok(())
    }

    #[tokio::test]
    async fn error_status_keeps_status_and_body() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/users/admin");
                then.status(502).body("bad gateway");
            })
            .await;

        let err = directory(&server, None)?
            .fetch_user(&CallContext::background(), "admin")
            .await;
        assert!(matches!(
            err,
            Err(UserClientError::Downstream { status: 502, ref body }) if body == "bad gateway"
        ));
        Ok(())
    }

    #[tokio::test]
    async fn malformed_payload_maps_to_decode() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/users/admin");
                then.status(200).body("{\"username\":");
            })
            .await;

        let err = directory(&server, None)?
            .fetch_user(&CallContext::background(), "admin")
            .await;
        assert!(matches!(err, Err(UserClientError::Decode { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn slow_directory_times_out() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/users/admin");
                then.status(200)
                    .delay(Duration::from_millis(500))
                    .json_body(json!({
                        "username": "admin",
                        "firstname": "Foo",
                        "lastname": "Bar",
                        "role": "admin"
                    }));
            })
            .await;

        let err = directory(&server, Some(Duration::from_millis(50)))?
            .fetch_user(&CallContext::background(), "admin")
            .await;
        assert!(matches!(err, Err(UserClientError::Timeout)));

        let err = directory(&server, None)?
            .fetch_user(&CallContext::with_timeout(Duration::from_millis(50)), "admin")
            .await;
        assert!(matches!(err, Err(UserClientError::Timeout)));
        Ok(())
    }

    #[tokio::test]
    async fn unreachable_directory_is_a_network_error() -> anyhow::Result<()> {
        let minter = Arc::new(TokenMinter::new(b"s3cret")?);
        let dir = HttpUserDirectory::new(Url::parse("http://127.0.0.1:9/")?, minter, None)?;
        let err = dir.fetch_user(&CallContext::background(), "admin").await;
        assert!(matches!(err, Err(UserClientError::Network { .. })));
        Ok(())
    }
}
