//! HTTP client that authenticates requests with the stored token.
//!
//! Every request goes through [`AuthorizedClient::send`], which reads the
//! token from the [`TokenManager`], attaches it as
//! `Authorization: Bearer <token>`, and clears it when the server answers
//! `401 Unauthorized`.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::error::TokenError;
use crate::manager::TokenManager;

/// Errors from an authenticated request.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The token could not be read.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// Transport failure or non-success status.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server rejected the token. It has been cleared locally.
    #[error("server rejected the token (401 Unauthorized)")]
    Unauthorized,
}

impl ApiError {
    /// Whether the caller should send the user back to sign-in.
    ///
    /// Storage and transport failures are transient and do not end the
    /// session.
    #[must_use]
    pub const fn requires_sign_in(&self) -> bool {
        match self {
            Self::Unauthorized => true,
            Self::Token(e) => e.requires_sign_in(),
            Self::Http(_) => false,
        }
    }
}

/// Bearer-authenticated API client.
#[derive(Debug, Clone)]
pub struct AuthorizedClient {
    http: Client,
    base_url: String,
    tokens: Arc<TokenManager>,
}

impl AuthorizedClient {
    /// Create a client for `base_url` with a 60 second request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, tokens: Arc<TokenManager>) -> Result<Self, ApiError> {
        let http = Client::builder().timeout(Duration::from_secs(60)).build()?;
        Ok(Self::with_client(http, base_url, tokens))
    }

    /// Create a client around an existing `reqwest::Client`.
    #[must_use]
    pub fn with_client(http: Client, base_url: impl Into<String>, tokens: Arc<TokenManager>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens,
        }
    }

    /// The token manager backing this client.
    #[must_use]
    pub const fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    /// Start a request to `path` relative to the base URL.
    #[must_use]
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        self.http.request(method, url)
    }

    /// Start a `GET` request.
    #[must_use]
    pub fn get(&self, path: &str) -> RequestBuilder {
        self.request(Method::GET, path)
    }

    /// Start a `POST` request.
    #[must_use]
    pub fn post(&self, path: &str) -> RequestBuilder {
        self.request(Method::POST, path)
    }

    /// Send a request, attaching the bearer token when one is stored.
    ///
    /// With no stored token the request goes out unauthenticated.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Token`] if the token cannot be read (expired
    /// tokens are removed first), [`ApiError::Http`] on transport failure,
    /// and [`ApiError::Unauthorized`] after clearing the token on a 401.
    pub async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let request = match self.tokens.get_token().await? {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            log::info!("server returned 401, clearing stored token");
            if let Err(e) = self.tokens.clear_token().await {
                log::warn!("failed to clear rejected token: {e}");
            }
            return Err(ApiError::Unauthorized);
        }

        Ok(response)
    }

    /// `GET` a JSON document.
    ///
    /// # Errors
    ///
    /// Same as [`AuthorizedClient::send`], plus [`ApiError::Http`] for
    /// non-success statuses and undecodable bodies.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.send(self.get(path)).await?.error_for_status()?;
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_in_mapping() {
        assert!(ApiError::Unauthorized.requires_sign_in());
        assert!(ApiError::Token(TokenError::Expired("old".to_string())).requires_sign_in());
        assert!(
            !ApiError::Token(TokenError::Storage {
                message: "locked".to_string(),
                source: None,
            })
            .requires_sign_in()
        );
    }
}
