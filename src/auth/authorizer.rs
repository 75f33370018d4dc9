//! Bearer-token attachment and one-shot recovery from 401 responses.

use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Method, Request, RequestBuilder, Response, StatusCode};

use super::api::bearer;
use super::error::AuthError;
use super::manager::TokenManager;
use crate::config::KeywardConfig;

/// Authorizes outgoing requests on behalf of the current session.
///
/// For each request: allowlisted auth endpoints go out untouched; otherwise
/// the current token is attached. A 401 triggers the token manager's shared
/// refresh and, if that succeeds, exactly one retry with the new token.
/// A failed refresh leaves the session cleared and hands back the original
/// 401 response.
///
/// # Example
/// ```no_run
/// # use keyward::auth::{Authorizer, TokenManager};
/// # use keyward::config::KeywardConfig;
/// # async fn example(manager: TokenManager) -> Result<(), keyward::auth::AuthError> {
/// let authorizer = Authorizer::new(reqwest::Client::new(), manager, KeywardConfig::new());
/// let response = authorizer.send(authorizer.get("journal/entries")).await?;
/// println!("{}", response.status());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Authorizer {
    client: reqwest::Client,
    manager: TokenManager,
    config: KeywardConfig,
}

impl Authorizer {
    pub fn new(client: reqwest::Client, manager: TokenManager, config: KeywardConfig) -> Self {
        Self {
            client,
            manager,
            config,
        }
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn manager(&self) -> &TokenManager {
        &self.manager
    }

    /// Start a request against a path relative to the configured base URL.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, self.config.endpoint(path))
    }

    pub fn get(&self, path: &str) -> RequestBuilder {
        self.request(Method::GET, path)
    }

    pub fn post(&self, path: &str) -> RequestBuilder {
        self.request(Method::POST, path)
    }

    pub fn put(&self, path: &str) -> RequestBuilder {
        self.request(Method::PUT, path)
    }

    pub fn delete(&self, path: &str) -> RequestBuilder {
        self.request(Method::DELETE, path)
    }

    /// Build and execute a request through the authorizer.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response, AuthError> {
        let request = builder
            .build()
            .map_err(|err| AuthError::Validation(format!("invalid request: {err}")))?;
        self.execute(request).await
    }

    /// Execute a prepared request, authorizing it and retrying once on 401.
    pub async fn execute(&self, mut request: Request) -> Result<Response, AuthError> {
        if self.config.is_unauthenticated_path(request.url().path()) {
            request.headers_mut().remove(AUTHORIZATION);
            return Ok(self.client.execute(request).await?);
        }

        let Some(token) = self.manager.valid_token().await else {
            tracing::debug!(path = request.url().path(), "no session token; sending unauthenticated");
            return Ok(self.client.execute(request).await?);
        };

        // Keep an untouched copy for the retry; streaming bodies cannot be replayed.
        let retry_template = request.try_clone();
        set_bearer(&mut request, &token)?;
        let response = self.client.execute(request).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let Some(mut retry) = retry_template else {
            tracing::debug!("401 on a non-replayable request; not retrying");
            return Ok(response);
        };

        if let Err(err) = self.manager.refresh().await {
            tracing::debug!(error = %err, "refresh after 401 failed; returning original response");
            return Ok(response);
        }
        drop(response);

        let Some(fresh) = self.manager.valid_token().await else {
            tracing::debug!("no token after refresh; sending retry unauthenticated");
            return Ok(self.client.execute(retry).await?);
        };
        set_bearer(&mut retry, &fresh)?;
        tracing::debug!(path = retry.url().path(), "retrying request after token refresh");
        Ok(self.client.execute(retry).await?)
    }
}

fn set_bearer(request: &mut Request, token: &str) -> Result<(), AuthError> {
    let mut value = HeaderValue::from_str(&bearer(token))
        .map_err(|_| AuthError::Parse("access token is not a valid header value".to_string()))?;
    value.set_sensitive(true);
    request.headers_mut().insert(AUTHORIZATION, value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_header_is_marked_sensitive() {
        let client = reqwest::Client::new();
        let mut request = client.get("http://localhost/x").build().unwrap();
        set_bearer(&mut request, "abc").unwrap();
        let value = request.headers().get(AUTHORIZATION).unwrap();
        assert_eq!(value, "Bearer abc");
        assert!(value.is_sensitive());
    }

    #[test]
    fn control_characters_in_token_are_rejected() {
        let client = reqwest::Client::new();
        let mut request = client.get("http://localhost/x").build().unwrap();
        assert!(matches!(
            set_bearer(&mut request, "bad\ntoken"),
            Err(AuthError::Parse(_))
        ));
    }
}
