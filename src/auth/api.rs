//! Remote auth client.

use async_trait::async_trait;
use bon::Builder;
use reqwest::header::AUTHORIZATION;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::error::AuthError;
use super::token::{AuthGrant, UserProfile};
use crate::config::KeywardConfig;

pub const LOGIN_PATH: &str = "auth/login";
pub const REGISTER_PATH: &str = "auth/register";
pub const REFRESH_PATH: &str = "auth/refresh";
pub const LOGOUT_PATH: &str = "auth/logout";
pub const FORGOT_PASSWORD_PATH: &str = "auth/password/forgot";
pub const RESET_PASSWORD_PATH: &str = "auth/password/reset";
pub const CURRENT_USER_PATH: &str = "auth/me";
pub const PUSH_TOKEN_PATH: &str = "auth/fcm-token";

/// Network calls against the auth endpoints.
///
/// Implementations perform the call and nothing else: persisting a grant
/// or clearing state on failure is the caller's job.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, request: &LoginRequest) -> Result<AuthGrant, AuthError>;

    async fn register(&self, request: &LoginRequest) -> Result<AuthGrant, AuthError>;

    async fn refresh(&self, refresh_token: &str) -> Result<AuthGrant, AuthError>;

    async fn logout(&self, access_token: &str) -> Result<(), AuthError>;

    async fn forgot_password(&self, email: &str) -> Result<(), AuthError>;

    async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), AuthError>;

    async fn current_user(&self, access_token: &str) -> Result<UserProfile, AuthError>;

    async fn update_push_token(&self, access_token: &str, push_token: &str)
        -> Result<(), AuthError>;
}

/// Body of a login or registration call.
///
/// # Example
/// ```
/// use keyward::auth::LoginRequest;
///
/// let request = LoginRequest::builder()
///     .email("ada@example.com".to_string())
///     .password("Secret123".to_string())
///     .device_name("pixel".to_string())
///     .build();
/// assert!(request.name.is_none());
/// ```
#[derive(Debug, Clone, Builder, Serialize, PartialEq, Eq)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[builder(default = "keyward".to_string())]
    pub device_name: String,
    #[builder(default)]
    pub device_id: String,
    #[serde(rename = "fcm_token", skip_serializing_if = "Option::is_none")]
    pub push_token: Option<String>,
}

/// Response envelope shared by every endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default = "Option::default")]
    pub data: Option<T>,
    #[serde(default)]
    pub code: Option<u16>,
}

/// [`AuthApi`] over HTTP with reqwest.
///
/// # Example
/// ```no_run
/// use keyward::auth::HttpAuthApi;
/// use keyward::config::KeywardConfig;
///
/// let api = HttpAuthApi::new(KeywardConfig::new().with_base_url("http://localhost:8080/api"))?;
/// # Ok::<(), keyward::auth::AuthError>(())
/// ```
#[derive(Debug, Clone)]
pub struct HttpAuthApi {
    client: reqwest::Client,
    config: KeywardConfig,
}

impl HttpAuthApi {
    pub fn new(config: KeywardConfig) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| AuthError::Unknown(format!("failed to build HTTP client: {err}")))?;
        Ok(Self { client, config })
    }

    pub fn with_client(client: reqwest::Client, config: KeywardConfig) -> Self {
        Self { client, config }
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.client
            .post(self.config.endpoint(path))
            .header("Accept", "application/json")
    }

    async fn send_for_data<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<T, AuthError> {
        read_envelope::<T>(builder.send().await?)
            .await?
            .ok_or_else(|| AuthError::Parse("response envelope has no data".to_string()))
    }

    async fn send_for_ack(&self, builder: RequestBuilder) -> Result<(), AuthError> {
        read_envelope::<serde_json::Value>(builder.send().await?).await?;
        Ok(())
    }
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    async fn login(&self, request: &LoginRequest) -> Result<AuthGrant, AuthError> {
        self.send_for_data(self.post(LOGIN_PATH).json(request)).await
    }

    async fn register(&self, request: &LoginRequest) -> Result<AuthGrant, AuthError> {
        self.send_for_data(self.post(REGISTER_PATH).json(request))
            .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthGrant, AuthError> {
        self.send_for_data(
            self.post(REFRESH_PATH)
                .form(&[("refresh_token", refresh_token)]),
        )
        .await
    }

    async fn logout(&self, access_token: &str) -> Result<(), AuthError> {
        self.send_for_ack(self.post(LOGOUT_PATH).header(AUTHORIZATION, bearer(access_token)))
            .await
    }

    async fn forgot_password(&self, email: &str) -> Result<(), AuthError> {
        self.send_for_ack(self.post(FORGOT_PASSWORD_PATH).form(&[("email", email)]))
            .await
    }

    async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), AuthError> {
        self.send_for_ack(
            self.post(RESET_PASSWORD_PATH)
                .form(&[("token", token), ("password", new_password)]),
        )
        .await
    }

    async fn current_user(&self, access_token: &str) -> Result<UserProfile, AuthError> {
        let builder = self
            .client
            .get(self.config.endpoint(CURRENT_USER_PATH))
            .header("Accept", "application/json")
            .header(AUTHORIZATION, bearer(access_token));
        self.send_for_data(builder).await
    }

    async fn update_push_token(
        &self,
        access_token: &str,
        push_token: &str,
    ) -> Result<(), AuthError> {
        self.send_for_ack(
            self.post(PUSH_TOKEN_PATH)
                .header(AUTHORIZATION, bearer(access_token))
                .json(&serde_json::json!({ "fcm_token": push_token })),
        )
        .await
    }
}

pub(crate) fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

/// Decode the envelope and classify failures where they are observed.
async fn read_envelope<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<Option<T>, AuthError> {
    let status = response.status();
    let body = response.bytes().await?;

    if !status.is_success() {
        let message = serde_json::from_slice::<ApiEnvelope<serde_json::Value>>(&body)
            .ok()
            .and_then(|envelope| envelope.message)
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });
        return Err(AuthError::from_status(status.as_u16(), message));
    }

    let envelope: ApiEnvelope<T> = serde_json::from_slice(&body)
        .map_err(|err| AuthError::Parse(format!("invalid response envelope: {err}")))?;
    if envelope.success {
        return Ok(envelope.data);
    }

    let message = envelope
        .message
        .unwrap_or_else(|| "request was not successful".to_string());
    match envelope.code {
        Some(code) if code == StatusCode::UNAUTHORIZED.as_u16() => {
            Err(AuthError::Unauthorized(message))
        }
        Some(code) if code >= 500 => Err(AuthError::Server {
            status: code,
            message,
        }),
        _ => Err(AuthError::Validation(message)),
    }
}
