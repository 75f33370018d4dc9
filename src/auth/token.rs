//! Credential record, user profile, and the grant returned by auth endpoints.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// User profile as returned by the auth endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_verified_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl UserProfile {
    pub fn new(id: impl Into<String>, email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            name: name.into(),
            email_verified_at: None,
            phone_number: None,
            avatar_url: None,
            role: None,
            status: None,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn is_email_verified(&self) -> bool {
        self.email_verified_at
            .as_deref()
            .is_some_and(|value| !value.is_empty())
    }

    pub fn is_admin(&self) -> bool {
        self.role
            .as_deref()
            .is_some_and(|role| role.eq_ignore_ascii_case("admin"))
    }
}

/// Payload of a successful login, registration, or refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthGrant {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    pub user: UserProfile,
}

impl AuthGrant {
    /// Absolute expiry of the access token.
    ///
    /// Uses `expires_in` when the server sends it and falls back to the
    /// `exp` claim when the access token is a JWT. A lifetime too large to
    /// represent is treated as unknown.
    pub fn expires_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self.expires_in {
            Some(secs) => Duration::try_seconds(secs.max(0))
                .and_then(|lifetime| now.checked_add_signed(lifetime)),
            None => jwt_expiry(&self.access_token),
        }
    }
}

/// The persisted credential record.
///
/// Access and refresh tokens are both present or the record does not exist:
/// a store holds `Option<Credentials>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub user: UserProfile,
    pub last_login_at: DateTime<Utc>,
}

impl Credentials {
    /// Build a record from a fresh grant.
    pub fn from_grant(grant: &AuthGrant, now: DateTime<Utc>) -> Self {
        Self {
            access_token: grant.access_token.clone(),
            refresh_token: grant.refresh_token.clone(),
            token_type: grant.token_type.clone(),
            expires_at: grant.expires_at(now),
            user: grant.user.clone(),
            last_login_at: now,
        }
    }

    /// Replace the tokens after a refresh, keeping the login timestamp.
    pub fn refreshed(&self, grant: &AuthGrant, now: DateTime<Utc>) -> Self {
        Self {
            last_login_at: self.last_login_at,
            ..Self::from_grant(grant, now)
        }
    }

    /// True once `now` is within `buffer` of the known expiry.
    pub fn needs_refresh(&self, now: DateTime<Utc>, buffer: Duration) -> bool {
        self.expires_at.is_some_and(|expires_at| {
            expires_at
                .checked_sub_signed(buffer)
                .map_or(true, |threshold| now >= threshold)
        })
    }
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

#[derive(Deserialize)]
struct JwtClaims {
    exp: i64,
}

/// Read the `exp` claim from a JWT without verifying it.
pub fn jwt_expiry(token: &str) -> Option<DateTime<Utc>> {
    let payload = token.split('.').nth(1)?;
    let decoded = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: JwtClaims = serde_json::from_slice(&decoded).ok()?;
    DateTime::from_timestamp(claims.exp, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grant(expires_in: Option<i64>) -> AuthGrant {
        AuthGrant {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            token_type: "Bearer".to_string(),
            expires_in,
            user: UserProfile::new("u1", "a@b.co", "Ada"),
        }
    }

    #[test]
    fn expires_at_uses_expires_in() {
        let now = Utc::now();
        let expires = grant(Some(3600)).expires_at(now).unwrap();
        assert_eq!(expires, now + Duration::seconds(3600));
    }

    #[test]
    fn out_of_range_expires_in_is_unknown_expiry() {
        let now = Utc::now();
        assert!(grant(Some(i64::MAX)).expires_at(now).is_none());
        assert!(grant(Some(i64::MAX / 1000)).expires_at(now).is_none());
        assert_eq!(grant(Some(-5)).expires_at(now), Some(now));
    }

    #[test]
    fn expires_at_falls_back_to_jwt_claim() {
        let payload = URL_SAFE_NO_PAD.encode(r#"{"exp":2000000000,"sub":"u1"}"#);
        let mut grant = grant(None);
        grant.access_token = format!("header.{payload}.sig");
        let expires = grant.expires_at(Utc::now()).unwrap();
        assert_eq!(expires.timestamp(), 2_000_000_000);
    }

    #[test]
    fn opaque_token_without_expires_in_has_unknown_expiry() {
        assert!(grant(None).expires_at(Utc::now()).is_none());
    }

    #[test]
    fn refreshed_keeps_last_login() {
        let login_at = Utc::now() - Duration::days(3);
        let creds = Credentials::from_grant(&grant(Some(60)), login_at);
        let mut next = grant(Some(60));
        next.access_token = "access-2".to_string();
        let refreshed = creds.refreshed(&next, Utc::now());
        assert_eq!(refreshed.access_token, "access-2");
        assert_eq!(refreshed.last_login_at, login_at);
    }

    #[test]
    fn needs_refresh_honors_buffer() {
        let now = Utc::now();
        let creds = Credentials::from_grant(&grant(Some(240)), now);
        assert!(creds.needs_refresh(now, Duration::minutes(5)));
        assert!(!creds.needs_refresh(now, Duration::minutes(1)));

        assert!(creds.needs_refresh(now, Duration::MAX));

        let unknown = Credentials::from_grant(&grant(None), now);
        assert!(!unknown.needs_refresh(now, Duration::minutes(5)));
    }

    #[test]
    fn profile_helpers() {
        let mut user = UserProfile::new("u1", "a@b.co", "Ada");
        assert!(!user.is_email_verified());
        assert!(!user.is_admin());
        user.email_verified_at = Some("2024-01-01T00:00:00Z".to_string());
        user.role = Some("Admin".to_string());
        assert!(user.is_email_verified());
        assert!(user.is_admin());
    }
}
