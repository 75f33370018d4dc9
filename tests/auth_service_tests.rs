mod auth_support;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use keyward::auth::{AuthError, AuthService, TokenState};
use keyward::config::KeywardConfig;
use pretty_assertions::assert_eq;

use auth_support::{credentials, grant, manager_with, user, ScriptedAuthApi};

fn service(api: Arc<ScriptedAuthApi>, logged_in: bool, config: KeywardConfig) -> AuthService {
    let seeded = logged_in.then(|| credentials("a1"));
    let manager = manager_with(api.clone(), seeded, &config);
    AuthService::new(manager, api, config)
}

#[tokio::test]
async fn login_persists_session_and_sends_device_details() {
    let api = Arc::new(ScriptedAuthApi::new());
    let svc = service(api.clone(), false, KeywardConfig::new().with_device_name("pixel-8"));

    let profile = svc.login(" ada@example.com ", "Secret123").await.unwrap();

    assert_eq!(profile, user());
    assert!(svc.is_logged_in());
    assert_eq!(svc.manager().state(), TokenState::Authenticated);
    assert_eq!(svc.current_user(), Some(user()));
    assert_eq!(
        svc.manager().vault().access_token().as_deref(),
        Some("login-access")
    );

    let requests = api.login_requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].email, "ada@example.com");
    assert_eq!(requests[0].device_name, "pixel-8");
    assert_eq!(requests[0].device_id, svc.manager().vault().device_id().unwrap());
}

#[tokio::test]
async fn configured_device_id_wins() {
    let api = Arc::new(ScriptedAuthApi::new());
    let svc = service(api.clone(), false, KeywardConfig::new().with_device_id("fixed-id"));

    svc.login("ada@example.com", "Secret123").await.unwrap();

    assert_eq!(api.login_requests.lock().unwrap()[0].device_id, "fixed-id");
}

#[tokio::test]
async fn invalid_input_never_reaches_the_server() {
    let api = Arc::new(ScriptedAuthApi::new());
    let svc = service(api.clone(), false, KeywardConfig::new());

    let err = svc.login("not-an-email", "Secret123").await.unwrap_err();
    assert_eq!(err, AuthError::Validation("Please enter a valid email address".into()));
    assert!(svc.register("A", "ada@example.com", "Secret123").await.is_err());
    assert!(svc.forgot_password("").await.is_err());
    assert!(svc.reset_password("", "Secret123").await.is_err());
    assert!(svc.reset_password("tok", "weak").await.is_err());

    assert_eq!(api.login_calls.load(Ordering::SeqCst), 0);
    assert_eq!(api.register_calls.load(Ordering::SeqCst), 0);
    assert!(api.forgot_emails.lock().unwrap().is_empty());
    assert!(api.resets.lock().unwrap().is_empty());
}

#[tokio::test]
async fn rejected_login_leaves_session_empty() {
    let api = Arc::new(ScriptedAuthApi::new());
    api.script_login(Err(AuthError::Unauthorized("Invalid credentials".into())));
    let svc = service(api.clone(), false, KeywardConfig::new());

    let err = svc.login("ada@example.com", "Secret123").await.unwrap_err();

    assert_eq!(err.user_message(), "Session expired, please log in again");
    assert!(!svc.is_logged_in());
    assert!(svc.current_user().is_none());
}

#[tokio::test]
async fn register_starts_a_session() {
    let api = Arc::new(ScriptedAuthApi::new());
    let svc = service(api.clone(), false, KeywardConfig::new());

    svc.register("  Ada ", "ada@example.com", "Secret123").await.unwrap();

    assert!(svc.is_logged_in());
    assert_eq!(api.login_requests.lock().unwrap()[0].name.as_deref(), Some("Ada"));
}

#[tokio::test]
async fn logout_clears_locally_even_when_server_fails() {
    let api = Arc::new(ScriptedAuthApi::new());
    api.fail_logout(AuthError::NetworkUnavailable("offline".into()));
    let svc = service(api.clone(), true, KeywardConfig::new());
    svc.manager().vault().set_push_token("push-1").unwrap();

    svc.logout().await.unwrap();

    assert_eq!(api.logout_calls.load(Ordering::SeqCst), 1);
    assert!(!svc.is_logged_in());
    assert!(svc.manager().vault().load().is_none());
    assert_eq!(svc.manager().vault().push_token().as_deref(), Some("push-1"));
}

#[tokio::test]
async fn logout_without_session_skips_the_server() {
    let api = Arc::new(ScriptedAuthApi::new());
    let svc = service(api.clone(), false, KeywardConfig::new());

    svc.logout().await.unwrap();

    assert_eq!(api.logout_calls.load(Ordering::SeqCst), 0);
    assert_eq!(svc.manager().state(), TokenState::Unauthenticated);
}

#[tokio::test]
async fn push_token_is_uploaded_on_login_and_when_saved() {
    let api = Arc::new(ScriptedAuthApi::new());
    let svc = service(api.clone(), false, KeywardConfig::new());

    svc.save_push_token("push-1").await.unwrap();
    assert!(api.pushed_tokens.lock().unwrap().is_empty());

    svc.login("ada@example.com", "Secret123").await.unwrap();
    assert_eq!(
        api.login_requests.lock().unwrap()[0].push_token.as_deref(),
        Some("push-1")
    );

    svc.save_push_token("push-2").await.unwrap();
    assert_eq!(
        api.pushed_tokens.lock().unwrap().clone(),
        vec![
            ("login-access".to_string(), "push-1".to_string()),
            ("login-access".to_string(), "push-2".to_string()),
        ]
    );
}

#[tokio::test]
async fn fetch_profile_refreshes_once_after_rejection() {
    let api = Arc::new(ScriptedAuthApi::new());
    api.script_profile(Err(AuthError::Unauthorized("expired".into())));
    let svc = service(api.clone(), true, KeywardConfig::new());

    let profile = svc.fetch_profile().await.unwrap();

    assert_eq!(profile, user());
    assert_eq!(api.refreshes(), 1);
    assert_eq!(
        api.profile_tokens_seen.lock().unwrap().clone(),
        vec!["a1".to_string(), "access-1".to_string()]
    );
}

#[tokio::test]
async fn fetch_profile_requires_a_session() {
    let api = Arc::new(ScriptedAuthApi::new());
    let svc = service(api, false, KeywardConfig::new());

    assert_eq!(svc.fetch_profile().await, Err(AuthError::NotLoggedIn));
}

#[tokio::test]
async fn password_flows_forward_trimmed_input() {
    let api = Arc::new(ScriptedAuthApi::new());
    let svc = service(api.clone(), false, KeywardConfig::new());

    svc.forgot_password(" ada@example.com").await.unwrap();
    svc.reset_password(" tok-1 ", "NewSecret1").await.unwrap();

    assert_eq!(
        api.forgot_emails.lock().unwrap().clone(),
        vec!["ada@example.com".to_string()]
    );
    assert_eq!(
        api.resets.lock().unwrap().clone(),
        vec![("tok-1".to_string(), "NewSecret1".to_string())]
    );
}

#[tokio::test]
async fn relogin_replaces_the_stored_grant() {
    let api = Arc::new(ScriptedAuthApi::new());
    api.script_login(Ok(grant("second", Some(3600))));
    let svc = service(api, true, KeywardConfig::new());

    svc.login("ada@example.com", "Secret123").await.unwrap();

    assert_eq!(svc.manager().vault().access_token().as_deref(), Some("second"));
}
