//! Login, restore, and logout lifecycle.

use super::harness::*;
use crate::{AuthError, AuthState, CredentialState};
use skland_session_store::{Persistence, StoredSession, AUTH_STATE_KEY};

#[tokio::test(start_paused = true)]
async fn test_login_establishes_session() {
    let fixture = auth_fixture();
    script_happy_chain(&fixture.http);

    assert_eq!(fixture.orchestrator.state(), AuthState::LoggedOut);

    let bindings = fixture
        .orchestrator
        .login_with_password("13800000000", "hunter2")
        .await
        .unwrap();

    assert_eq!(fixture.orchestrator.state(), AuthState::LoggedIn);
    assert_eq!(bindings.len(), 1);
    assert_eq!(bindings[0].uid, "123");
    assert_eq!(bindings[0].nick_name, "Doctor");
    assert_eq!(fixture.orchestrator.account_id().as_deref(), Some("id1"));
    assert_eq!(
        fixture.orchestrator.credential_state(),
        CredentialState::Fresh
    );

    // The whole chain ran exactly once.
    assert_eq!(fixture.http.hits(PASSWORD_ROUTE), 1);
    assert_eq!(fixture.http.hits(GRANT_ROUTE), 1);
    assert_eq!(fixture.http.hits(REDEEM_ROUTE), 1);
    assert_eq!(fixture.http.hits(BINDING_ROUTE), 1);
}

#[tokio::test(start_paused = true)]
async fn test_login_persists_platform_token_only() {
    let fixture = auth_fixture();
    script_happy_chain(&fixture.http);

    fixture
        .orchestrator
        .login_with_password("13800000000", "hunter2")
        .await
        .unwrap();

    let record = fixture.store.load().unwrap().unwrap();
    assert_eq!(record.platform_token, "tokA");
    assert_eq!(record.account_id, "id1");
    assert!(record.profile_snapshot.is_some());

    // The short-lived credential never reaches durable storage.
    let raw = fixture.persistence.get(AUTH_STATE_KEY).unwrap().unwrap();
    assert!(!raw.contains("credC"));
    assert!(!raw.contains("signD"));
}

#[tokio::test(start_paused = true)]
async fn test_login_with_sms_code_uses_v2_endpoint() {
    let fixture = auth_fixture();
    script_happy_chain(&fixture.http);

    fixture
        .orchestrator
        .login_with_sms_code("13800000000", "123456")
        .await
        .unwrap();

    assert_eq!(fixture.http.hits(SMS_LOGIN_ROUTE), 1);
    assert_eq!(fixture.http.hits(PASSWORD_ROUTE), 0);
    assert_eq!(fixture.orchestrator.state(), AuthState::LoggedIn);
}

#[tokio::test(start_paused = true)]
async fn test_send_sms_code() {
    let fixture = auth_fixture();
    script_happy_chain(&fixture.http);

    fixture
        .orchestrator
        .send_sms_code("13800000000")
        .await
        .unwrap();
    assert_eq!(fixture.http.hits(SMS_SEND_ROUTE), 1);
}

#[tokio::test(start_paused = true)]
async fn test_logout_clears_everything() {
    let fixture = auth_fixture();
    script_happy_chain(&fixture.http);

    fixture
        .orchestrator
        .login_with_password("13800000000", "hunter2")
        .await
        .unwrap();
    fixture.orchestrator.logout().await.unwrap();

    assert_eq!(fixture.orchestrator.state(), AuthState::LoggedOut);
    assert_eq!(
        fixture.orchestrator.credential_state(),
        CredentialState::Absent
    );
    assert!(fixture.orchestrator.account_id().is_none());
    assert!(fixture.orchestrator.bindings().is_empty());
    assert!(fixture.store.load().unwrap().is_none());

    let err = fixture.orchestrator.ensure_credential().await.unwrap_err();
    assert!(matches!(err, AuthError::NotLoggedIn));
}

#[tokio::test(start_paused = true)]
async fn test_restore_resumes_persisted_session() {
    let http = MockHttp::new();
    script_happy_chain(&http);

    // A previous process logged in against the same persistence.
    let first = auth_fixture_with(http.clone());
    first
        .orchestrator
        .login_with_password("13800000000", "hunter2")
        .await
        .unwrap();
    drop(first.orchestrator);

    let second = {
        let store = skland_session_store::SessionStore::new(
            first.persistence.clone(),
            skland_session_store::SessionStoreConfig::default(),
        );
        let chain = skland_exchange::TokenExchangeChain::new(
            http.clone(),
            skland_exchange::ExchangeConfig::default(),
        );
        crate::AuthOrchestrator::new(chain, store, crate::AuthPolicy::default())
    };

    let restored = second.restore().await.unwrap();
    assert!(restored);
    assert_eq!(second.state(), AuthState::LoggedIn);
    assert_eq!(second.account_id().as_deref(), Some("id1"));
    // The snapshot is served immediately, before any network round trip.
    assert_eq!(second.bindings().len(), 1);

    // Background revalidation derives a credential from the stored token.
    settle().await;
    assert_eq!(second.credential_state(), CredentialState::Fresh);
    assert_eq!(http.hits(GRANT_ROUTE), 2);
}

#[tokio::test(start_paused = true)]
async fn test_restore_without_record_stays_logged_out() {
    let fixture = auth_fixture();
    script_happy_chain(&fixture.http);

    assert!(!fixture.orchestrator.restore().await.unwrap());
    assert_eq!(fixture.orchestrator.state(), AuthState::LoggedOut);
    // Nothing was derived.
    assert_eq!(fixture.http.hits(GRANT_ROUTE), 0);
}

#[tokio::test(start_paused = true)]
async fn test_restore_deletes_corrupt_record() {
    let fixture = auth_fixture();
    script_happy_chain(&fixture.http);

    fixture
        .persistence
        .set(AUTH_STATE_KEY, "{definitely not json")
        .unwrap();

    assert!(!fixture.orchestrator.restore().await.unwrap());
    assert_eq!(fixture.orchestrator.state(), AuthState::LoggedOut);
    assert_eq!(fixture.persistence.get(AUTH_STATE_KEY).unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn test_restore_is_idempotent_once_logged_in() {
    let fixture = auth_fixture();
    script_happy_chain(&fixture.http);

    fixture
        .orchestrator
        .login_with_password("13800000000", "hunter2")
        .await
        .unwrap();

    assert!(fixture.orchestrator.restore().await.unwrap());
    // No extra chain traffic for a session that is already live.
    assert_eq!(fixture.http.hits(GRANT_ROUTE), 1);
}

#[tokio::test(start_paused = true)]
async fn test_restore_snapshot_round_trips_through_record() {
    // The record written at login parses back into the same binding set.
    let fixture = auth_fixture();
    script_happy_chain(&fixture.http);

    fixture
        .orchestrator
        .login_with_password("13800000000", "hunter2")
        .await
        .unwrap();

    let record: StoredSession = fixture.store.load().unwrap().unwrap();
    let snapshot = record.profile_snapshot.unwrap();
    let bindings: Vec<skland_exchange::BindingCharacter> =
        serde_json::from_value(snapshot).unwrap();
    assert_eq!(bindings.len(), 1);
    assert_eq!(bindings[0].uid, "123");
    assert!(bindings[0].is_default);
}
