//! Single-flight refresh guarantees.

use std::time::Duration;

use super::harness::*;
use crate::CredentialState;

#[tokio::test(start_paused = true)]
async fn test_concurrent_callers_share_one_derivation() {
    let fixture = auth_fixture();
    script_happy_chain(&fixture.http);

    fixture
        .orchestrator
        .login_with_password("13800000000", "hunter2")
        .await
        .unwrap();
    assert_eq!(fixture.http.hits(GRANT_ROUTE), 1);

    // Age the credential out of the freshness window.
    tokio::time::advance(Duration::from_secs(481)).await;
    // Slow the chain down so all callers overlap the same refresh.
    fixture.http.set_delay(Duration::from_millis(200));

    let mut handles = Vec::new();
    for _ in 0..5 {
        let orchestrator = fixture.orchestrator.clone();
        handles.push(tokio::spawn(
            async move { orchestrator.ensure_credential().await },
        ));
    }

    for handle in handles {
        let credential = handle.await.unwrap().unwrap();
        assert_eq!(credential.cred, "credC");
    }

    // Five callers, one derivation: exactly one extra grant+redeem pair.
    assert_eq!(fixture.http.hits(GRANT_ROUTE), 2);
    assert_eq!(fixture.http.hits(REDEEM_ROUTE), 2);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_completes_after_waiter_abandons() {
    let fixture = auth_fixture();
    script_happy_chain(&fixture.http);

    fixture
        .orchestrator
        .login_with_password("13800000000", "hunter2")
        .await
        .unwrap();

    tokio::time::advance(Duration::from_secs(481)).await;
    fixture.http.set_delay(Duration::from_millis(200));

    let orchestrator = fixture.orchestrator.clone();
    let waiter = tokio::spawn(async move { orchestrator.ensure_credential().await });
    tokio::task::yield_now().await;
    waiter.abort();

    // The abandoned refresh still runs to completion.
    settle().await;
    assert_eq!(fixture.http.hits(GRANT_ROUTE), 2);
    assert_eq!(
        fixture.orchestrator.credential_state(),
        CredentialState::Fresh
    );

    // And the next caller reuses its result instead of starting over.
    fixture.orchestrator.ensure_credential().await.unwrap();
    assert_eq!(fixture.http.hits(GRANT_ROUTE), 2);
}

#[tokio::test(start_paused = true)]
async fn test_sequential_stale_refreshes_each_run_once() {
    let fixture = auth_fixture();
    script_happy_chain(&fixture.http);

    fixture
        .orchestrator
        .login_with_password("13800000000", "hunter2")
        .await
        .unwrap();

    tokio::time::advance(Duration::from_secs(481)).await;
    fixture.orchestrator.ensure_credential().await.unwrap();
    assert_eq!(fixture.http.hits(GRANT_ROUTE), 2);

    tokio::time::advance(Duration::from_secs(481)).await;
    fixture.orchestrator.ensure_credential().await.unwrap();
    assert_eq!(fixture.http.hits(GRANT_ROUTE), 3);
}
