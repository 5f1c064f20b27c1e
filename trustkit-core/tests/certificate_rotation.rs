//! Certificate lifecycle: lazy expiry repair, single-flight refresh and the
//! trust-on-first-use failure paths.

mod common;

use std::sync::Arc;
use std::time::Duration;

use trustkit_core::{
    AuthorityTransport, CancelAuthResponse, CertificateCache, ResponseVerifier, ResultCode,
    TrustError,
};

use common::{unix_now, AuthorityFixture, InMemoryAuthority};

fn cache(authority: &Arc<InMemoryAuthority>) -> Arc<CertificateCache> {
    common::init_tracing();
    Arc::new(CertificateCache::new(
        Arc::clone(authority) as Arc<dyn AuthorityTransport>
    ))
}

#[tokio::test]
async fn test_first_use_fetches_and_caches_certificate() {
    let authority = InMemoryAuthority::new();
    let cache = cache(&authority);
    let now = unix_now();

    let first = cache.current(now).await.expect("certificate");
    let second = cache.current(now).await.expect("certificate");

    assert_eq!(first.fingerprint(), second.fingerprint());
    assert_eq!(authority.fetch_calls(), 1);
}

#[tokio::test]
async fn test_expired_certificate_is_lazily_repaired() {
    let now = unix_now();
    let short_lived = AuthorityFixture::with_not_after(i64::try_from(now).expect("ts") + 60);
    let authority = InMemoryAuthority::with_fixture(short_lived);
    let cache = cache(&authority);

    let old = cache.current(now).await.expect("certificate");

    // The authority rotates; the client only notices once its cached
    // certificate is expired at point of use.
    authority.rotate(AuthorityFixture::with_not_after(
        i64::try_from(now).expect("ts") + 7200,
    ));
    let still_old = cache.current(now).await.expect("certificate");
    assert_eq!(old.fingerprint(), still_old.fingerprint());

    let renewed = cache.current(now + 3600).await.expect("certificate");
    assert_ne!(old.fingerprint(), renewed.fingerprint());
    assert_eq!(authority.fetch_calls(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_callers_coalesce_into_one_fetch() {
    let authority = InMemoryAuthority::new();
    authority.set_fetch_delay(Duration::from_millis(50));
    let cache = cache(&authority);
    let now = unix_now();

    let mut tasks = Vec::new();
    for _ in 0..10 {
        let cache = Arc::clone(&cache);
        tasks.push(tokio::spawn(async move { cache.current(now).await }));
    }

    let mut fingerprints = Vec::new();
    for task in tasks {
        let certificate = task.await.expect("join").expect("certificate");
        fingerprints.push(certificate.fingerprint());
    }

    fingerprints.dedup();
    assert_eq!(fingerprints.len(), 1);
    assert_eq!(authority.fetch_calls(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_coalesced_failure_is_shared_by_all_waiters() {
    let authority = InMemoryAuthority::new();
    authority.set_fetch_delay(Duration::from_millis(50));
    authority.use_foreign_fetch_signer(true);
    let cache = cache(&authority);
    let now = unix_now();

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let cache = Arc::clone(&cache);
        tasks.push(tokio::spawn(async move { cache.current(now).await }));
    }

    for task in tasks {
        match task.await.expect("join") {
            Err(TrustError::Security { .. }) => {}
            other => panic!("unexpected: {:?}", other.map(|c| c.fingerprint())),
        }
    }
    assert_eq!(authority.fetch_calls(), 1);
}

#[tokio::test]
async fn test_failed_refresh_leaves_previous_certificate_untouched() {
    let authority = InMemoryAuthority::new();
    let cache = cache(&authority);
    let now = unix_now();

    let trusted = cache.current(now).await.expect("certificate");

    authority.use_foreign_fetch_signer(true);
    match cache.refresh().await {
        Err(TrustError::Security { .. }) => {}
        other => panic!("unexpected: {:?}", other.map(|c| c.fingerprint())),
    }

    // The cache still serves the previously trusted certificate.
    let current = cache.current(now).await.expect("certificate");
    assert_eq!(trusted.fingerprint(), current.fingerprint());
}

#[tokio::test]
async fn test_self_verification_failure_on_first_contact_is_fatal() {
    let authority = InMemoryAuthority::new();
    authority.use_foreign_fetch_signer(true);
    let cache = cache(&authority);

    match cache.current(unix_now()).await {
        Err(TrustError::Security { .. }) => {}
        other => panic!("unexpected: {:?}", other.map(|c| c.fingerprint())),
    }
}

#[tokio::test]
async fn test_non_ok_fetch_code_is_rejected() {
    let authority = InMemoryAuthority::new();
    authority.set_fetch_result_code(ResultCode::Other(5));
    let cache = cache(&authority);

    match cache.current(unix_now()).await {
        Err(TrustError::Security { reason }) => assert!(reason.contains("code(5)")),
        other => panic!("unexpected: {:?}", other.map(|c| c.fingerprint())),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_verification_triggers_exactly_one_refresh() {
    let authority = InMemoryAuthority::new();
    authority.set_fetch_delay(Duration::from_millis(50));
    let fixture = authority.fixture();
    let verifier = ResponseVerifier::new(cache(&authority));

    let response = fixture.response(
        &CancelAuthResponse {
            session_id: "s-9".to_string(),
        },
        None,
    );

    let mut tasks = Vec::new();
    for _ in 0..10 {
        let verifier = verifier.clone();
        let response = response.clone();
        tasks.push(tokio::spawn(
            async move { verifier.verify(&response).await },
        ));
    }
    for task in tasks {
        let verified = task.await.expect("join").expect("verified");
        assert_eq!(verified.result_code, ResultCode::Ok);
    }
    assert_eq!(authority.fetch_calls(), 1);
}
