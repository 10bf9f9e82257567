//! Key-set cache behavior tests.
//!
//! Refresh bounds, rate limiting, stale-cache degradation, and
//! concurrent lookups against a mocked key-set server.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use authn_core::errors::AuthError;
use authn_core::keyset::KeySetClient;
use authn_test_utils::{oct_jwk, test_hmac_secret, MockKeySetServer};
use std::sync::Arc;
use std::time::Duration;

fn client(server: &MockKeySetServer, cache_ttl: Duration, min_refresh: Duration) -> KeySetClient {
    KeySetClient::with_options(server.url(), cache_ttl, min_refresh, Duration::from_secs(5))
}

#[tokio::test]
async fn test_cache_hit_does_not_refetch() {
    let server = MockKeySetServer::start().await;
    server
        .set_keys(vec![oct_jwk("kid/a", &test_hmac_secret(1), None)])
        .await;

    let client = client(&server, Duration::from_secs(300), Duration::ZERO);

    client.get_key("kid/a").await.unwrap();
    client.get_key("kid/a").await.unwrap();
    client.get_key("kid/a").await.unwrap();

    assert_eq!(server.request_count().await, 1);
}

#[tokio::test]
async fn test_missing_kid_triggers_exactly_one_refresh() {
    let server = MockKeySetServer::start().await;
    server
        .set_keys(vec![oct_jwk("kid/a", &test_hmac_secret(1), None)])
        .await;

    // Long rate-limit window: the second miss must not refetch.
    let client = client(&server, Duration::from_secs(300), Duration::from_secs(60));

    let first = client.get_key("kid/missing").await;
    assert_eq!(first.unwrap_err(), AuthError::UnknownKey);
    assert_eq!(server.request_count().await, 1);

    let second = client.get_key("kid/missing").await;
    assert_eq!(second.unwrap_err(), AuthError::UnknownKey);
    assert_eq!(server.request_count().await, 1);
}

#[tokio::test]
async fn test_refresh_picks_up_rotated_key() {
    let server = MockKeySetServer::start().await;
    server
        .set_keys(vec![oct_jwk("kid/old", &test_hmac_secret(1), None)])
        .await;

    let client = client(&server, Duration::from_secs(300), Duration::ZERO);
    client.get_key("kid/old").await.unwrap();

    // Provider rotates to a new key id.
    server
        .set_keys(vec![oct_jwk("kid/new", &test_hmac_secret(2), None)])
        .await;

    let rotated = client.get_key("kid/new").await.unwrap();
    assert_eq!(rotated.kid, "kid/new");
    // The replaced snapshot no longer serves the old key once refreshed.
    assert_eq!(
        client.get_key("kid/old").await.unwrap_err(),
        AuthError::UnknownKey
    );
}

#[tokio::test]
async fn test_rate_limited_miss_serves_existing_snapshot() {
    let server = MockKeySetServer::start().await;
    server
        .set_keys(vec![oct_jwk("kid/a", &test_hmac_secret(1), None)])
        .await;

    // TTL zero: every lookup wants a refresh, but the rate limit keeps
    // the existing snapshot in service.
    let client = client(&server, Duration::ZERO, Duration::from_secs(60));

    client.get_key("kid/a").await.unwrap();

    server
        .set_keys(vec![oct_jwk("kid/b", &test_hmac_secret(2), None)])
        .await;

    // Still served from the cached snapshot, no fetch against the
    // rotated server.
    let key = client.get_key("kid/a").await.unwrap();
    assert_eq!(key.kid, "kid/a");
    assert_eq!(server.request_count().await, 0);
}

#[tokio::test]
async fn test_fetch_failure_without_cache_is_provider_unreachable() {
    let server = MockKeySetServer::start().await;
    server.set_status(500).await;

    let client = client(&server, Duration::from_secs(300), Duration::ZERO);

    let result = client.get_key("kid/a").await;
    assert!(matches!(
        result.unwrap_err(),
        AuthError::ProviderUnreachable(_)
    ));
}

#[tokio::test]
async fn test_fetch_failure_keeps_cached_keys_usable() {
    let server = MockKeySetServer::start().await;
    server
        .set_keys(vec![oct_jwk("kid/a", &test_hmac_secret(1), None)])
        .await;

    // TTL zero forces a refresh attempt on every lookup.
    let client = client(&server, Duration::ZERO, Duration::ZERO);
    client.get_key("kid/a").await.unwrap();

    server.set_status(500).await;

    // The refresh fails but the previous snapshot still serves the key.
    let key = client.get_key("kid/a").await.unwrap();
    assert_eq!(key.kid, "kid/a");

    // A key the stale snapshot never had degrades to unreachable.
    let missing = client.get_key("kid/missing").await;
    assert!(matches!(
        missing.unwrap_err(),
        AuthError::ProviderUnreachable(_)
    ));
}

#[tokio::test]
async fn test_fetch_timeout_is_provider_unreachable() {
    let server = MockKeySetServer::start().await;
    server
        .set_keys(vec![oct_jwk("kid/a", &test_hmac_secret(1), None)])
        .await;

    // Short fetch timeout; TTL zero forces a refresh attempt on every
    // lookup.
    let client = KeySetClient::with_options(
        server.url(),
        Duration::ZERO,
        Duration::ZERO,
        Duration::from_millis(250),
    );
    client.get_key("kid/a").await.unwrap();

    // The provider now stalls well past the fetch timeout.
    server
        .set_keys_with_delay(
            vec![oct_jwk("kid/b", &test_hmac_secret(2), None)],
            Duration::from_secs(5),
        )
        .await;

    // The timed-out refresh is a fetch failure, not a stall, and the
    // previous snapshot still serves its key.
    let key = client.get_key("kid/a").await.unwrap();
    assert_eq!(key.kid, "kid/a");

    // A key outside the stale snapshot surfaces the timeout.
    let missing = client.get_key("kid/missing").await;
    assert!(matches!(
        missing.unwrap_err(),
        AuthError::ProviderUnreachable(_)
    ));
}

#[tokio::test]
async fn test_rate_limited_window_after_failed_cold_fetch_stays_unreachable() {
    let server = MockKeySetServer::start().await;
    server.set_status(500).await;

    // Long rate-limit window, nothing cached yet.
    let client = client(&server, Duration::from_secs(300), Duration::from_secs(60));

    let first = client.get_key("kid/a").await;
    assert!(matches!(
        first.unwrap_err(),
        AuthError::ProviderUnreachable(_)
    ));
    assert_eq!(server.request_count().await, 1);

    // Inside the window no refetch happens, but the outage is still
    // reported as the provider's fault rather than an unknown key.
    let second = client.get_key("kid/a").await;
    assert!(matches!(
        second.unwrap_err(),
        AuthError::ProviderUnreachable(_)
    ));
    assert_eq!(server.request_count().await, 1);
}

#[tokio::test]
async fn test_unparsable_body_is_fetch_failure() {
    let server = MockKeySetServer::start().await;
    // 200 with an empty body is not a key set.
    server.set_status(200).await;

    let client = client(&server, Duration::from_secs(300), Duration::ZERO);

    let result = client.get_key("kid/a").await;
    assert!(matches!(
        result.unwrap_err(),
        AuthError::ProviderUnreachable(_)
    ));
}

#[tokio::test]
async fn test_concurrent_missing_kid_lookups_agree() {
    let server = MockKeySetServer::start().await;
    server
        .set_keys(vec![oct_jwk("kid/a", &test_hmac_secret(1), None)])
        .await;

    let client = Arc::new(client(
        &server,
        Duration::from_secs(300),
        Duration::from_secs(60),
    ));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let client = Arc::clone(&client);
        handles.push(tokio::spawn(async move {
            client.get_key("kid/missing").await
        }));
    }

    for handle in handles {
        let result = handle.await.unwrap();
        assert_eq!(result.unwrap_err(), AuthError::UnknownKey);
    }

    // At most one task refreshed; the rest were rate limited.
    assert_eq!(server.request_count().await, 1);
}

#[tokio::test]
async fn test_concurrent_present_kid_lookups_all_succeed() {
    let server = MockKeySetServer::start().await;
    server
        .set_keys(vec![oct_jwk("kid/a", &test_hmac_secret(1), None)])
        .await;

    let client = Arc::new(client(
        &server,
        Duration::from_secs(300),
        Duration::from_secs(60),
    ));

    // Warm the cache so every concurrent lookup is a plain read.
    client.get_key("kid/a").await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let client = Arc::clone(&client);
        handles.push(tokio::spawn(async move { client.get_key("kid/a").await }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap().kid, "kid/a");
    }

    assert_eq!(server.request_count().await, 1);
}
