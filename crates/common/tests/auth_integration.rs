//! Integration tests for the auth module
//!
//! Exercises the full PKCE login flow against a wiremock provider with a
//! real loopback redirect, plus the refresh/guard lifecycle over live
//! HTTP. Each test that binds the callback listener uses its own fixed
//! port so parallel test execution cannot collide.

use std::sync::Arc;
use std::time::Duration;

use avalanche_common::testing::jwt::{encode_unsigned_jwt, identity_claims};
use avalanche_common::testing::MemoryTokenStore;
use avalanche_common::{
    derive_challenge, AuthError, Guard, HttpOidcClient, LoginAttempt, OidcConfig,
    SessionManager, Token, TokenRequirement, TokenStore, TokenType,
};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN_PATH: &str = "/realms/avalanchecms/protocol/openid-connect/token";

fn test_config(issuer: String, port: u16) -> OidcConfig {
    OidcConfig {
        issuer,
        callback_port: port,
        redirect_deadline: Duration::from_secs(10),
        poll_interval: Duration::from_millis(50),
        ..OidcConfig::default()
    }
}

fn token_response_body() -> serde_json::Value {
    serde_json::json!({
        "id_token": encode_unsigned_jwt(&identity_claims(300)),
        "access_token": encode_unsigned_jwt(&identity_claims(300)),
        "refresh_token": encode_unsigned_jwt(&identity_claims(1800)),
    })
}

/// Simulate the provider's browser redirect hitting the loopback listener.
fn simulate_redirect(config: &OidcConfig, code: &str) {
    let url = format!("{}?code={code}", config.redirect_uri());
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let _ = reqwest::get(&url).await;
    });
}

/// Validates the full login flow against a mocked provider.
///
/// # Test Steps
/// 1. Start wiremock with a token endpoint returning three unsigned JWTs
/// 2. Begin a login attempt and simulate the browser redirect
/// 3. Verify the attempt resolves with the identity claims
/// 4. Verify all three token types were persisted
/// 5. Verify the PKCE verifier sent to the token endpoint matches the
///    challenge advertised in the authorization URL of the same attempt
#[tokio::test(flavor = "multi_thread")]
async fn login_flow_end_to_end() {
    let provider = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("client_id=avalanchecli"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_response_body()))
        .expect(1)
        .mount(&provider)
        .await;

    let config = test_config(provider.uri(), 49291);
    let client = HttpOidcClient::new(config.clone());
    let store = MemoryTokenStore::new();

    let attempt = LoginAttempt::begin(config.clone()).await.expect("bind failed");
    let auth_url = attempt.authorization_url().to_string();
    assert!(auth_url.contains("client_id=avalanchecli"));
    assert!(auth_url.contains("scope=openid%20profile%20email"));
    assert!(auth_url.contains("code_challenge_method=S256"));

    simulate_redirect(&config, "abc123");

    let report = attempt
        .finish(&client, &store, &CancellationToken::new())
        .await
        .expect("login should succeed");

    assert_eq!(report.user.username.as_deref(), Some("jdoe"));
    assert_eq!(report.user.email.as_deref(), Some("jdoe@example.com"));

    for token_type in TokenType::ALL {
        assert!(store.load(token_type).is_ok(), "{token_type} token not persisted");
    }

    // The challenge in the authorization URL and the verifier sent during
    // the exchange belong to the same PKCE pair.
    let challenge = auth_url
        .split("code_challenge=")
        .nth(1)
        .and_then(|rest| rest.split('&').next())
        .expect("authorization URL carries a code_challenge");
    let requests = provider.received_requests().await.expect("requests recorded");
    let body = String::from_utf8(requests[0].body.clone()).expect("utf-8 body");
    let verifier = body
        .split("code_verifier=")
        .nth(1)
        .and_then(|rest| rest.split('&').next())
        .expect("exchange carries a code_verifier");
    assert_eq!(derive_challenge(verifier), challenge);
    assert!(body.contains("code=abc123"));
}

/// Validates that a simulated redirect resolves the wait promptly and the
/// listener is fully stopped before the orchestrator's call returns.
#[tokio::test(flavor = "multi_thread")]
async fn redirect_resolves_within_a_polling_interval_and_listener_stops() {
    let provider = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_response_body()))
        .mount(&provider)
        .await;

    let config = test_config(provider.uri(), 49292);
    let client = HttpOidcClient::new(config.clone());
    let store = MemoryTokenStore::new();

    let attempt = LoginAttempt::begin(config.clone()).await.expect("bind failed");
    simulate_redirect(&config, "abc123");

    let started = tokio::time::Instant::now();
    attempt
        .finish(&client, &store, &CancellationToken::new())
        .await
        .expect("login should succeed");
    assert!(started.elapsed() < Duration::from_secs(2), "wait did not resolve promptly");

    // No lingering bound socket: the fixed port is immediately reusable.
    let (mut rebound, _handoff) = avalanche_common::CallbackServer::bind(49292, &config.callback_path)
        .await
        .expect("port still bound after finish returned");
    rebound.shutdown().await;
}

/// Validates the timeout outcome and its teardown guarantee.
#[tokio::test(flavor = "multi_thread")]
async fn redirect_timeout_releases_the_listener() {
    let mut config = test_config("http://localhost:8080".to_string(), 49293);
    config.redirect_deadline = Duration::from_millis(200);

    let client = HttpOidcClient::new(config.clone());
    let store = MemoryTokenStore::new();

    let attempt = LoginAttempt::begin(config.clone()).await.expect("bind failed");
    let err = attempt
        .finish(&client, &store, &CancellationToken::new())
        .await
        .expect_err("no redirect arrived, the attempt must time out");

    assert!(matches!(err, AuthError::RedirectTimeout), "got {err:?}");

    let (mut rebound, _handoff) = avalanche_common::CallbackServer::bind(49293, &config.callback_path)
        .await
        .expect("port still bound after timeout");
    rebound.shutdown().await;
}

/// Validates user cancellation: honored promptly, distinct from timeout,
/// same teardown guarantee.
#[tokio::test(flavor = "multi_thread")]
async fn cancellation_is_honored_promptly() {
    let config = test_config("http://localhost:8080".to_string(), 49294);
    let client = HttpOidcClient::new(config.clone());
    let store = MemoryTokenStore::new();

    let attempt = LoginAttempt::begin(config.clone()).await.expect("bind failed");

    let cancel = CancellationToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let started = tokio::time::Instant::now();
    let err = attempt
        .finish(&client, &store, &cancel)
        .await
        .expect_err("cancelled attempt must not succeed");

    assert!(matches!(err, AuthError::RedirectCancelled), "got {err:?}");
    assert!(started.elapsed() < Duration::from_secs(2));

    let (mut rebound, _handoff) = avalanche_common::CallbackServer::bind(49294, &config.callback_path)
        .await
        .expect("port still bound after cancellation");
    rebound.shutdown().await;
}

/// Validates that two concurrent attempts are structurally exclusive: the
/// second bind on the fixed port fails immediately instead of hanging.
#[tokio::test(flavor = "multi_thread")]
async fn second_concurrent_login_fails_fast() {
    let config = test_config("http://localhost:8080".to_string(), 49295);

    let first = LoginAttempt::begin(config.clone()).await.expect("first bind failed");

    let err = LoginAttempt::begin(config.clone())
        .await
        .err()
        .expect("second attempt must fail while the first is active");
    assert!(matches!(err, AuthError::ListenerBindFailed { port: 49295, .. }), "got {err:?}");

    // Tear the first attempt down via its normal cancellation path.
    let cancel = CancellationToken::new();
    cancel.cancel();
    let client = HttpOidcClient::new(config.clone());
    let store = MemoryTokenStore::new();
    let _ = first.finish(&client, &store, &cancel).await;
}

/// Validates that a rejected code exchange is fatal for the attempt and
/// leaves no partial session behind.
#[tokio::test(flavor = "multi_thread")]
async fn rejected_exchange_clears_the_store() {
    let provider = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "Code not valid",
        })))
        .mount(&provider)
        .await;

    let config = test_config(provider.uri(), 49296);
    let client = HttpOidcClient::new(config.clone());
    let store = MemoryTokenStore::new();

    // A stale token from an earlier session must not survive the failure.
    let stale = Token::decode(
        &encode_unsigned_jwt(&identity_claims(600)),
        TokenType::Access,
    )
    .expect("test token decodes");
    store.save(&stale).expect("seed store");

    let attempt = LoginAttempt::begin(config.clone()).await.expect("bind failed");
    simulate_redirect(&config, "stolen-code");

    let err = attempt
        .finish(&client, &store, &CancellationToken::new())
        .await
        .expect_err("rejected exchange must fail the attempt");

    assert!(matches!(err, AuthError::CodeExchangeFailed(_)), "got {err:?}");
    for token_type in TokenType::ALL {
        assert!(store.load(token_type).is_err(), "{token_type} token survived");
    }
}

/// Validates a token-endpoint body missing required fields is a hard
/// failure even with HTTP 200.
#[tokio::test(flavor = "multi_thread")]
async fn exchange_response_missing_tokens_is_fatal() {
    let provider = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": encode_unsigned_jwt(&identity_claims(300)),
        })))
        .mount(&provider)
        .await;

    let config = test_config(provider.uri(), 49297);
    let client = HttpOidcClient::new(config.clone());
    let store = MemoryTokenStore::new();

    let attempt = LoginAttempt::begin(config.clone()).await.expect("bind failed");
    simulate_redirect(&config, "abc123");

    let err = attempt
        .finish(&client, &store, &CancellationToken::new())
        .await
        .expect_err("incomplete response must fail the attempt");
    assert!(matches!(err, AuthError::CodeExchangeFailed(_)), "got {err:?}");
}

/// Validates the refresh grant over live HTTP and the guard's full-clear
/// policy when the provider rejects it.
#[tokio::test(flavor = "multi_thread")]
async fn rejected_refresh_clears_every_token_type() {
    let provider = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "Session not active",
        })))
        .mount(&provider)
        .await;

    let config = test_config(provider.uri(), 49298);
    let store = Arc::new(MemoryTokenStore::new());

    // Access token near expiry forces the guard into the refresh path.
    for (token_type, offset) in
        [(TokenType::Identity, 600), (TokenType::Access, 5), (TokenType::Refresh, 600)]
    {
        let token = Token::decode(&encode_unsigned_jwt(&identity_claims(offset)), token_type)
            .expect("test token decodes");
        store.save(&token).expect("seed store");
    }

    let session = SessionManager::new(
        Arc::new(HttpOidcClient::new(config.clone())),
        store.clone(),
        config.near_expiry_threshold_secs,
    );
    let guard = Guard::new(&session, TokenRequirement::default());

    let err = guard.ensure().await.expect_err("rejected refresh must fail the guard");
    assert!(matches!(err, AuthError::RefreshFailed(_)), "got {err:?}");

    // Even though only the refresh grant was implicated, every cell is gone.
    for token_type in TokenType::ALL {
        assert!(store.load(token_type).is_err(), "{token_type} token survived");
    }
}

/// Validates a successful refresh over live HTTP persists rotated slots.
#[tokio::test(flavor = "multi_thread")]
async fn successful_refresh_persists_rotated_tokens() {
    let provider = MockServer::start().await;
    let rotated_access = encode_unsigned_jwt(&identity_claims(900));
    let rotated_refresh = encode_unsigned_jwt(&identity_claims(3600));
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": rotated_access.clone(),
            "refresh_token": rotated_refresh.clone(),
        })))
        .mount(&provider)
        .await;

    let config = test_config(provider.uri(), 49299);
    let store = Arc::new(MemoryTokenStore::new());
    let seeded_refresh = Token::decode(
        &encode_unsigned_jwt(&identity_claims(600)),
        TokenType::Refresh,
    )
    .expect("test token decodes");
    store.save(&seeded_refresh).expect("seed store");

    let session = SessionManager::new(
        Arc::new(HttpOidcClient::new(config.clone())),
        store.clone(),
        config.near_expiry_threshold_secs,
    );

    session.refresh().await.expect("refresh should succeed");

    assert_eq!(store.load(TokenType::Access).expect("access stored"), rotated_access);
    assert_eq!(store.load(TokenType::Refresh).expect("refresh stored"), rotated_refresh);
}
