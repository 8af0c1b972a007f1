//! Unit tests for the auth client's offline-checkable pieces: authorize
//! URL construction, access token claim decoding, and refresh timing.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, Utc};
use url::Url;
use uuid::Uuid;

use smartmark::services::auth_client::{AuthClient, AuthClientTrait};
use smartmark::types::errors::AuthError;
use smartmark::types::session::AuthSession;

fn client() -> AuthClient {
    AuthClient::new(
        reqwest::Client::new(),
        "https://abc.supabase.co",
        "anon-key-123",
        "github",
    )
}

/// Assembles an unsigned JWT with the given payload JSON.
fn jwt_with_payload(payload: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string().as_bytes());
    format!("{}.{}.signature", header, body)
}

// === Authorize URL ===

#[test]
fn test_authorize_url_points_at_auth_service() {
    let url = client().authorize_url("http://localhost:3000");
    assert!(url.starts_with("https://abc.supabase.co/auth/v1/authorize?"));
}

#[test]
fn test_authorize_url_carries_provider_and_redirect() {
    let raw = client().authorize_url("http://localhost:3000/done");
    let url = Url::parse(&raw).expect("authorize URL should parse");

    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    assert!(pairs.contains(&("provider".to_string(), "github".to_string())));
    assert!(pairs.contains(&(
        "redirect_to".to_string(),
        "http://localhost:3000/done".to_string()
    )));
}

#[test]
fn test_authorize_url_tolerates_trailing_slash_base() {
    let client = AuthClient::new(
        reqwest::Client::new(),
        "https://abc.supabase.co/",
        "anon-key-123",
        "github",
    );
    let url = client.authorize_url("http://localhost:3000");
    assert!(url.starts_with("https://abc.supabase.co/auth/v1/authorize?"));
}

// === Claim decoding ===

#[test]
fn test_decode_claims_reads_sub_exp_and_email() {
    let user_id = Uuid::from_u128(0xFEED);
    let token = jwt_with_payload(&serde_json::json!({
        "sub": user_id,
        "exp": 1_750_000_000,
        "email": "user@example.com",
    }));

    let claims = client().decode_claims(&token).expect("claims should decode");
    assert_eq!(claims.sub, user_id);
    assert_eq!(claims.exp, 1_750_000_000);
    assert_eq!(claims.email.as_deref(), Some("user@example.com"));
}

#[test]
fn test_decode_claims_email_is_optional() {
    let token = jwt_with_payload(&serde_json::json!({
        "sub": Uuid::from_u128(1),
        "exp": 1_750_000_000,
    }));

    let claims = client().decode_claims(&token).expect("claims should decode");
    assert_eq!(claims.email, None);
}

#[test]
fn test_decode_claims_rejects_non_jwt() {
    let err = client().decode_claims("just-an-opaque-string").unwrap_err();
    match err {
        AuthError::InvalidToken(msg) => assert!(msg.contains("not a JWT")),
        other => panic!("expected InvalidToken, got {}", other),
    }
}

#[test]
fn test_decode_claims_rejects_bad_base64_payload() {
    let err = client().decode_claims("header.!!!not-base64!!!.sig").unwrap_err();
    assert!(matches!(err, AuthError::InvalidToken(_)));
}

#[test]
fn test_decode_claims_rejects_non_json_payload() {
    let body = URL_SAFE_NO_PAD.encode(b"plain text, not claims");
    let token = format!("header.{}.sig", body);

    let err = client().decode_claims(&token).unwrap_err();
    match err {
        AuthError::InvalidToken(msg) => assert!(msg.contains("claims parse")),
        other => panic!("expected InvalidToken, got {}", other),
    }
}

// === Refresh timing ===

fn session_expiring_in(seconds: i64) -> AuthSession {
    AuthSession {
        access_token: "access".to_string(),
        refresh_token: "refresh".to_string(),
        user_id: Uuid::from_u128(1),
        email: None,
        expires_at: Utc::now() + Duration::seconds(seconds),
    }
}

#[test]
fn test_fresh_session_does_not_need_refresh() {
    assert!(!session_expiring_in(3600).needs_refresh());
}

#[test]
fn test_session_inside_leeway_needs_refresh() {
    // 30s remaining is inside the 60s leeway window.
    assert!(session_expiring_in(30).needs_refresh());
}

#[test]
fn test_expired_session_needs_refresh() {
    assert!(session_expiring_in(-3600).needs_refresh());
}
