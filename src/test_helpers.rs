use std::sync::Arc;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::Serialize;
use serde_json::Value;

use crate::{
    auth::jwt::now_unix,
    config::AppConfig,
    session::{MemoryStorage, TokenStore},
    state::AppState,
};

const TEST_SECRET: &[u8] = b"test-secret";

#[derive(Debug, Serialize)]
struct TestClaims<'a> {
    token_type: &'a str,
    user_id: u64,
    role: &'a str,
    iat: i64,
    exp: i64,
}

/// A token with the given payload and a dummy signature.
pub fn unsigned_token(payload: Value) -> String {
    format!(
        "{}.{}.signature",
        URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#),
        URL_SAFE_NO_PAD.encode(payload.to_string())
    )
}

/// An HS256 access token shaped like the API's, expiring `ttl_secs` from now.
pub fn signed_token(role: &str, ttl_secs: i64) -> String {
    let iat = now_unix();
    let claims = TestClaims {
        token_type: "access",
        user_id: 1,
        role,
        iat,
        exp: iat + ttl_secs,
    };

    let mut header = Header::new(Algorithm::HS256);
    header.typ = Some("JWT".into());

    encode(&header, &claims, &EncodingKey::from_secret(TEST_SECRET)).expect("encode test token")
}

/// App state pointed at `api_url` with an in-memory store.
pub fn memory_state(
    api_url: &str,
    entries: &[(&str, &str)],
) -> (Arc<AppState>, Arc<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::with_entries(entries.iter().copied()));
    let mut cfg = AppConfig::default();
    cfg.api.url = api_url.to_string();
    let state = AppState::with_store(cfg, TokenStore::new(storage.clone())).expect("build test state");
    (state, storage)
}
