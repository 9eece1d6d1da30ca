//! Forging of unsigned JWTs for tests.
//!
//! The client never verifies signatures, so tests can fabricate compact
//! JWTs with arbitrary claims and an empty signature segment.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

/// Encode `claims` as the payload of an unsigned compact JWT.
///
/// # Panics
/// Panics when `claims` cannot be serialized; test-support only.
#[must_use]
pub fn encode_unsigned_jwt(claims: &serde_json::Value) -> String {
    let header = serde_json::json!({"alg": "none", "typ": "JWT"});
    let header_b64 =
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header).expect("header serializes"));
    let payload_b64 =
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims).expect("claims serialize"));
    format!("{header_b64}.{payload_b64}.")
}

/// A standard identity-claims payload expiring `exp_offset_secs` from now.
#[must_use]
pub fn identity_claims(exp_offset_secs: i64) -> serde_json::Value {
    serde_json::json!({
        "exp": chrono::Utc::now().timestamp() + exp_offset_secs,
        "sub": "3f6f1c0a-8e2e-4d2c-9a4a-demo",
        "preferred_username": "jdoe",
        "email": "jdoe@example.com",
        "name": "Jane Doe",
        "sid": "b2c3d4e5-sess",
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forged_jwt_has_three_segments() {
        let jwt = encode_unsigned_jwt(&identity_claims(60));
        assert_eq!(jwt.split('.').count(), 3);
    }
}
