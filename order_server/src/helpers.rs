//! Webhook signature verification.
//!
//! The platform signs each delivery with HMAC-SHA256 over the raw request body, keyed by the integration's shared
//! secret. Platforms are inconsistent about whether the header carries a base64 or a hex encoding of the digest,
//! so both are accepted. Comparison is constant-time, and digest material is never logged — only lengths and the
//! boolean outcome.
use hmac::{Hmac, Mac};
use log::trace;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// The raw HMAC-SHA256 digest of `body` under `secret`.
pub fn calculate_signature(secret: &str, body: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any size");
    mac.update(body);
    mac.finalize().into_bytes().to_vec()
}

/// Verifies a signature header against the body. Returns true when the header matches either the base64 or the
/// hex encoding of the expected digest.
pub fn verify_webhook_signature(secret: &str, body: &[u8], provided: &str) -> bool {
    let digest = calculate_signature(secret, body);
    let b64 = base64::encode(&digest);
    let hex = hex_encode(&digest);
    let provided = provided.trim();
    let matched = constant_time_eq(provided.as_bytes(), b64.as_bytes()) |
        constant_time_eq(provided.as_bytes(), hex.as_bytes());
    trace!("🔐️ Signature check: header len {}, digest len {}, match: {matched}", provided.len(), digest.len());
    matched
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Length-leaking but content-constant-time comparison: a mismatched length returns false, equal-length inputs are
/// always scanned in full.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod test {
    use super::*;

    // RFC 4231 test case 2: key "Jefe", data "what do ya want for nothing?".
    const RFC4231_HEX: &str = "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843";

    #[test]
    fn hex_encoding_matches_rfc_vector() {
        let digest = calculate_signature("Jefe", b"what do ya want for nothing?");
        assert_eq!(hex_encode(&digest), RFC4231_HEX);
    }

    #[test]
    fn accepts_hex_and_base64_encodings() {
        let body = b"what do ya want for nothing?";
        assert!(verify_webhook_signature("Jefe", body, RFC4231_HEX));
        let b64 = base64::encode(calculate_signature("Jefe", body));
        assert!(verify_webhook_signature("Jefe", body, &b64));
    }

    #[test]
    fn rejects_wrong_secret_body_or_header() {
        let body = b"what do ya want for nothing?";
        assert!(!verify_webhook_signature("NotJefe", body, RFC4231_HEX));
        assert!(!verify_webhook_signature("Jefe", b"tampered body", RFC4231_HEX));
        assert!(!verify_webhook_signature("Jefe", body, "deadbeef"));
        assert!(!verify_webhook_signature("Jefe", body, ""));
    }

    #[test]
    fn constant_time_eq_basics() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }
}
