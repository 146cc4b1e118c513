//! Digest response computation and `Authorization` header construction.

use md5::{Digest, Md5};
use rand::Rng;

use crate::challenge::Challenge;
use crate::{Credentials, DigestError};

/// Client nonce length in bytes (16 hex characters).
const CNONCE_BYTES: usize = 8;

/// Generates a random client nonce as lowercase hex.
pub fn generate_cnonce() -> String {
    let mut bytes = [0u8; CNONCE_BYTES];
    rand::thread_rng().fill(&mut bytes);
    hex::encode(bytes)
}

/// Builds the `Authorization` header value for one request.
///
/// `uri` must be the request path without the query string.
pub fn authorization_header(
    challenge: &Challenge,
    method: &str,
    uri: &str,
    credentials: &Credentials,
) -> Result<String, DigestError> {
    authorization_header_with_cnonce(challenge, method, uri, credentials, &generate_cnonce())
}

/// Same as [`authorization_header`] with a caller-chosen client nonce.
pub fn authorization_header_with_cnonce(
    challenge: &Challenge,
    method: &str,
    uri: &str,
    credentials: &Credentials,
    cnonce: &str,
) -> Result<String, DigestError> {
    let response = compute_response(challenge, method, uri, credentials, cnonce)?;
    let nc = nonce_count_hex(challenge.nonce_count);

    let mut params = vec![
        format!(r#"username="{}""#, credentials.username),
        format!(r#"realm="{}""#, challenge.realm),
        format!(r#"uri="{uri}""#),
        format!(r#"algorithm="{}""#, challenge.algorithm),
        format!(r#"nonce="{}""#, challenge.nonce),
        format!("nc={nc}"),
        format!(r#"cnonce="{cnonce}""#),
        format!("qop={}", challenge.qop),
        format!(r#"response="{response}""#),
    ];
    if !challenge.opaque.is_empty() {
        params.push(format!(r#"opaque="{}""#, challenge.opaque));
    }

    Ok(format!("Digest {}", params.join(", ")))
}

/// Computes the `response` directive:
///
/// ```text
/// HA1 = MD5(username:realm:password)
/// HA2 = MD5(method:uri)
/// response = MD5(HA1:nonce:nc:cnonce:qop:HA2)
/// ```
pub fn compute_response(
    challenge: &Challenge,
    method: &str,
    uri: &str,
    credentials: &Credentials,
    cnonce: &str,
) -> Result<String, DigestError> {
    if !challenge.algorithm.is_empty() && !challenge.algorithm.eq_ignore_ascii_case("MD5") {
        return Err(DigestError::UnsupportedAlgorithm(challenge.algorithm.clone()));
    }
    if challenge.qop != "auth" {
        return Err(DigestError::UnsupportedQop(challenge.qop.clone()));
    }

    let ha1 = md5_hex(&format!(
        "{}:{}:{}",
        credentials.username, challenge.realm, credentials.password
    ));
    let ha2 = md5_hex(&format!("{method}:{uri}"));
    let nc = nonce_count_hex(challenge.nonce_count);

    Ok(md5_hex(&format!(
        "{ha1}:{}:{nc}:{cnonce}:{}:{ha2}",
        challenge.nonce, challenge.qop
    )))
}

fn nonce_count_hex(nc: u32) -> String {
    format!("{nc:08x}")
}

fn md5_hex(input: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}
