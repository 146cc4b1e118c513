//! Challenge exchange and `WWW-Authenticate` parsing.

use reqwest::header::{CONTENT_TYPE, WWW_AUTHENTICATE};
use reqwest::{Method, StatusCode};
use tracing::debug;

use crate::DigestError;

/// Parameters of a Digest challenge.
///
/// `nonce_count` is the value sent as `nc`. One response is issued per
/// challenge, so it stays at 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub nonce: String,
    pub opaque: String,
    pub qop: String,
    pub realm: String,
    pub algorithm: String,
    pub nonce_count: u32,
}

impl Challenge {
    /// Parses a `WWW-Authenticate` header value.
    ///
    /// Unknown parameters are ignored. Fails when `nonce` or `realm` is
    /// missing; `algorithm` defaults to `MD5`.
    pub fn parse(header: &str) -> Result<Self, DigestError> {
        let mut challenge = Self {
            nonce: String::new(),
            opaque: String::new(),
            qop: String::new(),
            realm: String::new(),
            algorithm: String::new(),
            nonce_count: 1,
        };

        for (key, value) in parse_digest_params(header) {
            match key.as_str() {
                "nonce" => challenge.nonce = value,
                "realm" => challenge.realm = value,
                "qop" => challenge.qop = value,
                "opaque" => challenge.opaque = value,
                "algorithm" => challenge.algorithm = value,
                _ => {}
            }
        }

        if challenge.algorithm.is_empty() {
            challenge.algorithm = "MD5".into();
        }

        if challenge.nonce.is_empty() || challenge.realm.is_empty() {
            return Err(DigestError::ChallengeParse);
        }

        Ok(challenge)
    }
}

/// Splits a Digest header (challenge or credentials) into `key=value` pairs.
///
/// The leading `Digest` scheme token is skipped. Keys are lowercased;
/// quoted values are unquoted with backslash escapes resolved.
pub fn parse_digest_params(header: &str) -> Vec<(String, String)> {
    let mut rest = header.trim();
    if rest.get(..6).is_some_and(|s| s.eq_ignore_ascii_case("digest")) {
        rest = &rest[6..];
    }

    let mut params = Vec::new();
    let mut chars = rest.chars().peekable();

    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace() || *c == ',') {
            chars.next();
        }

        let mut key = String::new();
        while let Some(&c) = chars.peek() {
            if c == '=' || c == ',' || c.is_whitespace() {
                break;
            }
            key.push(c);
            chars.next();
        }
        if key.is_empty() {
            break;
        }

        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        if chars.peek() != Some(&'=') {
            // Bare token without a value.
            continue;
        }
        chars.next();
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }

        let mut value = String::new();
        if chars.peek() == Some(&'"') {
            chars.next();
            while let Some(c) = chars.next() {
                match c {
                    '"' => break,
                    '\\' => {
                        if let Some(escaped) = chars.next() {
                            value.push(escaped);
                        }
                    }
                    other => value.push(other),
                }
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c == ',' {
                    break;
                }
                value.push(c);
                chars.next();
            }
            value = value.trim_end().to_string();
        }

        params.push((key.to_ascii_lowercase(), value));
    }

    params
}

/// Requests a Digest challenge for `url`.
///
/// The request is first sent with `method`. Some device endpoints only
/// challenge one method before authentication, so when the reply is not
/// `401` the request is retried once with the opposite method (GET/POST).
pub async fn obtain_challenge(
    http: &reqwest::Client,
    url: &str,
    method: Method,
    body: &str,
) -> Result<Challenge, DigestError> {
    let resp = send_unauthenticated(http, url, &method, body).await?;

    let resp = if resp.status() == StatusCode::UNAUTHORIZED {
        resp
    } else {
        let first = resp.status();
        let alternate = opposite(&method);
        debug!(%url, %method, status = first.as_u16(), "no challenge, retrying with {alternate}");

        let retry = send_unauthenticated(http, url, &alternate, body).await?;
        if retry.status() != StatusCode::UNAUTHORIZED {
            return Err(DigestError::NoChallenge {
                method: method.to_string(),
                first: first.as_u16(),
                alternate: alternate.to_string(),
                retry: retry.status().as_u16(),
            });
        }
        retry
    };

    let header = resp
        .headers()
        .get(WWW_AUTHENTICATE)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or(DigestError::MissingHeader)?;

    Challenge::parse(header)
}

async fn send_unauthenticated(
    http: &reqwest::Client,
    url: &str,
    method: &Method,
    body: &str,
) -> Result<reqwest::Response, DigestError> {
    let req = if *method == Method::POST {
        http.post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_string())
    } else {
        http.get(url)
    };
    Ok(req.send().await?)
}

fn opposite(method: &Method) -> Method {
    if *method == Method::GET {
        Method::POST
    } else {
        Method::GET
    }
}
