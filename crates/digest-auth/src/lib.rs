//! HTTP Digest authentication for the device API.
//!
//! Implements the RFC 2617 challenge/response exchange restricted to
//! `algorithm=MD5` and `qop=auth`, which is all the device offers:
//!
//! 1. [`obtain_challenge`] sends the request unauthenticated and parses the
//!    `WWW-Authenticate` header of the `401` reply into a [`Challenge`].
//! 2. [`authorization_header`] computes the `Authorization` value for the
//!    real request.
//!
//! [`DigestClient`] runs both steps for a single request.

mod challenge;
mod client;
mod response;

pub use challenge::{Challenge, obtain_challenge, parse_digest_params};
pub use client::DigestClient;
pub use response::{
    authorization_header, authorization_header_with_cnonce, compute_response, generate_cnonce,
};

/// Username and password presented to the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Errors produced by the Digest exchange.
#[derive(Debug, thiserror::Error)]
pub enum DigestError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("expected 401 Unauthorized, got {first} with {method} and {retry} with {alternate}")]
    NoChallenge {
        method: String,
        first: u16,
        alternate: String,
        retry: u16,
    },

    #[error("WWW-Authenticate header not found")]
    MissingHeader,

    #[error("failed to parse nonce or realm from WWW-Authenticate header")]
    ChallengeParse,

    #[error("unsupported algorithm: {0:?}")]
    UnsupportedAlgorithm(String),

    #[error("unsupported qop: {0:?}")]
    UnsupportedQop(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}
