//! One-shot Digest-authenticated requests.

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, Url};
use tracing::trace;

use crate::challenge::obtain_challenge;
use crate::response::authorization_header;
use crate::{Credentials, DigestError};

/// HTTP client that authenticates every request with a fresh challenge.
///
/// Each call performs two round trips: the unauthenticated challenge
/// request and the authenticated request. No challenge state is kept
/// between calls.
#[derive(Clone)]
pub struct DigestClient {
    http: reqwest::Client,
    credentials: Credentials,
}

impl DigestClient {
    pub fn new(http: reqwest::Client, credentials: Credentials) -> Self {
        Self { http, credentials }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Sends `method url` with a Digest `Authorization` header.
    ///
    /// A non-empty `body` is sent as `application/json`. The response is
    /// returned whatever its status; callers decide what counts as success.
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        body: &str,
    ) -> Result<reqwest::Response, DigestError> {
        let parsed = Url::parse(url).map_err(|e| DigestError::InvalidUrl(format!("{url}: {e}")))?;

        let challenge = obtain_challenge(&self.http, url, method.clone(), body).await?;
        trace!(realm = %challenge.realm, "received digest challenge");

        let auth = authorization_header(&challenge, method.as_str(), parsed.path(), &self.credentials)?;

        let mut req = self
            .http
            .request(method, parsed)
            .header(AUTHORIZATION, auth);
        if !body.is_empty() {
            req = req
                .header(CONTENT_TYPE, "application/json")
                .body(body.to_string());
        }

        Ok(req.send().await?)
    }
}
