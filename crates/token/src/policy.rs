use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use bodyworn_protocol::constants::{
    TOKEN_DEFAULT_LIFETIME, TOKEN_MIN_REFRESH_DELAY, TOKEN_REFRESH_LEAD, TOKEN_RETRY_DELAY,
};

/// Timing of the refresh loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPolicy {
    /// Refresh this long before the token expires.
    pub lead: Duration,
    /// Never wait less than this between two successful fetches.
    pub min_delay: Duration,
    /// Wait after a failed fetch.
    pub retry_delay: Duration,
    /// Lifetime assumed when the device gives no usable expiry.
    pub default_lifetime: Duration,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            lead: TOKEN_REFRESH_LEAD,
            min_delay: TOKEN_MIN_REFRESH_DELAY,
            retry_delay: TOKEN_RETRY_DELAY,
            default_lifetime: TOKEN_DEFAULT_LIFETIME,
        }
    }
}

impl RefreshPolicy {
    /// Expiry to record for a token issued at `issued_at`.
    pub fn expiry(&self, issued_at: DateTime<Utc>, reported: Option<DateTime<Utc>>) -> DateTime<Utc> {
        reported.unwrap_or_else(|| {
            issued_at + TimeDelta::from_std(self.default_lifetime).unwrap_or_else(|_| TimeDelta::zero())
        })
    }

    pub fn next_delay(&self, expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
        refresh_delay(expires_at, now, self.lead, self.min_delay)
    }
}

/// `max(expires_at - lead - now, min_delay)`.
pub fn refresh_delay(
    expires_at: DateTime<Utc>,
    now: DateTime<Utc>,
    lead: Duration,
    min_delay: Duration,
) -> Duration {
    let until_refresh = (expires_at - now)
        .to_std()
        .unwrap_or_default()
        .saturating_sub(lead);
    until_refresh.max(min_delay)
}
