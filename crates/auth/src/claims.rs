use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use learnhub_core::AccountId;

/// Session token payload as it travels on the wire.
///
/// `email` and `username` are display claims only: the gate never reads
/// them when deciding access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject: the account id rendered as a decimal string.
    pub sub: String,

    /// Issued-at, seconds since the Unix epoch.
    pub iat: i64,

    /// Expiration, seconds since the Unix epoch.
    pub exp: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// Caller-supplied display claims embedded in an issued token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayClaims {
    pub email: Option<String>,
    pub username: Option<String>,
}

impl DisplayClaims {
    pub fn new(email: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            username: Some(username.into()),
        }
    }
}

/// Claims of a token whose signature and time window have been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedClaims {
    pub account_id: AccountId,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub display: DisplayClaims,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("invalid token time window (exp <= iat)")]
    InvalidTimeWindow,

    #[error("timestamp out of range")]
    TimestampOutOfRange,
}

/// Deterministically validate the claims' time window against `now`.
///
/// Note: this validates the *claims* only. Signature verification happens in
/// [`crate::token::TokenService`] before this is called.
pub fn validate_claims(claims: &SessionClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if claims.exp <= claims.iat {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    let expires_at = timestamp(claims.exp)?;
    if now >= expires_at {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

pub(crate) fn timestamp(secs: i64) -> Result<DateTime<Utc>, TokenValidationError> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or(TokenValidationError::TimestampOutOfRange)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(iat: i64, exp: i64) -> SessionClaims {
        SessionClaims {
            sub: "1".to_string(),
            iat,
            exp,
            email: None,
            username: None,
        }
    }

    #[test]
    fn accepts_token_inside_its_window() {
        let now = Utc.timestamp_opt(1_000, 0).unwrap();
        assert_eq!(validate_claims(&claims(900, 1_001), now), Ok(()));
    }

    #[test]
    fn expiry_is_exclusive() {
        let now = Utc.timestamp_opt(1_000, 0).unwrap();
        assert_eq!(
            validate_claims(&claims(900, 1_000), now),
            Err(TokenValidationError::Expired)
        );
    }

    #[test]
    fn rejects_inverted_window() {
        let now = Utc.timestamp_opt(1_000, 0).unwrap();
        assert_eq!(
            validate_claims(&claims(2_000, 2_000), now),
            Err(TokenValidationError::InvalidTimeWindow)
        );
    }

    #[test]
    fn display_claims_are_omitted_when_absent() {
        let json = serde_json::to_value(claims(1, 2)).unwrap();
        assert!(json.get("email").is_none());
        assert!(json.get("username").is_none());
    }
}
