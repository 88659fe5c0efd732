//! Session token issuance and verification (JWT, HS512).
//!
//! The service holds the process-wide signing secret, injected once at
//! startup. Verification only accepts HS512 tokens signed with that secret;
//! the time window is checked separately through [`validate_claims`] so the
//! caller controls `now`.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use learnhub_core::AccountId;

use crate::claims::{
    DisplayClaims, SessionClaims, TokenValidationError, VerifiedClaims, timestamp, validate_claims,
};

/// Default session lifetime: one day.
pub const DEFAULT_TTL: Duration = Duration::from_millis(86_400_000);

const ALGORITHM: Algorithm = Algorithm::HS512;

/// Why a token was refused (or could not be produced).
///
/// Each verification failure stays distinct here; the HTTP layer decides how
/// much of it the client gets to see.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("token signature does not match")]
    BadSignature,

    #[error("token has expired")]
    Expired,

    #[error("unsupported token algorithm")]
    UnsupportedAlgorithm,

    #[error("token signing failed: {0}")]
    Signing(String),
}

/// A freshly issued token and its expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues and verifies signed, time-bounded session tokens.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl core::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenService")
            .field("algorithm", &ALGORITHM)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        let mut validation = Validation::new(ALGORITHM);
        // Time checks happen in `validate_claims` against an explicit clock.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.required_spec_claims =
            HashSet::from(["exp".to_string(), "iat".to_string(), "sub".to_string()]);

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, account_id: AccountId, display: DisplayClaims) -> Result<IssuedToken, TokenError> {
        self.issue_at(account_id, display, Utc::now())
    }

    pub fn issue_at(
        &self,
        account_id: AccountId,
        display: DisplayClaims,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        let ttl = chrono::Duration::from_std(self.ttl)
            .map_err(|e| TokenError::Signing(format!("ttl out of range: {e}")))?;
        let expires_at = now + ttl;

        let claims = SessionClaims {
            sub: account_id.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            email: display.email,
            username: display.username,
        };

        let token = jsonwebtoken::encode(&Header::new(ALGORITHM), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))?;

        Ok(IssuedToken { token, expires_at })
    }

    pub fn verify(&self, token: &str) -> Result<VerifiedClaims, TokenError> {
        self.verify_at(token, Utc::now())
    }

    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<VerifiedClaims, TokenError> {
        let data = jsonwebtoken::decode::<SessionClaims>(token, &self.decoding, &self.validation)
            .map_err(map_jwt_error)?;
        let claims = data.claims;

        validate_claims(&claims, now).map_err(|e| match e {
            TokenValidationError::Expired => TokenError::Expired,
            other => TokenError::Malformed(other.to_string()),
        })?;

        let account_id: AccountId = claims
            .sub
            .parse()
            .map_err(|_| TokenError::Malformed(format!("subject '{}' is not an account id", claims.sub)))?;

        Ok(VerifiedClaims {
            account_id,
            issued_at: timestamp(claims.iat).map_err(|e| TokenError::Malformed(e.to_string()))?,
            expires_at: timestamp(claims.exp).map_err(|e| TokenError::Malformed(e.to_string()))?,
            display: DisplayClaims {
                email: claims.email,
                username: claims.username,
            },
        })
    }
}

fn map_jwt_error(err: jsonwebtoken::errors::Error) -> TokenError {
    match err.kind() {
        ErrorKind::InvalidSignature => TokenError::BadSignature,
        ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName | ErrorKind::MissingAlgorithm => {
            TokenError::UnsupportedAlgorithm
        }
        ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::Malformed(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    const SECRET: &[u8] = b"unit-test-secret-that-is-long-enough-for-hs512";

    fn service() -> TokenService {
        TokenService::new(SECRET, DEFAULT_TTL)
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn issued_token_verifies_to_the_same_subject() {
        let svc = service();
        let issued = svc
            .issue(AccountId::new(17), DisplayClaims::new("a@example.com", "alice01"))
            .unwrap();
        let verified = svc.verify(&issued.token).unwrap();
        assert_eq!(verified.account_id, AccountId::new(17));
        assert_eq!(verified.display.email.as_deref(), Some("a@example.com"));
        assert_eq!(verified.expires_at, at(issued.expires_at.timestamp()));
    }

    #[test]
    fn token_expires_after_ttl() {
        let svc = TokenService::new(SECRET, Duration::from_secs(60));
        let issued = svc.issue_at(AccountId::new(1), DisplayClaims::default(), at(1_000)).unwrap();

        assert!(svc.verify_at(&issued.token, at(1_059)).is_ok());
        assert_eq!(svc.verify_at(&issued.token, at(1_060)), Err(TokenError::Expired));
        assert_eq!(svc.verify_at(&issued.token, at(5_000)), Err(TokenError::Expired));
    }

    #[test]
    fn token_from_another_secret_has_bad_signature() {
        let other = TokenService::new(b"some-other-secret-some-other-secret", DEFAULT_TTL);
        let issued = other.issue(AccountId::new(1), DisplayClaims::default()).unwrap();
        assert_eq!(service().verify(&issued.token), Err(TokenError::BadSignature));
    }

    #[test]
    fn tampered_payload_has_bad_signature() {
        let svc = service();
        let mine = svc.issue(AccountId::new(1), DisplayClaims::default()).unwrap();
        let theirs = svc.issue(AccountId::new(2), DisplayClaims::default()).unwrap();

        let mine_parts: Vec<&str> = mine.token.split('.').collect();
        let theirs_parts: Vec<&str> = theirs.token.split('.').collect();
        let forged = format!("{}.{}.{}", mine_parts[0], theirs_parts[1], mine_parts[2]);

        assert_eq!(svc.verify(&forged), Err(TokenError::BadSignature));
    }

    #[test]
    fn other_hmac_algorithm_is_unsupported() {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: "1".to_string(),
            iat: now.timestamp(),
            exp: now.timestamp() + 600,
            email: None,
            username: None,
        };
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();

        assert_eq!(service().verify(&token), Err(TokenError::UnsupportedAlgorithm));
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(service().verify("not-a-token"), Err(TokenError::Malformed(_))));
        assert!(matches!(service().verify(""), Err(TokenError::Malformed(_))));
        assert!(matches!(service().verify("a.b.c"), Err(TokenError::Malformed(_))));
    }

    #[test]
    fn non_numeric_subject_is_malformed() {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: "alice@example.com".to_string(),
            iat: now.timestamp(),
            exp: now.timestamp() + 600,
            email: None,
            username: None,
        };
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();

        assert!(matches!(service().verify(&token), Err(TokenError::Malformed(_))));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 64,
            ..ProptestConfig::default()
        })]

        /// Property: verification before expiry always yields the issued subject.
        #[test]
        fn subject_survives_issue_and_verify(id in 1i64..i64::MAX, offset in 0i64..86_399) {
            let svc = service();
            let issued_at = at(1_700_000_000);
            let issued = svc.issue_at(AccountId::new(id), DisplayClaims::default(), issued_at).unwrap();
            let verified = svc.verify_at(&issued.token, at(1_700_000_000 + offset)).unwrap();
            prop_assert_eq!(verified.account_id, AccountId::new(id));
        }
    }
}
