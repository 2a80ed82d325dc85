//! JWT access token issuing and verification.

use super::errors::{AuthError, AuthResult};
use super::models::{AccessTokenClaims, UserId, Viewer, ViewerRole};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};

/// Shortest accepted signing secret
pub const MIN_SECRET_LEN: usize = 32;

/// Default access token lifetime in seconds
pub const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 900;

/// Signs and verifies access tokens with a shared HMAC secret.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetime: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    /// Create a token service. Rejects secrets shorter than 32 characters.
    pub fn new(secret: &str) -> AuthResult<Self> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(AuthError::WeakSecret(MIN_SECRET_LEN));
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            lifetime: Duration::seconds(DEFAULT_TOKEN_LIFETIME_SECS),
        })
    }

    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Issue an access token for a user
    pub fn issue(&self, user_id: UserId, username: &str, role: ViewerRole) -> AuthResult<String> {
        let now = Utc::now();
        let claims = AccessTokenClaims {
            sub: user_id,
            username: username.to_string(),
            role,
            exp: (now + self.lifetime).timestamp(),
            iat: now.timestamp(),
        };

        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    /// Verify an access token
    pub fn verify(&self, token: &str) -> AuthResult<AccessTokenClaims> {
        let token_data = decode::<AccessTokenClaims>(token, &self.decoding, &Validation::default())?;
        Ok(token_data.claims)
    }

    /// Resolve an optional token into a viewer. No token means anonymous;
    /// a token that fails verification is an error.
    pub fn viewer_from_token(&self, token: Option<&str>) -> AuthResult<Viewer> {
        match token {
            None => Ok(Viewer::Anonymous),
            Some(token) => Ok(self.verify(token)?.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "an-adequately-long-test-secret-for-hmac";

    #[test]
    fn test_issue_and_verify() {
        let tokens = TokenService::new(SECRET).unwrap();
        let token = tokens.issue(42, "judge.anna", ViewerRole::Judge).unwrap();

        let claims = tokens.verify(&token).unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.role, ViewerRole::Judge);

        let viewer = tokens.viewer_from_token(Some(&token)).unwrap();
        assert_eq!(viewer.user_id(), Some(42));
        assert!(!viewer.is_manager());
    }

    #[test]
    fn test_missing_token_is_anonymous() {
        let tokens = TokenService::new(SECRET).unwrap();
        assert_eq!(tokens.viewer_from_token(None).unwrap(), Viewer::Anonymous);
    }

    #[test]
    fn test_rejects_foreign_and_expired_tokens() {
        let tokens = TokenService::new(SECRET).unwrap();
        let other = TokenService::new("another-adequately-long-test-secret!!").unwrap();

        let foreign = other.issue(1, "staff", ViewerRole::Staff).unwrap();
        assert!(tokens.verify(&foreign).is_err());
        assert!(tokens.verify("not-a-token").is_err());

        let expired = tokens
            .clone()
            .with_lifetime(Duration::hours(-1))
            .issue(1, "staff", ViewerRole::Staff)
            .unwrap();
        let err = tokens.viewer_from_token(Some(&expired)).unwrap_err();
        assert_eq!(err.client_message(), "Authentication failed");
    }

    #[test]
    fn test_short_secret_rejected() {
        assert!(matches!(
            TokenService::new("short"),
            Err(AuthError::WeakSecret(32))
        ));
    }
}
