use std::time::Duration;

use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
    errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use crate::dao::models::{Millis, now_millis};

/// Payload of an HS256 access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: Uuid,
    pub username: String,
    /// Expiry, Unix seconds.
    pub exp: u64,
    /// Token id so concurrent sessions never share a digest. Absent on
    /// tokens minted by other issuers sharing the key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<Uuid>,
}

impl Claims {
    /// Expiry as Unix milliseconds, the unit used by stored timestamps.
    pub fn expires_at(&self) -> Millis {
        (self.exp as Millis).saturating_mul(1000)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("token signature mismatch")]
    BadSignature,
    #[error("token expired")]
    Expired,
    #[error("failed to sign token: {0}")]
    Signing(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature => TokenError::BadSignature,
            _ => TokenError::Malformed,
        }
    }
}

/// Freshly minted token together with its decoded claims.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: Claims,
}

/// Issues and verifies HS256 JWT access tokens.
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenCodec {
    pub fn new(key: &[u8], ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);
        Self {
            encoding: EncodingKey::from_secret(key),
            decoding: DecodingKey::from_secret(key),
            validation,
            ttl,
        }
    }

    /// Default lifetime applied by [`TokenCodec::issue`].
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(
        &self,
        user_id: Uuid,
        username: &str,
        ttl: Duration,
    ) -> Result<IssuedToken, TokenError> {
        let now_secs = (now_millis() / 1000).max(0) as u64;
        let claims = Claims {
            user_id,
            username: username.to_owned(),
            exp: now_secs + ttl.as_secs(),
            jti: Some(Uuid::new_v4()),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|err| TokenError::Signing(err.to_string()))?;
        Ok(IssuedToken { token, claims })
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        Ok(decode::<Claims>(token, &self.decoding, &self.validation)?.claims)
    }
}

/// Digest stored with a session instead of the bearer token itself.
pub fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn codec() -> TokenCodec {
        TokenCodec::new(b"secret", Duration::from_secs(60))
    }

    #[test]
    fn issued_tokens_verify() {
        let codec = codec();
        let id = Uuid::new_v4();
        let issued = codec.issue(id, "ada", codec.ttl()).unwrap();
        assert_eq!(issued.token.split('.').count(), 3);
        let claims = codec.verify(&issued.token).unwrap();
        assert_eq!(claims.user_id, id);
        assert_eq!(claims.username, "ada");
    }

    #[test]
    fn tokens_from_another_issuer_with_the_shared_key_verify() {
        let id = Uuid::new_v4();
        let exp = (now_millis() / 1000) as u64 + 600;
        let foreign = encode(
            &Header::default(),
            &json!({ "user_id": id, "username": "grace", "exp": exp }),
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();
        let claims = codec().verify(&foreign).unwrap();
        assert_eq!(claims.user_id, id);
        assert_eq!(claims.jti, None);
    }

    #[test]
    fn tampering_and_foreign_keys_are_rejected() {
        let codec = codec();
        let issued = codec.issue(Uuid::new_v4(), "ada", codec.ttl()).unwrap();
        let (signed, _) = issued.token.rsplit_once('.').unwrap();
        let forged = format!("{signed}.AAAA");
        assert_eq!(codec.verify(&forged), Err(TokenError::BadSignature));

        let other = TokenCodec::new(b"other", Duration::from_secs(60));
        assert_eq!(other.verify(&issued.token), Err(TokenError::BadSignature));
        assert_eq!(codec.verify("nonsense"), Err(TokenError::Malformed));
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let codec = codec();
        let id = Uuid::new_v4();
        let exp = (now_millis() / 1000) as u64 - 10;
        let stale = encode(
            &Header::default(),
            &json!({ "user_id": id, "username": "ada", "exp": exp }),
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();
        assert_eq!(codec.verify(&stale), Err(TokenError::Expired));
    }
}
