use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{models::UserId, Error, Result};

/// Access token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: String,
    /// Role codes at issue time
    #[serde(default)]
    pub roles: Vec<String>,
    pub typ: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn user_id(&self) -> Result<UserId> {
        self.sub
            .parse()
            .map_err(|_| Error::Authentication(format!("Invalid subject in token: {}", self.sub)))
    }

    #[must_use]
    pub fn is_access_token(&self) -> bool {
        self.typ == "access"
    }
}

/// Signs and verifies HS256 access tokens handed out after WeChat sign-in
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: Arc<EncodingKey>,
    decoding_key: Arc<DecodingKey>,
    access_ttl: Duration,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("algorithm", &Algorithm::HS256)
            .field("access_ttl", &self.access_ttl)
            .finish()
    }
}

impl TokenIssuer {
    #[must_use]
    pub fn new(secret: &str, access_token_hours: u64) -> Self {
        // capped at a century
        let hours = i64::try_from(access_token_hours.min(876_000)).unwrap_or(24);
        Self {
            encoding_key: Arc::new(EncodingKey::from_secret(secret.as_bytes())),
            decoding_key: Arc::new(DecodingKey::from_secret(secret.as_bytes())),
            access_ttl: Duration::hours(hours),
        }
    }

    pub fn issue(&self, user_id: UserId, roles: &[String]) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            roles: roles.to_vec(),
            typ: "access".to_string(),
            iat: now.timestamp(),
            exp: (now + self.access_ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| Error::Internal(format!("Failed to sign token: {e}")))
    }

    pub fn verify(&self, token: &str) -> Result<Claims> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| Error::Authentication(format!("Invalid token: {e}")))?;

        if !data.claims.is_access_token() {
            return Err(Error::Authentication("Not an access token".to_string()));
        }
        Ok(data.claims)
    }
}
