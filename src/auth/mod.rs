pub mod password;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::database::Document;

/// Signed identity carried by bearer tokens: the user record minus its password,
/// plus `iat` and (when configured) `exp`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenPayload(Document);

impl TokenPayload {
    /// Build a payload from a stored user, dropping the password hash.
    pub fn from_user(mut user: Document) -> Self {
        user.remove("password");
        Self(user)
    }

    pub fn username(&self) -> Option<&str> {
        self.0.get("username").and_then(Value::as_str)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct TokenOptions {
    /// Lifetime of issued tokens; `None` issues tokens that never expire.
    pub expires_in: Option<Duration>,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("JWT generation error: {0}")]
    Signing(String),
    #[error("{0}")]
    Invalid(String),
    #[error("Failed Authentication")]
    EmptyPayload,
}

/// HS256 signer/verifier bound to one secret.
#[derive(Clone)]
pub struct TokenSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    options: TokenOptions,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner").field("options", &self.options).finish_non_exhaustive()
    }
}

impl TokenSigner {
    pub fn new(secret: &str, options: TokenOptions) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            options,
        }
    }

    pub fn sign(&self, payload: &TokenPayload) -> Result<String, TokenError> {
        let now = Utc::now();
        let mut claims = payload.0.clone();
        claims.insert("iat".into(), now.timestamp().into());
        if let Some(expires_in) = self.options.expires_in {
            claims.insert("exp".into(), (now + expires_in).timestamp().into());
        }

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<TokenPayload, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // tokens without `exp` are valid; `exp` is still checked when present
        validation.required_spec_claims.clear();
        validation.validate_aud = false;

        let data = decode::<Document>(token, &self.decoding_key, &validation)
            .map_err(|e| TokenError::Invalid(e.to_string()))?;

        let payload = TokenPayload(data.claims);
        if payload.is_empty() {
            return Err(TokenError::EmptyPayload);
        }
        Ok(payload)
    }
}
