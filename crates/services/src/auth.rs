use async_trait::async_trait;
use bson::oid::ObjectId;
use chrono::Utc;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use studyroom_config::JwtSettings;
use studyroom_db::models::{AuthorSnapshot, UserRole};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing credential")]
    MissingCredential,
    #[error("Token expired")]
    TokenExpired,
    #[error("Invalid token: {0}")]
    InvalidToken(String),
    #[error("Token encoding failed: {0}")]
    Encoding(String),
}

/// Who is behind a request or a realtime connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: ObjectId,
    pub name: String,
    pub role: UserRole,
}

impl Identity {
    pub fn is_privileged(&self) -> bool {
        self.role.is_privileged()
    }

    pub fn snapshot(&self) -> AuthorSnapshot {
        AuthorSnapshot {
            user_id: self.id,
            name: self.name.clone(),
            role: self.role,
        }
    }
}

/// Resolves an opaque credential to an identity. Shared by the REST
/// extractor and the WebSocket handshake.
#[async_trait]
pub trait IdentityLookup: Send + Sync {
    async fn resolve(&self, credential: &str) -> Result<Identity, AuthError>;
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub name: String,
    #[serde(default)]
    pub role: UserRole,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

/// HS256 bearer tokens carrying the identity in their claims.
pub struct JwtIdentityLookup {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    issuer: String,
    ttl_secs: i64,
}

impl JwtIdentityLookup {
    pub fn new(settings: &JwtSettings) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[settings.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        Self {
            encoding: EncodingKey::from_secret(settings.secret.as_bytes()),
            decoding: DecodingKey::from_secret(settings.secret.as_bytes()),
            validation,
            issuer: settings.issuer.clone(),
            ttl_secs: settings.access_token_ttl_secs,
        }
    }

    pub fn issue(&self, identity: &Identity) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: identity.id.to_hex(),
            name: identity.name.clone(),
            role: identity.role,
            iss: self.issuer.clone(),
            iat: now,
            exp: now + self.ttl_secs,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Encoding(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken(e.to_string()),
            })
    }
}

#[async_trait]
impl IdentityLookup for JwtIdentityLookup {
    async fn resolve(&self, credential: &str) -> Result<Identity, AuthError> {
        let credential = credential.trim();
        if credential.is_empty() {
            return Err(AuthError::MissingCredential);
        }
        let claims = self.verify(credential)?;
        let id = ObjectId::parse_str(&claims.sub)
            .map_err(|_| AuthError::InvalidToken("Invalid subject".to_string()))?;
        Ok(Identity {
            id,
            name: claims.name,
            role: claims.role,
        })
    }
}
