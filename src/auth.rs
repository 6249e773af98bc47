//! Password hashing, bearer tokens and the identity extractors guarding
//! account and admin routes.
//!
//! Tokens are HS256 JWTs carrying the account id and a role. A business
//! token never opens admin routes. Both extractors reload the account on
//! every request: a token outlives neither its row nor a disabled business.

use std::future::Future;
use std::pin::Pin;
use std::sync::OnceLock;

use actix_web::{dev::Payload, http::header, web, FromRequest, HttpRequest};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::DirectoryStore;
use crate::error::ApiError;
use crate::models::{Admin, Business};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing bearer token")]
    MissingToken,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Insufficient permissions")]
    WrongRole,

    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error("token encoding failed: {0}")]
    Encode(#[from] jsonwebtoken::errors::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Business,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

impl Claims {
    pub fn account_id(&self) -> Result<i64, AuthError> {
        self.sub.parse().map_err(|_| AuthError::InvalidToken)
    }
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AuthError::Hash(err.to_string()))
}

/// A stored hash that does not parse never verifies.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(err) => {
            log::warn!("Stored password hash is malformed: {err}");
            false
        }
    }
}

fn dummy_hash() -> &'static str {
    static DUMMY: OnceLock<String> = OnceLock::new();
    DUMMY.get_or_init(|| hash_password("pecanozap-unknown-account").unwrap_or_default())
}

/// Checks a login attempt. Unknown accounts still pay for one argon2 run
/// against a throwaway hash and always fail.
pub fn verify_login(password: &str, password_hash: Option<&str>) -> bool {
    match password_hash {
        Some(hash) => verify_password(password, hash),
        None => {
            verify_password(password, dummy_hash());
            false
        }
    }
}

/// Signing keys and token lifetime, shared through `web::Data`.
pub struct AuthConfig {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl AuthConfig {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::hours(ttl_hours),
        }
    }

    pub fn ttl_seconds(&self) -> i64 {
        self.ttl.num_seconds()
    }

    pub fn issue_token(&self, account_id: i64, email: &str, role: Role) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: account_id.to_string(),
            email: email.to_string(),
            role,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    pub fn decode_token(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map(|data| data.claims)
            .map_err(|err| {
                log::debug!("Rejected token: {err}");
                AuthError::InvalidToken
            })
    }
}

fn bearer_claims(req: &HttpRequest) -> Result<Claims, ApiError> {
    let auth = req
        .app_data::<web::Data<AuthConfig>>()
        .ok_or_else(|| ApiError::Internal("AuthConfig is not registered".into()))?;

    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::MissingToken)?;

    Ok(auth.decode_token(token)?)
}

type IdentityFuture<T> = Pin<Box<dyn Future<Output = Result<T, ApiError>>>>;

fn registered_store(req: &HttpRequest) -> Option<web::Data<dyn DirectoryStore>> {
    req.app_data::<web::Data<dyn DirectoryStore>>().cloned()
}

/// Authenticated business owner, reloaded on every request
#[derive(Debug, Clone)]
pub struct BusinessIdentity {
    pub business: Business,
}

impl FromRequest for BusinessIdentity {
    type Error = ApiError;
    type Future = IdentityFuture<Self>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let claims = bearer_claims(req);
        let store = registered_store(req);

        Box::pin(async move {
            let claims = claims?;
            if claims.role != Role::Business {
                return Err(AuthError::WrongRole.into());
            }
            let store =
                store.ok_or_else(|| ApiError::Internal("DirectoryStore is not registered".into()))?;

            let business = store
                .get_business(claims.account_id()?)
                .await?
                .ok_or_else(|| ApiError::Unauthorized("Account no longer exists".into()))?;
            if !business.is_active {
                return Err(ApiError::Forbidden("Account is disabled".into()));
            }
            Ok(Self { business })
        })
    }
}

/// Authenticated administrator, looked up on every request
#[derive(Debug, Clone)]
pub struct AdminIdentity {
    pub admin: Admin,
}

impl FromRequest for AdminIdentity {
    type Error = ApiError;
    type Future = IdentityFuture<Self>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let claims = bearer_claims(req);
        let store = registered_store(req);

        Box::pin(async move {
            let claims = claims?;
            if claims.role != Role::Admin {
                return Err(AuthError::WrongRole.into());
            }
            let store =
                store.ok_or_else(|| ApiError::Internal("DirectoryStore is not registered".into()))?;

            let admin = store
                .get_admin(claims.account_id()?)
                .await?
                .ok_or_else(|| ApiError::Unauthorized("Administrator no longer exists".into()))?;
            Ok(Self { admin })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_round_trip() {
        let hash = hash_password("segredo123").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("segredo123", &hash));
        assert!(!verify_password("segredo124", &hash));
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        let a = hash_password("segredo123").unwrap();
        let b = hash_password("segredo123").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn malformed_hash_never_verifies() {
        assert!(!verify_password("anything", "plaintext"));
    }

    #[test]
    fn unknown_account_never_verifies() {
        assert!(dummy_hash().starts_with("$argon2id$"));
        assert!(!verify_login("pecanozap-unknown-account", None));
        assert!(!verify_login("", None));

        let hash = hash_password("segredo123").unwrap();
        assert!(verify_login("segredo123", Some(&hash)));
        assert!(!verify_login("segredo124", Some(&hash)));
    }

    #[test]
    fn token_carries_identity() {
        let auth = AuthConfig::new("test-secret", 24);
        let token = auth.issue_token(42, "a@x.com", Role::Business).unwrap();
        let claims = auth.decode_token(&token).unwrap();

        assert_eq!(claims.account_id().unwrap(), 42);
        assert_eq!(claims.email, "a@x.com");
        assert_eq!(claims.role, Role::Business);
        assert_eq!(claims.exp - claims.iat, 24 * 3600);
        assert_eq!(auth.ttl_seconds(), 24 * 3600);
    }

    #[test]
    fn token_ids_are_unique() {
        let auth = AuthConfig::new("test-secret", 1);
        let a = auth.decode_token(&auth.issue_token(1, "a@x.com", Role::Admin).unwrap());
        let b = auth.decode_token(&auth.issue_token(1, "a@x.com", Role::Admin).unwrap());
        assert_ne!(a.unwrap().jti, b.unwrap().jti);
    }

    #[test]
    fn foreign_signature_is_rejected() {
        let ours = AuthConfig::new("test-secret", 1);
        let theirs = AuthConfig::new("other-secret", 1);
        let token = theirs.issue_token(1, "a@x.com", Role::Admin).unwrap();
        assert!(matches!(
            ours.decode_token(&token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let auth = AuthConfig::new("test-secret", 1);
        let past = Utc::now() - Duration::hours(3);
        let claims = Claims {
            sub: "1".into(),
            email: "a@x.com".into(),
            role: Role::Business,
            iat: past.timestamp(),
            exp: (past + Duration::hours(1)).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };
        let token = encode(&Header::default(), &claims, &auth.encoding).unwrap();
        assert!(matches!(
            auth.decode_token(&token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn garbage_is_rejected() {
        let auth = AuthConfig::new("test-secret", 1);
        assert!(auth.decode_token("not.a.token").is_err());
    }
}
