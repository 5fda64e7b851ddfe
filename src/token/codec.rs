//! Twin-token codec (§4.D): issues and validates the bearer/refresh pair
//! and computes the deterministic storage fingerprint of a refresh token.
//!
//! Each envelope is `base64url(header).base64url(claims).base64url(HMAC-SHA256(K, header.claims))`,
//! which is exactly what `jsonwebtoken`'s HS256 encoder produces, so the
//! envelope itself is delegated to that crate. `Fingerprint` deliberately
//! does *not* reuse the password hasher's Argon2 (which is salted and
//! non-deterministic) — the store needs an exact-match lookup key, so a
//! plain SHA-256 hex digest is used instead.

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{AppError, ErrorCode};
use crate::models::{AccessClaims, AccessPayload, RefreshClaims, TokenPair, User};

#[derive(Clone)]
pub struct TokenCodec {
    secret: String,
    issuer: String,
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
}

impl TokenCodec {
    pub fn new(secret: String, issuer: String, access_ttl_seconds: i64, refresh_ttl_seconds: i64) -> Self {
        Self {
            secret,
            issuer,
            access_ttl_seconds,
            refresh_ttl_seconds,
        }
    }

    /// Produces two independently-signed envelopes. `iat` plus a random
    /// nonce guarantee that envelopes for the same user at different clock
    /// instants differ even at sub-second resolution (invariant 2/3).
    pub fn issue(&self, user: &User) -> Result<TokenPair, AppError> {
        let now = Utc::now().timestamp();
        let key = EncodingKey::from_secret(self.secret.as_bytes());
        let header = Header::new(Algorithm::HS256);

        let access_claims = AccessClaims {
            iss: self.issuer.clone(),
            iat: now,
            exp: now + self.access_ttl_seconds,
            token_type: "access".to_string(),
            nonce: Uuid::new_v4().to_string(),
            uid: user.id,
            uuid: user.uuid.to_string(),
            mobile: user.mobile.clone(),
            role: user.role.as_str().to_string(),
        };
        let access = encode(&header, &access_claims, &key)
            .map_err(|err| AppError::new(ErrorCode::Internal, err.to_string()))?;

        let refresh_claims = RefreshClaims {
            iss: self.issuer.clone(),
            iat: now,
            exp: now + self.refresh_ttl_seconds,
            token_type: "refresh".to_string(),
            nonce: Uuid::new_v4().to_string(),
            uid: user.id,
        };
        let refresh = encode(&header, &refresh_claims, &key)
            .map_err(|err| AppError::new(ErrorCode::Internal, err.to_string()))?;

        Ok(TokenPair {
            access,
            refresh,
            access_ttl_seconds: self.access_ttl_seconds,
        })
    }

    pub fn refresh_ttl_seconds(&self) -> i64 {
        self.refresh_ttl_seconds
    }

    pub fn verify_access(&self, token: &str) -> Result<AccessPayload, AppError> {
        if token.is_empty() {
            return Err(AppError::new(ErrorCode::TokenMissing, "access token missing"));
        }
        if token.split('.').count() != 3 {
            return Err(AppError::new(ErrorCode::TokenInvalid, "malformed token"));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.validate_exp = false; // checked explicitly to distinguish TokenExpired from TokenInvalid

        let key = DecodingKey::from_secret(self.secret.as_bytes());
        let data = decode::<AccessClaims>(token, &key, &validation)
            .map_err(|_| AppError::new(ErrorCode::TokenInvalid, "invalid signature or issuer"))?;

        if data.claims.token_type != "access" {
            return Err(AppError::new(ErrorCode::TokenInvalid, "wrong token type"));
        }
        if data.claims.exp <= Utc::now().timestamp() {
            return Err(AppError::new(ErrorCode::TokenExpired, "access token expired"));
        }

        Ok(AccessPayload {
            user_id: data.claims.uid,
            user_uuid: data.claims.uuid,
            mobile: data.claims.mobile,
            role: data.claims.role,
            expires_at: chrono::DateTime::from_timestamp(data.claims.exp, 0).unwrap_or_else(Utc::now),
        })
    }

    /// Returns the refresh token's subject user id after validating its
    /// signature, issuer, type, and expiry.
    pub fn parse_refresh(&self, token: &str) -> Result<i64, AppError> {
        if token.is_empty() {
            return Err(AppError::new(ErrorCode::TokenMissing, "refresh token missing"));
        }
        if token.split('.').count() != 3 {
            return Err(AppError::new(ErrorCode::TokenInvalid, "malformed token"));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.validate_exp = false;

        let key = DecodingKey::from_secret(self.secret.as_bytes());
        let data = decode::<RefreshClaims>(token, &key, &validation)
            .map_err(|_| AppError::new(ErrorCode::TokenInvalid, "invalid signature or issuer"))?;

        if data.claims.token_type != "refresh" {
            return Err(AppError::new(ErrorCode::TokenInvalid, "wrong token type"));
        }
        if data.claims.exp <= Utc::now().timestamp() {
            return Err(AppError::new(ErrorCode::TokenExpired, "refresh token expired"));
        }

        Ok(data.claims.uid)
    }

    /// Deterministic, collision-resistant storage key: lower-hex SHA-256 of
    /// the raw token.
    pub fn fingerprint(token: &str) -> String {
        let digest = Sha256::digest(token.as_bytes());
        hex::encode(digest)
    }
}
