//! Data model shared across the token codec, repositories, and request handlers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sqlx::FromRow;

use crate::types::UserUuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
/// Persisted account row. `password_hash` is never serialised outbound —
/// handlers convert through [`UserResponse`] before returning a body.
pub struct User {
    pub id: i64,
    pub uuid: UserUuid,
    pub mobile: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub display_name: String,
    pub role: UserRole,
    pub disabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        matches!(self.role, UserRole::Admin | UserRole::SuperAdmin)
    }

    pub fn is_super_admin(&self) -> bool {
        matches!(self.role, UserRole::SuperAdmin)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Default)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
pub enum UserRole {
    #[default]
    User,
    Admin,
    SuperAdmin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Admin => "admin",
            UserRole::SuperAdmin => "super_admin",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin | UserRole::SuperAdmin)
    }
}

impl Serialize for UserRole {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for UserRole {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.as_str() {
            "user" => Ok(UserRole::User),
            "admin" => Ok(UserRole::Admin),
            "super_admin" => Ok(UserRole::SuperAdmin),
            other => Err(serde::de::Error::unknown_variant(
                other,
                &["user", "admin", "super_admin"],
            )),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
/// Public-facing view of a [`User`]; `password_hash` is blanked.
pub struct UserResponse {
    pub id: i64,
    pub uuid: String,
    pub mobile: String,
    pub display_name: String,
    pub role: String,
    pub disabled: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        UserResponse {
            id: user.id,
            uuid: user.uuid.to_string(),
            mobile: user.mobile,
            display_name: user.display_name,
            role: user.role.as_str().to_string(),
            disabled: user.disabled,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
/// A live refresh-token row. Owned by exactly one [`User`]; deleted on
/// rotation, logout, password reset, admin-disable, or sweep.
pub struct RefreshSession {
    pub id: i64,
    pub user_id: i64,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Transient pair returned to a caller; never persisted as such (only the
/// refresh token's fingerprint is stored, via [`RefreshSession`]).
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
    pub access_ttl_seconds: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    #[serde(rename = "type")]
    pub token_type: String,
    pub nonce: String,
    pub uid: i64,
    pub uuid: String,
    pub mobile: String,
    pub role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    #[serde(rename = "type")]
    pub token_type: String,
    pub nonce: String,
    pub uid: i64,
}

/// Verified access-token payload surfaced to handlers / peer `ValidateToken` callers.
#[derive(Debug, Clone)]
pub struct AccessPayload {
    pub user_id: i64,
    pub user_uuid: String,
    pub mobile: String,
    pub role: String,
    pub expires_at: DateTime<Utc>,
}

/// Per-request principal attached by the bearer-auth front after a
/// successful [`crate::token::codec::TokenCodec::verify_access`].
#[derive(Debug, Clone)]
pub struct AuthPrincipal {
    pub user_id: i64,
    pub user_uuid: String,
    pub mobile: String,
    pub role: UserRole,
}

/// Business context distinguishing why an SMS code was issued. String
/// serialisation is bit-exact with what the cache-key layout expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmsScene {
    Register,
    Login,
    ResetPassword,
    DeleteUser,
}

impl SmsScene {
    pub fn as_str(&self) -> &'static str {
        match self {
            SmsScene::Register => "register",
            SmsScene::Login => "login",
            SmsScene::ResetPassword => "reset_password",
            SmsScene::DeleteUser => "delete_user",
        }
    }
}

impl std::fmt::Display for SmsScene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A coordination-service-resident service instance, JSON-encoded as the
/// ephemeral node body under `{root}/{service}/{host:port}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceInstance {
    pub service_name: String,
    pub host: String,
    pub port: u16,
    #[serde(default = "default_weight")]
    pub weight: i64,
    #[serde(default)]
    pub metadata: std::collections::HashMap<String, String>,
}

fn default_weight() -> i64 {
    1
}

impl ServiceInstance {
    pub fn instance_id(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_valid(&self) -> bool {
        !self.host.is_empty() && self.port > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sms_scene_serialisation_is_bit_exact() {
        assert_eq!(SmsScene::Register.as_str(), "register");
        assert_eq!(SmsScene::Login.as_str(), "login");
        assert_eq!(SmsScene::ResetPassword.as_str(), "reset_password");
        assert_eq!(SmsScene::DeleteUser.as_str(), "delete_user");
    }

    #[test]
    fn user_role_round_trips_snake_case() {
        for role in [UserRole::User, UserRole::Admin, UserRole::SuperAdmin] {
            let json = serde_json::to_string(&role).unwrap();
            let back: UserRole = serde_json::from_str(&json).unwrap();
            assert_eq!(role, back);
        }
    }

    #[test]
    fn service_instance_rejects_empty_host_or_nonpositive_port() {
        let valid = ServiceInstance {
            service_name: "user-service".into(),
            host: "10.0.0.1".into(),
            port: 8080,
            weight: 1,
            metadata: Default::default(),
        };
        assert!(valid.is_valid());
        assert_eq!(valid.instance_id(), "10.0.0.1:8080");

        let invalid = ServiceInstance {
            host: String::new(),
            ..valid
        };
        assert!(!invalid.is_valid());
    }
}
