use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::Millis;
use crate::dao::document_store::Entity;

/// Registered account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    /// `salt$digest` produced by the password hasher.
    pub password_hash: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub country: Option<String>,
    pub is_active: bool,
    pub email_verified: bool,
    pub last_login_at: Option<Millis>,
    pub created_at: Millis,
    pub updated_at: Millis,
}

impl Entity for User {
    const COLLECTION: &'static str = "users";
    const UNIQUE_KEYS: &'static [&'static [&'static str]] = &[&["username"], &["email"]];

    fn id(&self) -> Uuid {
        self.id
    }
}

/// Login session; the access token itself is never stored, only its digest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub revoked: bool,
    pub created_at: Millis,
    pub expires_at: Millis,
}

impl Entity for UserSession {
    const COLLECTION: &'static str = "user_sessions";

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserPreference {
    pub id: Uuid,
    pub user_id: Uuid,
    pub key: String,
    pub value: Value,
    pub created_at: Millis,
    pub updated_at: Millis,
}

impl Entity for UserPreference {
    const COLLECTION: &'static str = "user_preferences";
    const UNIQUE_KEYS: &'static [&'static [&'static str]] = &[&["user_id", "key"]];

    fn id(&self) -> Uuid {
        self.id
    }
}
