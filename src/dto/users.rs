use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::users::{User, UserPreference, UserSession},
    dto::{format_millis, format_opt_millis, validation::validate_username},
};

/// Payload for creating an account.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct RegisterRequest {
    #[validate(custom(function = "validate_username"))]
    pub username: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    #[validate(length(max = 50))]
    pub display_name: Option<String>,
    #[validate(length(equal = 2))]
    pub country: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct LoginRequest {
    /// Username or email address.
    #[validate(length(min = 1))]
    pub username_or_email: String,
    #[validate(length(min = 1))]
    pub password: String,
    /// Extend the token lifetime to thirty days.
    #[serde(default)]
    pub remember_me: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    /// Token lifetime in seconds.
    pub expires_in: u64,
    pub user: UserResponse,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub country: Option<String>,
    pub is_active: bool,
    pub email_verified: bool,
    pub last_login_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            display_name: user.display_name,
            avatar_url: user.avatar_url,
            bio: user.bio,
            country: user.country,
            is_active: user.is_active,
            email_verified: user.email_verified,
            last_login_at: format_opt_millis(user.last_login_at),
            created_at: format_millis(user.created_at),
            updated_at: format_millis(user.updated_at),
        }
    }
}

/// Public projection served to sibling services for enrichment.
#[derive(Debug, Serialize, ToSchema)]
pub struct PublicProfile {
    pub id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl From<User> for PublicProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            display_name: user.display_name,
            avatar_url: user.avatar_url,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(max = 50))]
    pub display_name: Option<String>,
    #[validate(url)]
    pub avatar_url: Option<String>,
    #[validate(length(max = 500))]
    pub bio: Option<String>,
    #[validate(length(equal = 2))]
    pub country: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1))]
    pub current_password: String,
    #[validate(length(min = 8, max = 128))]
    pub new_password: String,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct PreferenceRequest {
    #[validate(length(min = 1, max = 100))]
    pub key: String,
    pub value: Value,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PreferenceValue {
    pub value: Value,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PreferenceResponse {
    pub key: String,
    pub value: Value,
    pub updated_at: String,
}

impl From<UserPreference> for PreferenceResponse {
    fn from(preference: UserPreference) -> Self {
        Self {
            key: preference.key,
            value: preference.value,
            updated_at: format_millis(preference.updated_at),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub id: Uuid,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: String,
    pub expires_at: String,
}

impl From<UserSession> for SessionResponse {
    fn from(session: UserSession) -> Self {
        Self {
            id: session.id,
            user_agent: session.user_agent,
            ip_address: session.ip_address,
            created_at: format_millis(session.created_at),
            expires_at: format_millis(session.expires_at),
        }
    }
}

/// Client metadata recorded with a new session.
#[derive(Debug, Default, Clone)]
pub struct ClientInfo {
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}
