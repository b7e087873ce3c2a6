use std::time::Duration;

use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::{AuthUser, hash_password, token_digest, verify_password},
    dao::{
        document_store::{Filter, Query},
        models::{
            Millis, now_millis,
            users::{User, UserPreference, UserSession},
        },
    },
    dto::users::{
        ChangePasswordRequest, ClientInfo, LoginRequest, PreferenceRequest, PreferenceResponse,
        PublicProfile, RegisterRequest, SessionResponse, TokenResponse, UpdateProfileRequest,
        UserResponse,
    },
    error::ServiceError,
    state::SharedState,
};

const TOPIC: &str = "users";
const REMEMBER_ME_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

fn hash(state: &SharedState, password: &str) -> Result<String, ServiceError> {
    hash_password(password, state.config().password_hash_cost)
        .map_err(|err| ServiceError::Internal(format!("password hashing failed: {err}")))
}

/// Create a new account; usernames and emails are unique (case-insensitive email).
pub async fn register(
    state: &SharedState,
    request: RegisterRequest,
) -> Result<UserResponse, ServiceError> {
    let users = state.repo::<User>().await?;
    let email = request.email.trim().to_lowercase();

    if users
        .find_one(Filter::eq("username", request.username.clone()))
        .await?
        .is_some()
    {
        return Err(ServiceError::Conflict("username already registered".into()));
    }
    if users
        .find_one(Filter::eq("email", email.clone()))
        .await?
        .is_some()
    {
        return Err(ServiceError::Conflict("email already registered".into()));
    }

    let now = now_millis();
    let user = User {
        id: Uuid::new_v4(),
        username: request.username,
        email,
        password_hash: hash(state, &request.password)?,
        display_name: request.display_name,
        avatar_url: None,
        bio: None,
        country: request.country.map(|code| code.to_uppercase()),
        is_active: true,
        email_verified: false,
        last_login_at: None,
        created_at: now,
        updated_at: now,
    };
    users.insert(&user).await?;

    info!(user_id = %user.id, username = %user.username, "user registered");
    state.events().publish(
        TOPIC,
        "user.registered",
        json!({ "user_id": user.id, "username": user.username }),
    );
    Ok(user.into())
}

/// Verify credentials, open a session and mint an access token.
pub async fn login(
    state: &SharedState,
    request: LoginRequest,
    client: ClientInfo,
) -> Result<TokenResponse, ServiceError> {
    let users = state.repo::<User>().await?;
    let login = request.username_or_email.trim();
    let mut user = users
        .find_one(
            Filter::eq("username", login).or(Filter::eq("email", login.to_lowercase())),
        )
        .await?
        .filter(|user| verify_password(&request.password, &user.password_hash))
        .ok_or_else(|| ServiceError::Unauthorized("invalid credentials".into()))?;

    if !user.is_active {
        return Err(ServiceError::Unauthorized("account is disabled".into()));
    }

    let ttl = if request.remember_me {
        REMEMBER_ME_TTL
    } else {
        state.tokens().ttl()
    };
    let issued = state
        .tokens()
        .issue(user.id, &user.username, ttl)
        .map_err(|err| ServiceError::Internal(err.to_string()))?;

    let now = now_millis();
    let session = UserSession {
        id: Uuid::new_v4(),
        user_id: user.id,
        token_hash: token_digest(&issued.token),
        user_agent: client.user_agent,
        ip_address: client.ip_address,
        revoked: false,
        created_at: now,
        expires_at: issued.claims.expires_at(),
    };
    state.repo::<UserSession>().await?.insert(&session).await?;

    user.last_login_at = Some(now);
    user.updated_at = now;
    users.replace(&user).await?;

    state
        .events()
        .publish(TOPIC, "user.logged_in", json!({ "user_id": user.id }));

    Ok(TokenResponse {
        access_token: issued.token,
        token_type: "bearer".into(),
        expires_in: ttl.as_secs(),
        user: user.into(),
    })
}

/// Resolve the caller to an active user holding a live session.
async fn authenticate(state: &SharedState, auth: &AuthUser) -> Result<User, ServiceError> {
    let session = state
        .repo::<UserSession>()
        .await?
        .find_one(
            Filter::id("user_id", auth.user_id)
                .and(Filter::eq("token_hash", token_digest(&auth.token)))
                .and(Filter::eq("revoked", false)),
        )
        .await?;
    if session.is_none() {
        return Err(ServiceError::Unauthorized("session revoked".into()));
    }

    state
        .repo::<User>()
        .await?
        .get(auth.user_id)
        .await?
        .filter(|user| user.is_active)
        .ok_or_else(|| ServiceError::Unauthorized("account not found or disabled".into()))
}

pub async fn me(state: &SharedState, auth: &AuthUser) -> Result<UserResponse, ServiceError> {
    Ok(authenticate(state, auth).await?.into())
}

pub async fn update_me(
    state: &SharedState,
    auth: &AuthUser,
    request: UpdateProfileRequest,
) -> Result<UserResponse, ServiceError> {
    let mut user = authenticate(state, auth).await?;
    if let Some(display_name) = request.display_name {
        user.display_name = Some(display_name);
    }
    if let Some(avatar_url) = request.avatar_url {
        user.avatar_url = Some(avatar_url);
    }
    if let Some(bio) = request.bio {
        user.bio = Some(bio);
    }
    if let Some(country) = request.country {
        user.country = Some(country.to_uppercase());
    }
    user.updated_at = now_millis();
    state.repo::<User>().await?.replace(&user).await?;
    Ok(user.into())
}

pub async fn change_password(
    state: &SharedState,
    auth: &AuthUser,
    request: ChangePasswordRequest,
) -> Result<(), ServiceError> {
    let mut user = authenticate(state, auth).await?;
    if !verify_password(&request.current_password, &user.password_hash) {
        return Err(ServiceError::InvalidInput(
            "current password is incorrect".into(),
        ));
    }
    user.password_hash = hash(state, &request.new_password)?;
    user.updated_at = now_millis();
    state.repo::<User>().await?.replace(&user).await?;
    info!(user_id = %user.id, "password changed");
    Ok(())
}

/// Revoke every open session of the caller.
pub async fn logout(state: &SharedState, auth: &AuthUser) -> Result<u64, ServiceError> {
    authenticate(state, auth).await?;
    let sessions = state.repo::<UserSession>().await?;
    let open = sessions
        .find_all(Filter::id("user_id", auth.user_id).and(Filter::eq("revoked", false)))
        .await?;
    let mut revoked = 0;
    for mut session in open {
        session.revoked = true;
        sessions.replace(&session).await?;
        revoked += 1;
    }
    state
        .events()
        .publish(TOPIC, "user.logged_out", json!({ "user_id": auth.user_id }));
    Ok(revoked)
}

pub async fn list_users(
    state: &SharedState,
    skip: u64,
    limit: u64,
) -> Result<Vec<UserResponse>, ServiceError> {
    let users = state
        .repo::<User>()
        .await?
        .find(Query::all().sort_asc("created_at").skip(skip).limit(limit))
        .await?;
    Ok(users.into_iter().map(Into::into).collect())
}

pub async fn get_profile(state: &SharedState, id: Uuid) -> Result<PublicProfile, ServiceError> {
    state
        .repo::<User>()
        .await?
        .get(id)
        .await?
        .map(Into::into)
        .ok_or_else(|| ServiceError::not_found("user"))
}

pub async fn list_preferences(
    state: &SharedState,
    auth: &AuthUser,
) -> Result<Vec<PreferenceResponse>, ServiceError> {
    let user = authenticate(state, auth).await?;
    let preferences = state
        .repo::<UserPreference>()
        .await?
        .find(Query::new(Filter::id("user_id", user.id)).sort_asc("key"))
        .await?;
    Ok(preferences.into_iter().map(Into::into).collect())
}

/// Create or overwrite a preference by key.
pub async fn upsert_preference(
    state: &SharedState,
    auth: &AuthUser,
    request: PreferenceRequest,
) -> Result<PreferenceResponse, ServiceError> {
    let user = authenticate(state, auth).await?;
    let preferences = state.repo::<UserPreference>().await?;
    let now = now_millis();
    let existing = preferences
        .find_one(Filter::id("user_id", user.id).and(Filter::eq("key", request.key.clone())))
        .await?;

    let preference = match existing {
        Some(mut preference) => {
            preference.value = request.value;
            preference.updated_at = now;
            preferences.replace(&preference).await?;
            preference
        }
        None => {
            let preference = UserPreference {
                id: Uuid::new_v4(),
                user_id: user.id,
                key: request.key,
                value: request.value,
                created_at: now,
                updated_at: now,
            };
            preferences.insert(&preference).await?;
            preference
        }
    };
    Ok(preference.into())
}

pub async fn update_preference(
    state: &SharedState,
    auth: &AuthUser,
    key: String,
    value: serde_json::Value,
) -> Result<PreferenceResponse, ServiceError> {
    let user = authenticate(state, auth).await?;
    let preferences = state.repo::<UserPreference>().await?;
    let mut preference = preferences
        .find_one(Filter::id("user_id", user.id).and(Filter::eq("key", key)))
        .await?
        .ok_or_else(|| ServiceError::not_found("preference"))?;
    preference.value = value;
    preference.updated_at = now_millis();
    preferences.replace(&preference).await?;
    Ok(preference.into())
}

/// Sessions of the caller that are neither revoked nor expired.
pub async fn active_sessions(
    state: &SharedState,
    auth: &AuthUser,
) -> Result<Vec<SessionResponse>, ServiceError> {
    let user = authenticate(state, auth).await?;
    let now: Millis = now_millis();
    let sessions = state
        .repo::<UserSession>()
        .await?
        .find(
            Query::new(
                Filter::id("user_id", user.id)
                    .and(Filter::eq("revoked", false))
                    .and(Filter::gt("expires_at", now)),
            )
            .sort_desc("created_at"),
        )
        .await?;
    Ok(sessions.into_iter().map(Into::into).collect())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::state::test_support::memory_state;

    fn registration(username: &str, email: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.into(),
            email: email.into(),
            password: "correct horse".into(),
            display_name: None,
            country: Some("fr".into()),
        }
    }

    async fn logged_in(state: &SharedState) -> AuthUser {
        register(state, registration("ada", "Ada@Example.com"))
            .await
            .unwrap();
        let token = login(
            state,
            LoginRequest {
                username_or_email: "ada@example.com".into(),
                password: "correct horse".into(),
                remember_me: false,
            },
            ClientInfo::default(),
        )
        .await
        .unwrap();
        let claims = state.tokens().verify(&token.access_token).unwrap();
        AuthUser {
            user_id: claims.user_id,
            username: claims.username,
            token: token.access_token,
        }
    }

    #[tokio::test]
    async fn duplicate_usernames_and_emails_conflict() {
        let state = memory_state().await;
        let created = register(&state, registration("ada", "ada@example.com"))
            .await
            .unwrap();
        assert_eq!(created.country.as_deref(), Some("FR"));

        let err = register(&state, registration("ada", "other@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
        let err = register(&state, registration("grace", "ADA@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn login_rejects_wrong_password() {
        let state = memory_state().await;
        register(&state, registration("ada", "ada@example.com"))
            .await
            .unwrap();
        let err = login(
            &state,
            LoginRequest {
                username_or_email: "ada".into(),
                password: "wrong".into(),
                remember_me: false,
            },
            ClientInfo::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn logout_revokes_the_session() {
        let state = memory_state().await;
        let auth = logged_in(&state).await;
        assert_eq!(me(&state, &auth).await.unwrap().username, "ada");
        assert_eq!(active_sessions(&state, &auth).await.unwrap().len(), 1);

        assert_eq!(logout(&state, &auth).await.unwrap(), 1);
        assert!(matches!(
            me(&state, &auth).await,
            Err(ServiceError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn change_password_requires_the_current_one() {
        let state = memory_state().await;
        let auth = logged_in(&state).await;
        let err = change_password(
            &state,
            &auth,
            ChangePasswordRequest {
                current_password: "nope".into(),
                new_password: "new password".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));

        change_password(
            &state,
            &auth,
            ChangePasswordRequest {
                current_password: "correct horse".into(),
                new_password: "new password".into(),
            },
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn preferences_upsert_by_key() {
        let state = memory_state().await;
        let auth = logged_in(&state).await;
        upsert_preference(
            &state,
            &auth,
            PreferenceRequest {
                key: "theme".into(),
                value: json!("dark"),
            },
        )
        .await
        .unwrap();
        upsert_preference(
            &state,
            &auth,
            PreferenceRequest {
                key: "theme".into(),
                value: json!("light"),
            },
        )
        .await
        .unwrap();

        let all = list_preferences(&state, &auth).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].value, json!("light"));

        let missing = update_preference(&state, &auth, "lang".into(), json!("fr")).await;
        assert!(matches!(missing, Err(ServiceError::NotFound(_))));
    }
}
