use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header::USER_AGENT},
    routing::{get, post, put},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    dto::{
        MessageResponse, SkipLimit,
        users::{
            ChangePasswordRequest, ClientInfo, LoginRequest, PreferenceRequest,
            PreferenceResponse, PreferenceValue, PublicProfile, RegisterRequest, SessionResponse,
            TokenResponse, UpdateProfileRequest, UserResponse,
        },
    },
    error::AppError,
    services::users_service,
    state::SharedState,
};

/// Account, session and preference endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me).put(update_me))
        .route("/change-password", post(change_password))
        .route("/logout", post(logout))
        .route("/users", get(list_users))
        .route("/users/{id}", get(get_user))
        .route("/preferences", get(list_preferences).post(upsert_preference))
        .route("/preferences/{key}", put(update_preference))
        .route("/sessions", get(list_sessions))
}

fn client_info(headers: &HeaderMap) -> ClientInfo {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned)
    };
    ClientInfo {
        user_agent: header(USER_AGENT.as_str()),
        ip_address: header("x-forwarded-for")
            .and_then(|chain| chain.split(',').next().map(|ip| ip.trim().to_owned()))
            .or_else(|| header("x-real-ip")),
    }
}

/// Register a new account.
#[utoipa::path(
    post,
    path = "/api/v1/users/register",
    tag = "users",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = UserResponse),
        (status = 409, description = "Username or email already taken")
    )
)]
pub async fn register(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<RegisterRequest>>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    let user = users_service::register(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Exchange credentials for a bearer token.
#[utoipa::path(
    post,
    path = "/api/v1/users/login",
    tag = "users",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = TokenResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Valid(Json(payload)): Valid<Json<LoginRequest>>,
) -> Result<Json<TokenResponse>, AppError> {
    let token = users_service::login(&state, payload, client_info(&headers)).await?;
    Ok(Json(token))
}

/// Profile of the authenticated caller.
#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    tag = "users",
    security(("bearer" = [])),
    responses((status = 200, description = "Current user", body = UserResponse))
)]
pub async fn me(
    State(state): State<SharedState>,
    auth: AuthUser,
) -> Result<Json<UserResponse>, AppError> {
    Ok(Json(users_service::me(&state, &auth).await?))
}

/// Update the caller's profile fields.
#[utoipa::path(
    put,
    path = "/api/v1/users/me",
    tag = "users",
    security(("bearer" = [])),
    request_body = UpdateProfileRequest,
    responses((status = 200, description = "Updated user", body = UserResponse))
)]
pub async fn update_me(
    State(state): State<SharedState>,
    auth: AuthUser,
    Valid(Json(payload)): Valid<Json<UpdateProfileRequest>>,
) -> Result<Json<UserResponse>, AppError> {
    Ok(Json(users_service::update_me(&state, &auth, payload).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/users/change-password",
    tag = "users",
    security(("bearer" = [])),
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Current password is wrong")
    )
)]
pub async fn change_password(
    State(state): State<SharedState>,
    auth: AuthUser,
    Valid(Json(payload)): Valid<Json<ChangePasswordRequest>>,
) -> Result<Json<MessageResponse>, AppError> {
    users_service::change_password(&state, &auth, payload).await?;
    Ok(Json(MessageResponse::new("Password updated")))
}

/// Revoke all sessions of the caller.
#[utoipa::path(
    post,
    path = "/api/v1/users/logout",
    tag = "users",
    security(("bearer" = [])),
    responses((status = 200, description = "Logged out", body = MessageResponse))
)]
pub async fn logout(
    State(state): State<SharedState>,
    auth: AuthUser,
) -> Result<Json<MessageResponse>, AppError> {
    let revoked = users_service::logout(&state, &auth).await?;
    Ok(Json(MessageResponse::new(format!(
        "Logged out ({revoked} session(s) revoked)"
    ))))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/users",
    tag = "users",
    params(SkipLimit),
    responses((status = 200, description = "Users", body = [UserResponse]))
)]
pub async fn list_users(
    State(state): State<SharedState>,
    Query(paging): Query<SkipLimit>,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    let (skip, limit) = paging.resolve(50, 100);
    Ok(Json(users_service::list_users(&state, skip, limit).await?))
}

/// Public profile lookup used by other services.
#[utoipa::path(
    get,
    path = "/api/v1/users/users/{id}",
    tag = "users",
    params(("id" = Uuid, Path, description = "User identifier")),
    responses(
        (status = 200, description = "Public profile", body = PublicProfile),
        (status = 404, description = "Unknown user")
    )
)]
pub async fn get_user(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PublicProfile>, AppError> {
    Ok(Json(users_service::get_profile(&state, id).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/preferences",
    tag = "users",
    security(("bearer" = [])),
    responses((status = 200, description = "Preferences", body = [PreferenceResponse]))
)]
pub async fn list_preferences(
    State(state): State<SharedState>,
    auth: AuthUser,
) -> Result<Json<Vec<PreferenceResponse>>, AppError> {
    Ok(Json(users_service::list_preferences(&state, &auth).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/users/preferences",
    tag = "users",
    security(("bearer" = [])),
    request_body = PreferenceRequest,
    responses((status = 200, description = "Preference stored", body = PreferenceResponse))
)]
pub async fn upsert_preference(
    State(state): State<SharedState>,
    auth: AuthUser,
    Valid(Json(payload)): Valid<Json<PreferenceRequest>>,
) -> Result<Json<PreferenceResponse>, AppError> {
    Ok(Json(
        users_service::upsert_preference(&state, &auth, payload).await?,
    ))
}

#[utoipa::path(
    put,
    path = "/api/v1/users/preferences/{key}",
    tag = "users",
    security(("bearer" = [])),
    params(("key" = String, Path, description = "Preference key")),
    request_body = PreferenceValue,
    responses(
        (status = 200, description = "Preference updated", body = PreferenceResponse),
        (status = 404, description = "Unknown preference")
    )
)]
pub async fn update_preference(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(key): Path<String>,
    Json(payload): Json<PreferenceValue>,
) -> Result<Json<PreferenceResponse>, AppError> {
    Ok(Json(
        users_service::update_preference(&state, &auth, key, payload.value).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/sessions",
    tag = "users",
    security(("bearer" = [])),
    responses((status = 200, description = "Active sessions", body = [SessionResponse]))
)]
pub async fn list_sessions(
    State(state): State<SharedState>,
    auth: AuthUser,
) -> Result<Json<Vec<SessionResponse>>, AppError> {
    Ok(Json(users_service::active_sessions(&state, &auth).await?))
}
