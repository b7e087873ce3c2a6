use std::convert::Infallible;

use axum::{
    Json, Router,
    extract::{
        Path, Query, State, WebSocketUpgrade, ws::rejection::WebSocketUpgradeRejection,
    },
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event, Sse},
    },
    routing::{get, post},
};
use axum_valid::Valid;
use futures::Stream;
use uuid::Uuid;

use crate::{
    dto::{
        MessageResponse,
        online::{
            ChatMessageResponse, ConversationParams, CreateLobbyRequest, JoinLobbyRequest,
            LobbyListParams, LobbyMessageRequest, LobbyMessageResponse, LobbyResponse,
            LobbyUserParams, PresenceListParams, PresenceResponse, PresenceUpdate, ReadyParams,
            SendMessageRequest,
        },
    },
    error::AppError,
    services::{online_service, sse_service, websocket_service},
    state::SharedState,
};

/// Presence, direct messages and multiplayer lobbies.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/presence", get(list_presence).post(update_presence))
        .route("/presence/{user_id}", get(get_presence))
        .route("/messages", get(conversation).post(send_message))
        .route("/lobbies", get(list_lobbies).post(create_lobby))
        .route("/lobbies/{id}", get(get_lobby))
        .route("/lobbies/{id}/join", post(join_lobby))
        .route("/lobbies/{id}/leave", post(leave_lobby))
        .route("/lobbies/{id}/ready", post(set_ready))
        .route(
            "/lobbies/{id}/messages",
            get(lobby_messages).post(post_lobby_message),
        )
        .route("/lobbies/{id}/events", get(lobby_events))
        .route("/ws/lobbies/{id}", get(lobby_socket))
}

#[utoipa::path(
    post,
    path = "/api/v1/online/presence",
    tag = "online",
    request_body = PresenceUpdate,
    responses((status = 200, description = "Presence stored", body = PresenceResponse))
)]
pub async fn update_presence(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<PresenceUpdate>>,
) -> Result<Json<PresenceResponse>, AppError> {
    Ok(Json(online_service::update_presence(&state, payload).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/online/presence/{user_id}",
    tag = "online",
    params(("user_id" = Uuid, Path, description = "User identifier")),
    responses(
        (status = 200, description = "Presence", body = PresenceResponse),
        (status = 404, description = "No presence recorded")
    )
)]
pub async fn get_presence(
    State(state): State<SharedState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<PresenceResponse>, AppError> {
    Ok(Json(online_service::get_presence(&state, user_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/online/presence",
    tag = "online",
    params(PresenceListParams),
    responses((status = 200, description = "Known presences among the requested users", body = [PresenceResponse]))
)]
pub async fn list_presence(
    State(state): State<SharedState>,
    Query(params): Query<PresenceListParams>,
) -> Result<Json<Vec<PresenceResponse>>, AppError> {
    Ok(Json(
        online_service::list_presence(&state, &params.ids()).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/online/messages",
    tag = "online",
    request_body = SendMessageRequest,
    responses(
        (status = 201, description = "Message sent", body = ChatMessageResponse),
        (status = 400, description = "Sender and recipient are the same user")
    )
)]
pub async fn send_message(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<SendMessageRequest>>,
) -> Result<(StatusCode, Json<ChatMessageResponse>), AppError> {
    let message = online_service::send_message(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

#[utoipa::path(
    get,
    path = "/api/v1/online/messages",
    tag = "online",
    params(ConversationParams),
    responses((status = 200, description = "Conversation, newest first", body = [ChatMessageResponse]))
)]
pub async fn conversation(
    State(state): State<SharedState>,
    Query(params): Query<ConversationParams>,
) -> Result<Json<Vec<ChatMessageResponse>>, AppError> {
    let limit = params.limit.unwrap_or(50).clamp(1, 100) as u64;
    Ok(Json(
        online_service::conversation(&state, params.user_id, params.peer_id, limit).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/online/lobbies",
    tag = "online",
    request_body = CreateLobbyRequest,
    responses((status = 201, description = "Lobby opened", body = LobbyResponse))
)]
pub async fn create_lobby(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateLobbyRequest>>,
) -> Result<(StatusCode, Json<LobbyResponse>), AppError> {
    let lobby = online_service::create_lobby(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(lobby)))
}

#[utoipa::path(
    get,
    path = "/api/v1/online/lobbies",
    tag = "online",
    params(LobbyListParams),
    responses((status = 200, description = "Lobbies, newest first", body = [LobbyResponse]))
)]
pub async fn list_lobbies(
    State(state): State<SharedState>,
    Query(params): Query<LobbyListParams>,
) -> Result<Json<Vec<LobbyResponse>>, AppError> {
    Ok(Json(online_service::list_lobbies(&state, params).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/online/lobbies/{id}",
    tag = "online",
    params(("id" = Uuid, Path, description = "Lobby identifier")),
    responses(
        (status = 200, description = "Lobby", body = LobbyResponse),
        (status = 404, description = "Unknown lobby")
    )
)]
pub async fn get_lobby(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<LobbyResponse>, AppError> {
    Ok(Json(online_service::get_lobby(&state, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/online/lobbies/{id}/join",
    tag = "online",
    params(("id" = Uuid, Path, description = "Lobby identifier")),
    request_body = JoinLobbyRequest,
    responses(
        (status = 200, description = "Joined", body = LobbyResponse),
        (status = 400, description = "Lobby is full"),
        (status = 403, description = "Wrong passcode")
    )
)]
pub async fn join_lobby(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<JoinLobbyRequest>,
) -> Result<Json<LobbyResponse>, AppError> {
    Ok(Json(online_service::join_lobby(&state, id, payload).await?))
}

/// Leaving as the last member closes the lobby.
#[utoipa::path(
    post,
    path = "/api/v1/online/lobbies/{id}/leave",
    tag = "online",
    params(("id" = Uuid, Path, description = "Lobby identifier"), LobbyUserParams),
    responses(
        (status = 200, description = "Remaining lobby, or a closing message", body = LobbyResponse),
        (status = 400, description = "User is not a member")
    )
)]
pub async fn leave_lobby(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Query(params): Query<LobbyUserParams>,
) -> Result<Response, AppError> {
    Ok(
        match online_service::leave_lobby(&state, id, params.user_id).await? {
            Some(lobby) => Json(lobby).into_response(),
            None => Json(MessageResponse::new("Lobby closed")).into_response(),
        },
    )
}

#[utoipa::path(
    post,
    path = "/api/v1/online/lobbies/{id}/ready",
    tag = "online",
    params(("id" = Uuid, Path, description = "Lobby identifier"), ReadyParams),
    responses((status = 200, description = "Ready flag updated", body = LobbyResponse))
)]
pub async fn set_ready(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Query(params): Query<ReadyParams>,
) -> Result<Json<LobbyResponse>, AppError> {
    Ok(Json(
        online_service::set_ready(&state, id, params.user_id, params.is_ready).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/online/lobbies/{id}/messages",
    tag = "online",
    params(("id" = Uuid, Path, description = "Lobby identifier")),
    request_body = LobbyMessageRequest,
    responses(
        (status = 201, description = "Message posted", body = LobbyMessageResponse),
        (status = 403, description = "Sender is not a member")
    )
)]
pub async fn post_lobby_message(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<LobbyMessageRequest>>,
) -> Result<(StatusCode, Json<LobbyMessageResponse>), AppError> {
    let message = online_service::post_lobby_message(&state, id, payload).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

#[utoipa::path(
    get,
    path = "/api/v1/online/lobbies/{id}/messages",
    tag = "online",
    params(("id" = Uuid, Path, description = "Lobby identifier"), LobbyUserParams),
    responses(
        (status = 200, description = "Chat history, oldest first", body = [LobbyMessageResponse]),
        (status = 403, description = "Reader is not a member")
    )
)]
pub async fn lobby_messages(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Query(params): Query<LobbyUserParams>,
) -> Result<Json<Vec<LobbyMessageResponse>>, AppError> {
    Ok(Json(
        online_service::lobby_messages(&state, id, params.user_id).await?,
    ))
}

/// Server-sent events for one lobby.
#[utoipa::path(
    get,
    path = "/api/v1/online/lobbies/{id}/events",
    tag = "online",
    params(("id" = Uuid, Path, description = "Lobby identifier")),
    responses(
        (status = 200, description = "Lobby event stream", content_type = "text/event-stream", body = String),
        (status = 404, description = "Unknown lobby")
    )
)]
pub async fn lobby_events(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    online_service::get_lobby(&state, id).await?;
    Ok(sse_service::lobby_stream(state.events().subscribe(), id))
}

/// Realtime lobby chat. Members receive the stored history, then every lobby
/// event; each inbound text frame is posted as a chat message.
#[utoipa::path(
    get,
    path = "/api/v1/online/ws/lobbies/{id}",
    tag = "online",
    params(("id" = Uuid, Path, description = "Lobby identifier"), LobbyUserParams),
    responses(
        (status = 101, description = "Switching protocols to WebSocket"),
        (status = 403, description = "Caller is not a member"),
        (status = 404, description = "Unknown lobby")
    )
)]
pub async fn lobby_socket(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Query(params): Query<LobbyUserParams>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, AppError> {
    // Membership is checked before the upgrade so refusals are plain HTTP errors.
    let history = online_service::lobby_messages(&state, id, params.user_id).await?;
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return Ok(rejection.into_response()),
    };
    let user_id = params.user_id;
    Ok(ws.on_upgrade(move |socket| {
        websocket_service::handle_lobby_socket(state, socket, id, user_id, history)
    }))
}
