use serde_json::json;
use uuid::Uuid;

use crate::{
    dao::{
        document_store::{Filter, Query},
        models::{
            now_millis,
            online::{
                ChatMessage, GameLobby, LobbyMember, LobbyMessage, LobbyRole, LobbyStatus,
                UserPresence, conversation_id,
            },
        },
    },
    dto::online::{
        ChatMessageResponse, CreateLobbyRequest, JoinLobbyRequest, LobbyListParams,
        LobbyMessageRequest, LobbyMessageResponse, LobbyResponse, PresenceResponse,
        PresenceUpdate, SendMessageRequest,
    },
    error::ServiceError,
    state::SharedState,
};

const TOPIC: &str = "online";
const MIN_LOBBY_MEMBERS: u32 = 2;

async fn load_lobby(state: &SharedState, id: Uuid) -> Result<GameLobby, ServiceError> {
    state
        .repo::<GameLobby>()
        .await?
        .get(id)
        .await?
        .ok_or_else(|| ServiceError::not_found("lobby"))
}

fn ensure_member(lobby: &GameLobby, user_id: Uuid) -> Result<(), ServiceError> {
    if lobby.member(user_id).is_none() {
        return Err(ServiceError::InvalidInput(
            "user is not part of the lobby".into(),
        ));
    }
    Ok(())
}

/// Create or refresh the presence row of a user.
pub async fn update_presence(
    state: &SharedState,
    update: PresenceUpdate,
) -> Result<PresenceResponse, ServiceError> {
    let presences = state.repo::<UserPresence>().await?;
    let existing = presences
        .find_one(Filter::id("user_id", update.user_id))
        .await?;
    let presence = UserPresence {
        id: existing.as_ref().map_or_else(Uuid::new_v4, |row| row.id),
        user_id: update.user_id,
        status: update.status,
        platform: update.platform,
        activity: update.activity,
        region: update.region,
        metadata: update.metadata.unwrap_or_else(|| json!({})),
        last_seen: now_millis(),
    };
    if existing.is_some() {
        presences.replace(&presence).await?;
    } else {
        presences.insert(&presence).await?;
    }

    state.events().publish(
        TOPIC,
        "presence.updated",
        json!({ "user_id": presence.user_id, "status": presence.status }),
    );
    Ok(presence.into())
}

pub async fn get_presence(
    state: &SharedState,
    user_id: Uuid,
) -> Result<PresenceResponse, ServiceError> {
    state
        .repo::<UserPresence>()
        .await?
        .find_one(Filter::id("user_id", user_id))
        .await?
        .map(Into::into)
        .ok_or_else(|| ServiceError::not_found("presence"))
}

pub async fn list_presence(
    state: &SharedState,
    user_ids: &[Uuid],
) -> Result<Vec<PresenceResponse>, ServiceError> {
    if user_ids.is_empty() {
        return Ok(Vec::new());
    }
    let rows = state
        .repo::<UserPresence>()
        .await?
        .find_all(Filter::any_of(
            "user_id",
            user_ids.iter().map(|id| id.to_string()),
        ))
        .await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

pub async fn send_message(
    state: &SharedState,
    request: SendMessageRequest,
) -> Result<ChatMessageResponse, ServiceError> {
    if request.sender_id == request.recipient_id {
        return Err(ServiceError::InvalidInput(
            "cannot send a message to yourself".into(),
        ));
    }
    let message = ChatMessage {
        id: Uuid::new_v4(),
        conversation_id: conversation_id(request.sender_id, request.recipient_id),
        sender_id: request.sender_id,
        recipient_id: request.recipient_id,
        content: request.content,
        is_read: false,
        sent_at: now_millis(),
    };
    state.repo::<ChatMessage>().await?.insert(&message).await?;

    state.events().publish(
        TOPIC,
        "message.sent",
        json!({
            "message_id": message.id,
            "conversation_id": message.conversation_id,
            "recipient_id": message.recipient_id,
        }),
    );
    Ok(message.into())
}

/// Newest messages of the conversation between two users.
pub async fn conversation(
    state: &SharedState,
    user_id: Uuid,
    peer_id: Uuid,
    limit: u64,
) -> Result<Vec<ChatMessageResponse>, ServiceError> {
    let messages = state
        .repo::<ChatMessage>()
        .await?
        .find(
            Query::new(Filter::eq("conversation_id", conversation_id(user_id, peer_id)))
                .sort_desc("sent_at")
                .limit(limit),
        )
        .await?;
    Ok(messages.into_iter().map(Into::into).collect())
}

/// Open a lobby with the host as its first member.
pub async fn create_lobby(
    state: &SharedState,
    request: CreateLobbyRequest,
) -> Result<LobbyResponse, ServiceError> {
    let ceiling = state.config().online.lobby_max_members.max(MIN_LOBBY_MEMBERS);
    let now = now_millis();
    let mut lobby = GameLobby {
        id: Uuid::new_v4(),
        host_id: request.host_id,
        name: request.name,
        description: request.description,
        game_id: request.game_id,
        max_members: request.max_members.clamp(MIN_LOBBY_MEMBERS, ceiling),
        is_private: request.is_private,
        passcode: request
            .passcode
            .filter(|code| request.is_private && !code.is_empty()),
        region: request.region,
        status: LobbyStatus::Open,
        metadata: request.metadata.unwrap_or_else(|| json!({})),
        members: vec![LobbyMember {
            user_id: request.host_id,
            role: LobbyRole::Host,
            is_ready: false,
            joined_at: now,
        }],
        created_at: now,
        updated_at: now,
    };
    lobby.refresh_status();
    state.repo::<GameLobby>().await?.insert(&lobby).await?;

    state.events().publish(
        TOPIC,
        "lobby.created",
        json!({ "lobby_id": lobby.id, "host_id": lobby.host_id }),
    );
    Ok(lobby.into())
}

pub async fn list_lobbies(
    state: &SharedState,
    params: LobbyListParams,
) -> Result<Vec<LobbyResponse>, ServiceError> {
    let mut filter = Filter::All;
    if let Some(status) = params.status {
        filter = filter.and(Filter::eq("status", json!(status)));
    }
    if let Some(region) = params.region.filter(|region| !region.is_empty()) {
        filter = filter.and(Filter::eq("region", region));
    }
    let lobbies = state
        .repo::<GameLobby>()
        .await?
        .find(
            Query::new(filter)
                .sort_desc("created_at")
                .limit(params.limit.unwrap_or(20).clamp(1, 100)),
        )
        .await?;
    Ok(lobbies.into_iter().map(Into::into).collect())
}

pub async fn get_lobby(state: &SharedState, id: Uuid) -> Result<LobbyResponse, ServiceError> {
    Ok(load_lobby(state, id).await?.into())
}

/// Join a lobby; joining twice leaves it unchanged.
pub async fn join_lobby(
    state: &SharedState,
    id: Uuid,
    request: JoinLobbyRequest,
) -> Result<LobbyResponse, ServiceError> {
    let mut lobby = load_lobby(state, id).await?;
    if lobby.is_private
        && lobby.passcode.is_some()
        && lobby.passcode.as_deref() != request.passcode.as_deref()
    {
        return Err(ServiceError::Forbidden("invalid passcode".into()));
    }
    if lobby.member(request.user_id).is_some() {
        return Ok(lobby.into());
    }
    if lobby.members.len() as u32 >= lobby.max_members {
        return Err(ServiceError::InvalidInput("lobby is full".into()));
    }

    let now = now_millis();
    lobby.members.push(LobbyMember {
        user_id: request.user_id,
        role: LobbyRole::Member,
        is_ready: false,
        joined_at: now,
    });
    lobby.refresh_status();
    lobby.updated_at = now;
    state.repo::<GameLobby>().await?.replace(&lobby).await?;

    state.events().publish(
        TOPIC,
        "lobby.joined",
        json!({ "lobby_id": id, "user_id": request.user_id }),
    );
    Ok(lobby.into())
}

/// Leave a lobby. Returns `None` when the last member left and the lobby closed.
pub async fn leave_lobby(
    state: &SharedState,
    id: Uuid,
    user_id: Uuid,
) -> Result<Option<LobbyResponse>, ServiceError> {
    let mut lobby = load_lobby(state, id).await?;
    ensure_member(&lobby, user_id)?;
    lobby.members.retain(|member| member.user_id != user_id);
    let lobbies = state.repo::<GameLobby>().await?;

    if lobby.members.is_empty() {
        lobbies.delete(id).await?;
        state
            .repo::<LobbyMessage>()
            .await?
            .delete_many(Filter::id("lobby_id", id))
            .await?;
        state.events().publish(
            TOPIC,
            "lobby.closed",
            json!({ "lobby_id": id, "reason": "empty" }),
        );
        return Ok(None);
    }

    if lobby.host_id == user_id {
        // members stay ordered by join time
        if let Some(successor) = lobby.members.first_mut() {
            successor.role = LobbyRole::Host;
            lobby.host_id = successor.user_id;
        }
    }
    lobby.refresh_status();
    lobby.updated_at = now_millis();
    lobbies.replace(&lobby).await?;

    state.events().publish(
        TOPIC,
        "lobby.left",
        json!({ "lobby_id": id, "user_id": user_id, "host_id": lobby.host_id }),
    );
    Ok(Some(lobby.into()))
}

pub async fn set_ready(
    state: &SharedState,
    id: Uuid,
    user_id: Uuid,
    is_ready: bool,
) -> Result<LobbyResponse, ServiceError> {
    let mut lobby = load_lobby(state, id).await?;
    ensure_member(&lobby, user_id)?;
    for member in lobby.members.iter_mut().filter(|m| m.user_id == user_id) {
        member.is_ready = is_ready;
    }
    lobby.updated_at = now_millis();
    state.repo::<GameLobby>().await?.replace(&lobby).await?;

    state.events().publish(
        TOPIC,
        "lobby.ready_changed",
        json!({ "lobby_id": id, "user_id": user_id, "is_ready": is_ready }),
    );
    Ok(lobby.into())
}

/// Post to the lobby chat, pruning history beyond the configured limit.
pub async fn post_lobby_message(
    state: &SharedState,
    id: Uuid,
    request: LobbyMessageRequest,
) -> Result<LobbyMessageResponse, ServiceError> {
    let lobby = load_lobby(state, id).await?;
    if lobby.member(request.user_id).is_none() {
        return Err(ServiceError::Forbidden(
            "only lobby members can chat".into(),
        ));
    }
    let messages = state.repo::<LobbyMessage>().await?;
    let message = LobbyMessage {
        // v7 ids grow monotonically and break ties within one millisecond.
        id: Uuid::now_v7(),
        lobby_id: id,
        user_id: request.user_id,
        content: request.content,
        created_at: now_millis(),
    };
    messages.insert(&message).await?;

    let history = state.config().online.lobby_message_history_limit as u64;
    let stale = messages
        .find(
            Query::new(Filter::id("lobby_id", id))
                .sort_desc("created_at")
                .sort_desc("id")
                .skip(history.max(1)),
        )
        .await?;
    for old in stale {
        messages.delete(old.id).await?;
    }

    state.events().publish(
        TOPIC,
        "lobby.message",
        json!({
            "lobby_id": id,
            "message_id": message.id,
            "user_id": message.user_id,
            "content": message.content,
        }),
    );
    Ok(message.into())
}

/// Lobby chat history, oldest first.
pub async fn lobby_messages(
    state: &SharedState,
    id: Uuid,
    user_id: Uuid,
) -> Result<Vec<LobbyMessageResponse>, ServiceError> {
    let lobby = load_lobby(state, id).await?;
    if lobby.member(user_id).is_none() {
        return Err(ServiceError::Forbidden(
            "only lobby members can read the chat".into(),
        ));
    }
    let history = state.config().online.lobby_message_history_limit as u64;
    let mut recent = state
        .repo::<LobbyMessage>()
        .await?
        .find(
            Query::new(Filter::id("lobby_id", id))
                .sort_desc("created_at")
                .sort_desc("id")
                .limit(history.max(1)),
        )
        .await?;
    recent.reverse();
    Ok(recent.into_iter().map(Into::into).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{dao::models::online::PresenceStatus, state::test_support::memory_state};

    fn lobby_request(host_id: Uuid, max_members: u32) -> CreateLobbyRequest {
        CreateLobbyRequest {
            host_id,
            name: "Ranked night".into(),
            description: None,
            game_id: None,
            max_members,
            is_private: false,
            passcode: None,
            region: Some("eu".into()),
            metadata: None,
        }
    }

    fn join(user_id: Uuid, passcode: Option<&str>) -> JoinLobbyRequest {
        JoinLobbyRequest {
            user_id,
            passcode: passcode.map(str::to_owned),
        }
    }

    #[tokio::test]
    async fn presence_upserts_by_user() {
        let state = memory_state().await;
        let user = Uuid::new_v4();
        let update = |status| PresenceUpdate {
            user_id: user,
            status,
            platform: Some("desktop".into()),
            activity: None,
            region: None,
            metadata: None,
        };
        update_presence(&state, update(PresenceStatus::Online)).await.unwrap();
        update_presence(&state, update(PresenceStatus::InGame)).await.unwrap();

        let listed = list_presence(&state, &[user, Uuid::new_v4()]).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].status, PresenceStatus::InGame);
    }

    #[tokio::test]
    async fn conversations_are_shared_by_both_sides() {
        let state = memory_state().await;
        let (ada, grace) = (Uuid::new_v4(), Uuid::new_v4());
        let send = |from, to, content: &str| SendMessageRequest {
            sender_id: from,
            recipient_id: to,
            content: content.into(),
        };
        send_message(&state, send(ada, grace, "hi")).await.unwrap();
        send_message(&state, send(grace, ada, "hello")).await.unwrap();
        assert!(matches!(
            send_message(&state, send(ada, ada, "me")).await,
            Err(ServiceError::InvalidInput(_))
        ));

        let thread = conversation(&state, grace, ada, 50).await.unwrap();
        assert_eq!(thread.len(), 2);
        assert_eq!(thread[0].conversation_id, conversation_id(ada, grace));
    }

    #[tokio::test]
    async fn lobby_size_is_clamped_and_enforced() {
        let state = memory_state().await;
        let host = Uuid::new_v4();
        let huge = create_lobby(&state, lobby_request(host, 64)).await.unwrap();
        assert_eq!(huge.max_members, state.config().online.lobby_max_members);

        let duo = create_lobby(&state, lobby_request(host, 1)).await.unwrap();
        assert_eq!(duo.max_members, 2);
        let guest = Uuid::new_v4();
        let full = join_lobby(&state, duo.id, join(guest, None)).await.unwrap();
        assert_eq!(full.status, LobbyStatus::Full);
        let again = join_lobby(&state, duo.id, join(guest, None)).await.unwrap();
        assert_eq!(again.members.len(), 2);
        assert!(matches!(
            join_lobby(&state, duo.id, join(Uuid::new_v4(), None)).await,
            Err(ServiceError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn private_lobbies_check_the_passcode() {
        let state = memory_state().await;
        let host = Uuid::new_v4();
        let lobby = create_lobby(
            &state,
            CreateLobbyRequest {
                is_private: true,
                passcode: Some("1234".into()),
                ..lobby_request(host, 4)
            },
        )
        .await
        .unwrap();
        assert!(matches!(
            join_lobby(&state, lobby.id, join(Uuid::new_v4(), Some("0000"))).await,
            Err(ServiceError::Forbidden(_))
        ));
        join_lobby(&state, lobby.id, join(Uuid::new_v4(), Some("1234")))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn host_hands_over_and_last_member_closes() {
        let state = memory_state().await;
        let (host, guest) = (Uuid::new_v4(), Uuid::new_v4());
        let lobby = create_lobby(&state, lobby_request(host, 4)).await.unwrap();
        join_lobby(&state, lobby.id, join(guest, None)).await.unwrap();
        assert!(matches!(
            leave_lobby(&state, lobby.id, Uuid::new_v4()).await,
            Err(ServiceError::InvalidInput(_))
        ));

        let after = leave_lobby(&state, lobby.id, host).await.unwrap().unwrap();
        assert_eq!(after.host_id, guest);
        assert_eq!(after.members[0].role, LobbyRole::Host);

        assert!(leave_lobby(&state, lobby.id, guest).await.unwrap().is_none());
        assert!(matches!(
            get_lobby(&state, lobby.id).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn lobby_chat_is_members_only() {
        let state = memory_state().await;
        let host = Uuid::new_v4();
        let lobby = create_lobby(&state, lobby_request(host, 4)).await.unwrap();
        let say = |user_id, content: &str| LobbyMessageRequest {
            user_id,
            content: content.into(),
        };
        post_lobby_message(&state, lobby.id, say(host, "gl hf")).await.unwrap();
        assert!(matches!(
            post_lobby_message(&state, lobby.id, say(Uuid::new_v4(), "let me in")).await,
            Err(ServiceError::Forbidden(_))
        ));
        assert!(matches!(
            lobby_messages(&state, lobby.id, Uuid::new_v4()).await,
            Err(ServiceError::Forbidden(_))
        ));

        let ready = set_ready(&state, lobby.id, host, true).await.unwrap();
        assert!(ready.members[0].is_ready);
        assert_eq!(lobby_messages(&state, lobby.id, host).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn history_keeps_the_newest_messages_posted_in_a_burst() {
        let state = memory_state().await;
        let host = Uuid::new_v4();
        let lobby = create_lobby(&state, lobby_request(host, 4)).await.unwrap();
        let limit = state.config().online.lobby_message_history_limit;
        for n in 0..limit + 7 {
            post_lobby_message(
                &state,
                lobby.id,
                LobbyMessageRequest {
                    user_id: host,
                    content: format!("msg {n}"),
                },
            )
            .await
            .unwrap();
        }

        let history = lobby_messages(&state, lobby.id, host).await.unwrap();
        let expected: Vec<String> = (7..limit + 7).map(|n| format!("msg {n}")).collect();
        let contents: Vec<String> = history.into_iter().map(|m| m.content).collect();
        assert_eq!(contents, expected);
        let stored = state
            .repo::<LobbyMessage>()
            .await
            .unwrap()
            .count(Filter::id("lobby_id", lobby.id))
            .await
            .unwrap();
        assert_eq!(stored, limit as u64);
    }
}
