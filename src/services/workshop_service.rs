use serde_json::json;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::{
        document_store::{Filter, Query},
        models::{
            now_millis,
            workshop::{
                ItemStatus, WorkshopComment, WorkshopItem, WorkshopModerationLog, WorkshopRating,
                WorkshopVote,
            },
        },
    },
    dto::workshop::{
        CommentResponse, CreateCommentRequest, CreateItemRequest, DownloadResponse,
        ItemListParams, ItemPage, ItemResponse, ModerationRequest, RatingSummary,
        UpdateItemRequest,
    },
    error::ServiceError,
    services::{
        auto_moderation,
        slug::unique_slug,
        workshop_storage::{StoredFile, discard},
    },
    state::SharedState,
};

const TOPIC: &str = "workshop";
const SLUG_FALLBACK: &str = "workshop-item";
const DEFAULT_VERSION: &str = "1.0.0";
const MAX_PAGE_SIZE: u64 = 50;

async fn load_item(state: &SharedState, id: Uuid) -> Result<WorkshopItem, ServiceError> {
    state
        .repo::<WorkshopItem>()
        .await?
        .get(id)
        .await?
        .ok_or_else(|| ServiceError::not_found("workshop item"))
}

fn ensure_owner(item: &WorkshopItem, user_id: Uuid) -> Result<(), ServiceError> {
    if item.user_id != user_id {
        return Err(ServiceError::Forbidden(
            "only the owner can modify this item".into(),
        ));
    }
    Ok(())
}

async fn log_moderation(
    state: &SharedState,
    item_id: Uuid,
    moderator_id: Option<Uuid>,
    action: &str,
    notes: Option<String>,
) -> Result<(), ServiceError> {
    state
        .repo::<WorkshopModerationLog>()
        .await?
        .insert(&WorkshopModerationLog {
            id: Uuid::new_v4(),
            item_id,
            moderator_id,
            action: action.to_owned(),
            notes,
            created_at: now_millis(),
        })
        .await?;
    Ok(())
}

/// Publish an item; flagged items wait in `pending` for a moderator.
pub async fn create_item(
    state: &SharedState,
    owner: Uuid,
    request: CreateItemRequest,
) -> Result<ItemResponse, ServiceError> {
    publish(state, owner, request, None).await
}

fn parse_metadata(raw: &str) -> Result<CreateItemRequest, ServiceError> {
    let request: CreateItemRequest = serde_json::from_str(raw)
        .map_err(|err| ServiceError::InvalidInput(format!("invalid metadata: {err}")))?;
    request
        .validate()
        .map_err(|err| ServiceError::InvalidInput(format!("invalid metadata: {err}")))?;
    Ok(request)
}

/// Publish an item whose file is already in local storage. `metadata` is the
/// JSON form of [`CreateItemRequest`]; the file is removed again when the
/// item cannot be created.
pub async fn create_item_with_upload(
    state: &SharedState,
    owner: Uuid,
    metadata: &str,
    file: StoredFile,
) -> Result<ItemResponse, ServiceError> {
    let path = file.path.clone();
    let created = match parse_metadata(metadata) {
        Ok(request) => publish(state, owner, request, Some(file)).await,
        Err(err) => Err(err),
    };
    if created.is_err() {
        discard(&path).await;
    }
    created
}

async fn publish(
    state: &SharedState,
    owner: Uuid,
    request: CreateItemRequest,
    file: Option<StoredFile>,
) -> Result<ItemResponse, ServiceError> {
    let settings = &state.config().workshop;
    let verdict = auto_moderation::score_content(
        &request.title,
        &request.description,
        &request.tags,
        &settings.banned_keywords,
        settings.auto_approval_score,
    );

    let items = state.repo::<WorkshopItem>().await?;
    let slug = unique_slug(&items, &request.title, SLUG_FALLBACK, None).await?;
    let now = now_millis();
    let item = WorkshopItem {
        id: Uuid::new_v4(),
        user_id: owner,
        game_id: request.game_id,
        title: request.title,
        slug,
        description: request.description,
        tags: request.tags,
        version: request.version.unwrap_or_else(|| DEFAULT_VERSION.into()),
        visibility: request.visibility,
        status: if verdict.flagged {
            ItemStatus::Pending
        } else {
            ItemStatus::Approved
        },
        file_url: file.as_ref().map(|f| f.url.clone()).or(request.file_url),
        file_path: file.as_ref().map(|f| f.path.display().to_string()),
        file_checksum: file.as_ref().map(|f| f.checksum.clone()),
        file_size: file.as_ref().map(|f| f.size),
        thumbnail_url: request.thumbnail_url,
        auto_flagged: verdict.flagged,
        auto_score: verdict.score,
        auto_reasons: verdict.reasons,
        manual_reviewer_id: None,
        moderation_notes: None,
        downloads: 0,
        votes_up: 0,
        votes_down: 0,
        created_at: now,
        updated_at: now,
    };
    items.insert(&item).await?;

    if item.auto_flagged {
        info!(item_id = %item.id, score = item.auto_score, "workshop item flagged for review");
        log_moderation(
            state,
            item.id,
            None,
            "auto_flagged",
            Some(item.auto_reasons.join("; ")),
        )
        .await?;
    }
    state.events().publish(
        TOPIC,
        "item.created",
        json!({ "item_id": item.id, "user_id": owner, "status": item.status }),
    );
    Ok(item.into())
}

/// Newest items first with offset paging.
pub async fn list_items(
    state: &SharedState,
    params: ItemListParams,
) -> Result<ItemPage, ServiceError> {
    let mut filter = Filter::All;
    if let Some(status) = params.status {
        filter = filter.and(Filter::eq("status", json!(status)));
    }
    if let Some(visibility) = params.visibility {
        filter = filter.and(Filter::eq("visibility", json!(visibility)));
    }
    if let Some(search) = params.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        filter = filter.and(Filter::contains(&["title", "description"], search));
    }
    if let Some(game_id) = params.game_id {
        filter = filter.and(Filter::id("game_id", game_id));
    }

    let items = state.repo::<WorkshopItem>().await?;
    let total = items.count(filter.clone()).await?;
    let page = items
        .find(
            Query::new(filter)
                .sort_desc("created_at")
                .skip(params.offset.unwrap_or(0))
                .limit(params.limit.unwrap_or(20).clamp(1, MAX_PAGE_SIZE)),
        )
        .await?;
    Ok(ItemPage {
        items: page.into_iter().map(Into::into).collect(),
        total,
    })
}

/// One item with its rating and comment aggregates.
pub async fn get_item(state: &SharedState, id: Uuid) -> Result<ItemResponse, ServiceError> {
    let item = load_item(state, id).await?;
    let summary = summarize_ratings(state, id).await?;
    let comments = state
        .repo::<WorkshopComment>()
        .await?
        .count(Filter::id("item_id", id))
        .await?;

    let mut response = ItemResponse::from(item);
    response.rating_avg = summary.rating_avg;
    response.rating_count = Some(summary.rating_count);
    response.comment_count = Some(comments);
    Ok(response)
}

pub async fn update_item(
    state: &SharedState,
    id: Uuid,
    caller: Uuid,
    request: UpdateItemRequest,
) -> Result<ItemResponse, ServiceError> {
    let mut item = load_item(state, id).await?;
    ensure_owner(&item, caller)?;

    if let Some(title) = request.title {
        item.title = title;
    }
    if let Some(description) = request.description {
        item.description = description;
    }
    if let Some(tags) = request.tags {
        item.tags = tags;
    }
    if let Some(version) = request.version {
        item.version = version;
    }
    if let Some(visibility) = request.visibility {
        item.visibility = visibility;
    }
    if request.file_url.is_some() {
        item.file_url = request.file_url;
    }
    if request.thumbnail_url.is_some() {
        item.thumbnail_url = request.thumbnail_url;
    }
    item.updated_at = now_millis();
    state.repo::<WorkshopItem>().await?.replace(&item).await?;

    state.events().publish(TOPIC, "item.updated", json!({ "item_id": id }));
    Ok(item.into())
}

/// Record a user's vote; switching sides moves the count, repeating is a no-op.
pub async fn vote(
    state: &SharedState,
    id: Uuid,
    user_id: Uuid,
    is_upvote: bool,
) -> Result<ItemResponse, ServiceError> {
    let mut item = load_item(state, id).await?;
    let votes = state.repo::<WorkshopVote>().await?;
    let existing = votes
        .find_one(Filter::id("item_id", id).and(Filter::id("user_id", user_id)))
        .await?;

    match existing {
        Some(vote) if vote.is_upvote == is_upvote => return Ok(item.into()),
        Some(mut vote) => {
            if vote.is_upvote {
                item.votes_up = item.votes_up.saturating_sub(1);
            } else {
                item.votes_down = item.votes_down.saturating_sub(1);
            }
            vote.is_upvote = is_upvote;
            votes.replace(&vote).await?;
        }
        None => {
            votes
                .insert(&WorkshopVote {
                    id: Uuid::new_v4(),
                    item_id: id,
                    user_id,
                    is_upvote,
                    created_at: now_millis(),
                })
                .await?;
        }
    }
    if is_upvote {
        item.votes_up += 1;
    } else {
        item.votes_down += 1;
    }
    state.repo::<WorkshopItem>().await?.replace(&item).await?;
    Ok(item.into())
}

/// Count a download. Items without a file still count and yield an empty URL.
pub async fn record_download(
    state: &SharedState,
    id: Uuid,
) -> Result<DownloadResponse, ServiceError> {
    let mut item = load_item(state, id).await?;
    let download_url = item
        .file_url
        .clone()
        .or_else(|| item.file_path.clone())
        .unwrap_or_default();
    item.downloads += 1;
    state.repo::<WorkshopItem>().await?.replace(&item).await?;
    Ok(DownloadResponse {
        download_url,
        downloads: item.downloads,
    })
}

/// Moderator removal of an item together with its votes, comments, ratings
/// and logs. An uploaded file is deleted from storage as well.
pub async fn delete_item(state: &SharedState, id: Uuid) -> Result<(), ServiceError> {
    let item = load_item(state, id).await?;

    let by_item = Filter::id("item_id", id);
    state.repo::<WorkshopVote>().await?.delete_many(by_item.clone()).await?;
    state.repo::<WorkshopComment>().await?.delete_many(by_item.clone()).await?;
    state.repo::<WorkshopRating>().await?.delete_many(by_item.clone()).await?;
    state
        .repo::<WorkshopModerationLog>()
        .await?
        .delete_many(by_item)
        .await?;
    state.repo::<WorkshopItem>().await?.delete(id).await?;
    if let Some(path) = item.file_path.as_deref() {
        discard(std::path::Path::new(path)).await;
    }

    state.events().publish(TOPIC, "item.deleted", json!({ "item_id": id }));
    Ok(())
}

/// Manual moderation decision; always logged.
pub async fn moderate(
    state: &SharedState,
    id: Uuid,
    request: ModerationRequest,
) -> Result<ItemResponse, ServiceError> {
    let mut item = load_item(state, id).await?;
    item.status = request.action;
    item.manual_reviewer_id = request.moderator_id;
    item.moderation_notes = request.reason.clone();
    item.updated_at = now_millis();
    state.repo::<WorkshopItem>().await?.replace(&item).await?;

    let action = serde_json::to_value(request.action)
        .ok()
        .and_then(|value| value.as_str().map(str::to_owned))
        .unwrap_or_default();
    log_moderation(state, id, request.moderator_id, &action, request.reason).await?;

    state.events().publish(
        TOPIC,
        "item.moderated",
        json!({ "item_id": id, "status": item.status }),
    );
    Ok(item.into())
}

pub async fn add_comment(
    state: &SharedState,
    item_id: Uuid,
    user_id: Uuid,
    request: CreateCommentRequest,
) -> Result<CommentResponse, ServiceError> {
    load_item(state, item_id).await?;
    let comment = WorkshopComment {
        id: Uuid::new_v4(),
        item_id,
        user_id,
        content: request.content,
        created_at: now_millis(),
    };
    state
        .repo::<WorkshopComment>()
        .await?
        .insert(&comment)
        .await?;
    Ok(comment.into())
}

/// Comments oldest first.
pub async fn list_comments(
    state: &SharedState,
    item_id: Uuid,
    offset: u64,
    limit: u64,
) -> Result<Vec<CommentResponse>, ServiceError> {
    load_item(state, item_id).await?;
    let comments = state
        .repo::<WorkshopComment>()
        .await?
        .find(
            Query::new(Filter::id("item_id", item_id))
                .sort_asc("created_at")
                .skip(offset)
                .limit(limit),
        )
        .await?;
    Ok(comments.into_iter().map(Into::into).collect())
}

async fn summarize_ratings(state: &SharedState, item_id: Uuid) -> Result<RatingSummary, ServiceError> {
    let ratings = state
        .repo::<WorkshopRating>()
        .await?
        .find_all(Filter::id("item_id", item_id))
        .await?;
    let count = ratings.len() as u64;
    let rating_avg = (count > 0).then(|| {
        let total: u64 = ratings.iter().map(|rating| u64::from(rating.score)).sum();
        total as f64 / count as f64
    });
    Ok(RatingSummary {
        item_id,
        rating_avg,
        rating_count: count,
    })
}

pub async fn rating_summary(
    state: &SharedState,
    item_id: Uuid,
) -> Result<RatingSummary, ServiceError> {
    load_item(state, item_id).await?;
    summarize_ratings(state, item_id).await
}

/// Create or replace the caller's rating.
pub async fn rate(
    state: &SharedState,
    item_id: Uuid,
    user_id: Uuid,
    score: u8,
) -> Result<RatingSummary, ServiceError> {
    load_item(state, item_id).await?;
    let ratings = state.repo::<WorkshopRating>().await?;
    let now = now_millis();
    match ratings
        .find_one(Filter::id("item_id", item_id).and(Filter::id("user_id", user_id)))
        .await?
    {
        Some(mut rating) => {
            rating.score = score;
            rating.updated_at = now;
            ratings.replace(&rating).await?;
        }
        None => {
            ratings
                .insert(&WorkshopRating {
                    id: Uuid::new_v4(),
                    item_id,
                    user_id,
                    score,
                    created_at: now,
                    updated_at: now,
                })
                .await?;
        }
    }
    summarize_ratings(state, item_id).await
}

/// Wipe every workshop collection.
pub async fn reset(state: &SharedState) -> Result<(), ServiceError> {
    let removed = state
        .repo::<WorkshopItem>()
        .await?
        .delete_many(Filter::All)
        .await?;
    state.repo::<WorkshopVote>().await?.delete_many(Filter::All).await?;
    state.repo::<WorkshopComment>().await?.delete_many(Filter::All).await?;
    state.repo::<WorkshopRating>().await?.delete_many(Filter::All).await?;
    state
        .repo::<WorkshopModerationLog>()
        .await?
        .delete_many(Filter::All)
        .await?;
    info!(items = removed, "workshop reset");
    state.events().publish(TOPIC, "workshop.reset", json!({ "items": removed }));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        dao::models::workshop::Visibility,
        services::workshop_storage::UploadSink,
        state::test_support::memory_state,
    };

    fn item(title: &str, description: &str) -> CreateItemRequest {
        CreateItemRequest {
            title: title.into(),
            description: description.into(),
            tags: vec!["maps".into()],
            game_id: None,
            version: None,
            visibility: Visibility::Public,
            file_url: Some("https://cdn.example.com/mod.zip".into()),
            thumbnail_url: None,
        }
    }

    #[tokio::test]
    async fn flagged_items_start_pending() {
        let state = memory_state().await;
        let owner = Uuid::new_v4();
        let clean = create_item(&state, owner, item("Desert Map", "Big dunes")).await.unwrap();
        assert_eq!(clean.status, ItemStatus::Approved);
        assert_eq!(clean.slug, "desert-map");

        let shady = create_item(&state, owner, item("Aim cheat", "wins")).await.unwrap();
        assert_eq!(shady.status, ItemStatus::Pending);
        assert!(shady.auto_flagged);

        let pending = list_items(
            &state,
            ItemListParams {
                status: Some(ItemStatus::Pending),
                ..ItemListParams::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(pending.total, 1);

        let approved = moderate(
            &state,
            shady.id,
            ModerationRequest {
                action: ItemStatus::Rejected,
                reason: Some("cheats are not allowed".into()),
                moderator_id: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(approved.status, ItemStatus::Rejected);
        let logs = state
            .repo::<WorkshopModerationLog>()
            .await
            .unwrap()
            .count(Filter::id("item_id", shady.id))
            .await
            .unwrap();
        assert_eq!(logs, 2);
    }

    #[tokio::test]
    async fn votes_switch_sides_once() {
        let state = memory_state().await;
        let owner = Uuid::new_v4();
        let voter = Uuid::new_v4();
        let created = create_item(&state, owner, item("Skins", "colors")).await.unwrap();

        let up = vote(&state, created.id, voter, true).await.unwrap();
        assert_eq!((up.votes_up, up.votes_down), (1, 0));
        let same = vote(&state, created.id, voter, true).await.unwrap();
        assert_eq!((same.votes_up, same.votes_down), (1, 0));
        let down = vote(&state, created.id, voter, false).await.unwrap();
        assert_eq!((down.votes_up, down.votes_down), (0, 1));
    }

    #[tokio::test]
    async fn ratings_upsert_and_downloads_count() {
        let state = memory_state().await;
        let owner = Uuid::new_v4();
        let created = create_item(&state, owner, item("Music", "ost")).await.unwrap();

        rate(&state, created.id, owner, 2).await.unwrap();
        rate(&state, created.id, owner, 4).await.unwrap();
        let summary = rate(&state, created.id, Uuid::new_v4(), 5).await.unwrap();
        assert_eq!(summary.rating_count, 2);
        assert_eq!(summary.rating_avg, Some(4.5));

        assert_eq!(record_download(&state, created.id).await.unwrap().downloads, 1);
        let detail = get_item(&state, created.id).await.unwrap();
        assert_eq!(detail.downloads, 1);
        assert_eq!(detail.rating_count, Some(2));

        let fileless = create_item(
            &state,
            owner,
            CreateItemRequest {
                file_url: None,
                ..item("Idea", "no file yet")
            },
        )
        .await
        .unwrap();
        let download = record_download(&state, fileless.id).await.unwrap();
        assert_eq!(download.download_url, "");
        assert_eq!(download.downloads, 1);
    }

    #[tokio::test]
    async fn delete_cascades_and_reset_wipes_everything() {
        let state = memory_state().await;
        let owner = Uuid::new_v4();
        let created = create_item(&state, owner, item("Maps", "pack")).await.unwrap();
        add_comment(
            &state,
            created.id,
            owner,
            CreateCommentRequest {
                content: "v2 soon".into(),
            },
        )
        .await
        .unwrap();

        delete_item(&state, created.id).await.unwrap();
        assert!(matches!(
            get_item(&state, created.id).await,
            Err(ServiceError::NotFound(_))
        ));
        let comments = state
            .repo::<WorkshopComment>()
            .await
            .unwrap()
            .count(Filter::id("item_id", created.id))
            .await
            .unwrap();
        assert_eq!(comments, 0);

        create_item(&state, owner, item("Again", "pack")).await.unwrap();
        reset(&state).await.unwrap();
        let remaining = list_items(&state, ItemListParams::default()).await.unwrap();
        assert_eq!(remaining.total, 0);
    }

    #[tokio::test]
    async fn listing_filters_by_game_and_caps_the_page() {
        let state = memory_state().await;
        let owner = Uuid::new_v4();
        let game = Uuid::new_v4();
        for n in 0..55 {
            let request = CreateItemRequest {
                game_id: (n % 5 == 0).then_some(game),
                ..item(&format!("Pack {n}"), "textures")
            };
            create_item(&state, owner, request).await.unwrap();
        }

        let for_game = list_items(
            &state,
            ItemListParams {
                game_id: Some(game),
                ..ItemListParams::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(for_game.total, 11);
        assert!(for_game.items.iter().all(|item| item.game_id == Some(game)));

        let page = list_items(
            &state,
            ItemListParams {
                limit: Some(500),
                ..ItemListParams::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(page.total, 55);
        assert_eq!(page.items.len(), 50);
    }

    async fn stored(bytes: &[u8]) -> StoredFile {
        let settings = &AppConfig::for_tests().workshop;
        let mut sink = UploadSink::create(&settings.storage_path, "mod.zip", settings.max_file_bytes)
            .await
            .unwrap();
        sink.write(bytes).await.unwrap();
        sink.finish().await.unwrap()
    }

    #[tokio::test]
    async fn uploads_attach_file_metadata_and_bad_metadata_discards_the_file() {
        let state = memory_state().await;
        let owner = Uuid::new_v4();
        let file = stored(b"abc").await;
        let path = file.path.clone();
        let metadata = json!({ "title": "Upload", "description": "zip" }).to_string();
        let created = create_item_with_upload(&state, owner, &metadata, file)
            .await
            .unwrap();
        assert_eq!(created.file_size, Some(3));
        assert_eq!(
            created.file_checksum.as_deref(),
            Some("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
        );
        let download = record_download(&state, created.id).await.unwrap();
        assert_eq!(download.download_url, format!("file://{}", path.display()));

        delete_item(&state, created.id).await.unwrap();
        assert!(!path.exists());

        let rejected = stored(b"xyz").await;
        let rejected_path = rejected.path.clone();
        assert!(matches!(
            create_item_with_upload(&state, owner, "{not json", rejected).await,
            Err(ServiceError::InvalidInput(_))
        ));
        assert!(!rejected_path.exists());
    }
}
