use std::collections::HashMap;

use serde_json::json;
use uuid::Uuid;

use crate::{
    dao::{
        document_store::{Filter, Query},
        models::{
            forum::{ForumPost, ForumPostLike, ForumReply, PostStatus},
            now_millis,
        },
    },
    dto::{
        PageParams,
        forum::{
            CreatePostRequest, CreateReplyRequest, LikeResponse, PostListParams, PostPage,
            PostResponse, PostSort, ReplyResponse, UpdatePostRequest,
        },
        total_pages,
    },
    error::ServiceError,
    services::{peers::PeerProfile, slug::unique_slug},
    state::SharedState,
};

const TOPIC: &str = "forum";
const SLUG_FALLBACK: &str = "post";

/// Active post or 404; soft-deleted posts are invisible.
async fn load_post(state: &SharedState, id: Uuid) -> Result<ForumPost, ServiceError> {
    state
        .repo::<ForumPost>()
        .await?
        .get(id)
        .await?
        .filter(|post| post.status == PostStatus::Active)
        .ok_or_else(|| ServiceError::not_found("post"))
}

fn ensure_author(post: &ForumPost, user_id: Uuid) -> Result<(), ServiceError> {
    if post.user_id != user_id {
        return Err(ServiceError::Forbidden(
            "only the author can modify this post".into(),
        ));
    }
    Ok(())
}

async fn with_author(state: &SharedState, post: ForumPost) -> PostResponse {
    let profiles = state.peers().fetch_profiles(&[post.user_id]).await;
    let author = profiles.get(&post.user_id);
    PostResponse::new(post, author)
}

pub async fn create_post(
    state: &SharedState,
    author: Uuid,
    request: CreatePostRequest,
) -> Result<PostResponse, ServiceError> {
    let posts = state.repo::<ForumPost>().await?;
    let slug = unique_slug(&posts, &request.title, SLUG_FALLBACK, None).await?;
    let now = now_millis();
    let post = ForumPost {
        id: Uuid::new_v4(),
        user_id: author,
        game_id: request.game_id,
        title: request.title,
        slug,
        content: request.content,
        tags: request.tags,
        status: PostStatus::Active,
        is_pinned: request.is_pinned,
        is_locked: request.is_locked,
        views: 0,
        likes: 0,
        replies_count: 0,
        last_reply_at: None,
        created_at: now,
        updated_at: now,
    };
    posts.insert(&post).await?;

    state.events().publish(
        TOPIC,
        "post.created",
        json!({ "post_id": post.id, "user_id": author, "slug": post.slug }),
    );
    Ok(with_author(state, post).await)
}

/// Active posts, pinned first, then by the requested order.
pub async fn list_posts(
    state: &SharedState,
    params: PostListParams,
) -> Result<PostPage, ServiceError> {
    let (page, per_page) = PageParams {
        page: params.page,
        per_page: params.per_page,
    }
    .resolve(20, 100);

    let mut filter = Filter::eq("status", "active");
    if let Some(game_id) = params.game_id {
        filter = filter.and(Filter::id("game_id", game_id));
    }
    if let Some(search) = params.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        filter = filter.and(Filter::contains(&["title", "content"], search));
    }

    let posts = state.repo::<ForumPost>().await?;
    let total = posts.count(filter.clone()).await?;
    let order = match params.sort_by.unwrap_or_default() {
        PostSort::Newest => "created_at",
        PostSort::Popular => "views",
        PostSort::Replies => "replies_count",
        PostSort::Likes => "likes",
    };
    let mut query = Query::new(filter).sort_desc("is_pinned").sort_desc(order);
    if order != "created_at" {
        query = query.sort_desc("created_at");
    }
    let items = posts
        .find(query.skip((page - 1) * per_page).limit(per_page))
        .await?;

    let author_ids: Vec<Uuid> = items.iter().map(|post| post.user_id).collect();
    let profiles = state.peers().fetch_profiles(&author_ids).await;
    Ok(PostPage {
        items: items
            .into_iter()
            .map(|post| {
                let author = profiles.get(&post.user_id);
                PostResponse::new(post, author)
            })
            .collect(),
        total,
        page,
        per_page,
        total_pages: total_pages(total, per_page),
    })
}

/// Fetch a post and count the view.
pub async fn view_post(state: &SharedState, id: Uuid) -> Result<PostResponse, ServiceError> {
    let mut post = load_post(state, id).await?;
    post.views += 1;
    state.repo::<ForumPost>().await?.replace(&post).await?;
    Ok(with_author(state, post).await)
}

pub async fn update_post(
    state: &SharedState,
    id: Uuid,
    caller: Uuid,
    request: UpdatePostRequest,
) -> Result<PostResponse, ServiceError> {
    let mut post = load_post(state, id).await?;
    ensure_author(&post, caller)?;
    let posts = state.repo::<ForumPost>().await?;

    if let Some(title) = request.title
        && title != post.title
    {
        post.slug = unique_slug(&posts, &title, SLUG_FALLBACK, Some(post.id)).await?;
        post.title = title;
    }
    if let Some(content) = request.content {
        post.content = content;
    }
    if let Some(tags) = request.tags {
        post.tags = tags;
    }
    if let Some(pinned) = request.is_pinned {
        post.is_pinned = pinned;
    }
    if let Some(locked) = request.is_locked {
        post.is_locked = locked;
    }
    post.updated_at = now_millis();
    posts.replace(&post).await?;

    state.events().publish(TOPIC, "post.updated", json!({ "post_id": post.id }));
    Ok(with_author(state, post).await)
}

/// Soft delete; the post disappears from reads but keeps its replies.
pub async fn delete_post(state: &SharedState, id: Uuid, caller: Uuid) -> Result<(), ServiceError> {
    let mut post = load_post(state, id).await?;
    ensure_author(&post, caller)?;
    post.status = PostStatus::Deleted;
    post.updated_at = now_millis();
    state.repo::<ForumPost>().await?.replace(&post).await?;

    state.events().publish(TOPIC, "post.deleted", json!({ "post_id": id }));
    Ok(())
}

pub async fn toggle_like(
    state: &SharedState,
    id: Uuid,
    user_id: Uuid,
) -> Result<LikeResponse, ServiceError> {
    let mut post = load_post(state, id).await?;
    let likes = state.repo::<ForumPostLike>().await?;
    let existing = likes
        .find_one(Filter::id("post_id", id).and(Filter::id("user_id", user_id)))
        .await?;

    let liked = match existing {
        Some(like) => {
            likes.delete(like.id).await?;
            post.likes = post.likes.saturating_sub(1);
            false
        }
        None => {
            likes
                .insert(&ForumPostLike {
                    id: Uuid::new_v4(),
                    post_id: id,
                    user_id,
                    created_at: now_millis(),
                })
                .await?;
            post.likes += 1;
            true
        }
    };
    state.repo::<ForumPost>().await?.replace(&post).await?;

    Ok(LikeResponse {
        liked,
        likes: post.likes,
    })
}

pub async fn create_reply(
    state: &SharedState,
    post_id: Uuid,
    author: Uuid,
    request: CreateReplyRequest,
) -> Result<ReplyResponse, ServiceError> {
    let mut post = load_post(state, post_id).await?;
    if post.is_locked {
        return Err(ServiceError::InvalidState("post is locked".into()));
    }
    let replies = state.repo::<ForumReply>().await?;
    if let Some(parent_id) = request.parent_reply_id {
        let parent = replies
            .get(parent_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("parent reply"))?;
        if parent.post_id != post_id {
            return Err(ServiceError::InvalidInput(
                "parent reply belongs to another post".into(),
            ));
        }
    }

    let now = now_millis();
    let reply = ForumReply {
        id: Uuid::new_v4(),
        post_id,
        user_id: author,
        content: request.content,
        parent_reply_id: request.parent_reply_id,
        created_at: now,
        updated_at: now,
    };
    replies.insert(&reply).await?;

    post.replies_count += 1;
    post.last_reply_at = Some(now);
    state.repo::<ForumPost>().await?.replace(&post).await?;

    state.events().publish(
        TOPIC,
        "reply.created",
        json!({ "post_id": post_id, "reply_id": reply.id, "user_id": author }),
    );
    let profiles = state.peers().fetch_profiles(&[author]).await;
    Ok(ReplyResponse::new(reply, profiles.get(&author)))
}

fn nest_reply(
    reply: ForumReply,
    children: &mut HashMap<Uuid, Vec<ForumReply>>,
    profiles: &HashMap<Uuid, PeerProfile>,
) -> ReplyResponse {
    let nested = children.remove(&reply.id).unwrap_or_default();
    let author = profiles.get(&reply.user_id);
    let mut response = ReplyResponse::new(reply, author);
    response.child_replies = nested
        .into_iter()
        .map(|child| nest_reply(child, children, profiles))
        .collect();
    response
}

/// Top-level replies, oldest first, each carrying its nested children.
pub async fn list_replies(
    state: &SharedState,
    post_id: Uuid,
) -> Result<Vec<ReplyResponse>, ServiceError> {
    load_post(state, post_id).await?;
    let replies = state
        .repo::<ForumReply>()
        .await?
        .find(Query::new(Filter::id("post_id", post_id)).sort_asc("created_at"))
        .await?;

    let mut author_ids: Vec<Uuid> = replies.iter().map(|reply| reply.user_id).collect();
    author_ids.sort_unstable();
    author_ids.dedup();
    let profiles = state.peers().fetch_profiles(&author_ids).await;

    let mut children: HashMap<Uuid, Vec<ForumReply>> = HashMap::new();
    let mut roots = Vec::new();
    for reply in replies {
        match reply.parent_reply_id {
            Some(parent) => children.entry(parent).or_default().push(reply),
            None => roots.push(reply),
        }
    }

    Ok(roots
        .into_iter()
        .map(|reply| nest_reply(reply, &mut children, &profiles))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::memory_state;

    fn post(title: &str) -> CreatePostRequest {
        CreatePostRequest {
            title: title.into(),
            content: "Let's talk about builds".into(),
            tags: vec!["guides".into()],
            game_id: None,
            is_pinned: false,
            is_locked: false,
        }
    }

    #[tokio::test]
    async fn only_the_author_edits_and_titles_reslug() {
        let state = memory_state().await;
        let (author, stranger) = (Uuid::new_v4(), Uuid::new_v4());
        let first = create_post(&state, author, post("Best Builds")).await.unwrap();
        let second = create_post(&state, author, post("Best Builds")).await.unwrap();
        assert_eq!(first.slug, "best-builds");
        assert_eq!(second.slug, "best-builds-1");

        let denied = update_post(
            &state,
            first.id,
            stranger,
            UpdatePostRequest {
                content: Some("hijacked".into()),
                ..UpdatePostRequest::default()
            },
        )
        .await;
        assert!(matches!(denied, Err(ServiceError::Forbidden(_))));

        let renamed = update_post(
            &state,
            second.id,
            author,
            UpdatePostRequest {
                title: Some("Speedrun Routes".into()),
                ..UpdatePostRequest::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(renamed.slug, "speedrun-routes");

        delete_post(&state, first.id, author).await.unwrap();
        assert!(matches!(
            view_post(&state, first.id).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn views_likes_and_pinned_ordering() {
        let state = memory_state().await;
        let author = Uuid::new_v4();
        let plain = create_post(&state, author, post("Plain")).await.unwrap();
        let pinned = create_post(
            &state,
            author,
            CreatePostRequest {
                is_pinned: true,
                ..post("Pinned")
            },
        )
        .await
        .unwrap();

        assert_eq!(view_post(&state, plain.id).await.unwrap().views, 1);
        let fan = Uuid::new_v4();
        assert_eq!(
            toggle_like(&state, plain.id, fan).await.unwrap(),
            LikeResponse { liked: true, likes: 1 }
        );
        assert_eq!(
            toggle_like(&state, plain.id, fan).await.unwrap(),
            LikeResponse { liked: false, likes: 0 }
        );

        let page = list_posts(
            &state,
            PostListParams {
                sort_by: Some(PostSort::Popular),
                ..PostListParams::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items[0].id, pinned.id);
        assert_eq!(page.items[1].id, plain.id);
    }

    #[tokio::test]
    async fn replies_nest_and_respect_locks() {
        let state = memory_state().await;
        let author = Uuid::new_v4();
        let open = create_post(&state, author, post("Open")).await.unwrap();
        let locked = create_post(
            &state,
            author,
            CreatePostRequest {
                is_locked: true,
                ..post("Locked")
            },
        )
        .await
        .unwrap();

        let reply = |parent_reply_id| CreateReplyRequest {
            content: "agreed".into(),
            parent_reply_id,
        };
        assert!(matches!(
            create_reply(&state, locked.id, author, reply(None)).await,
            Err(ServiceError::InvalidState(_))
        ));

        let top = create_reply(&state, open.id, author, reply(None)).await.unwrap();
        create_reply(&state, open.id, author, reply(Some(top.id))).await.unwrap();
        let other = create_post(&state, author, post("Other")).await.unwrap();
        assert!(matches!(
            create_reply(&state, other.id, author, reply(Some(top.id))).await,
            Err(ServiceError::InvalidInput(_))
        ));

        let thread = list_replies(&state, open.id).await.unwrap();
        assert_eq!(thread.len(), 1);
        assert_eq!(thread[0].child_replies.len(), 1);
        assert_eq!(view_post(&state, open.id).await.unwrap().replies_count, 2);
    }
}
