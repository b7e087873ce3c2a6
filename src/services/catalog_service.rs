use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::{
    dao::{
        document_store::{Entity, Filter, Query},
        models::{
            Millis, now_millis,
            catalog::{Game, Genre, Platform, Tag},
        },
    },
    dto::{
        PageParams, parse_timestamp,
        catalog::{
            CreateGameRequest, GamePage, GameResponse, GameSearchParams, GameSort, GenreRequest,
            GenreResponse, PlatformRequest, PlatformResponse, TagRequest, TagResponse,
            UpdateGameRequest,
        },
        total_pages,
    },
    error::ServiceError,
    services::slug::unique_slug,
    state::SharedState,
};

const TOPIC: &str = "catalog";
const SEARCH_FIELDS: &[&str] = &["title", "description", "developer", "publisher"];

fn release_date(raw: Option<&str>) -> Result<Option<Millis>, ServiceError> {
    raw.map(|raw| {
        parse_timestamp(raw)
            .ok_or_else(|| ServiceError::InvalidInput(format!("invalid release_date `{raw}`")))
    })
    .transpose()
}

/// Reject references to genres, tags or platforms that do not exist.
async fn ensure_known<T: Entity>(
    state: &SharedState,
    ids: &[Uuid],
    what: &str,
) -> Result<(), ServiceError> {
    if ids.is_empty() {
        return Ok(());
    }
    let mut unique = ids.to_vec();
    unique.sort_unstable();
    unique.dedup();
    let found = state
        .repo::<T>()
        .await?
        .count(Filter::any_of("id", unique.iter().map(Uuid::to_string)))
        .await?;
    if found as usize != unique.len() {
        return Err(ServiceError::InvalidInput(format!(
            "unknown {what} id in request"
        )));
    }
    Ok(())
}

async fn load_game(state: &SharedState, id: Uuid) -> Result<Game, ServiceError> {
    state
        .repo::<Game>()
        .await?
        .get(id)
        .await?
        .ok_or_else(|| ServiceError::not_found("game"))
}

pub async fn create_game(
    state: &SharedState,
    request: CreateGameRequest,
) -> Result<GameResponse, ServiceError> {
    ensure_known::<Genre>(state, &request.genre_ids, "genre").await?;
    ensure_known::<Tag>(state, &request.tag_ids, "tag").await?;
    ensure_known::<Platform>(state, &request.platform_ids, "platform").await?;
    let release_date = release_date(request.release_date.as_deref())?;

    let games = state.repo::<Game>().await?;
    let slug = unique_slug(&games, &request.title, "game", None).await?;
    let now = now_millis();
    let mut game = Game {
        id: Uuid::new_v4(),
        title: request.title,
        slug,
        description: request.description,
        short_description: request.short_description,
        developer: request.developer,
        publisher: request.publisher,
        price: request.price,
        original_price: request.original_price,
        discount_percent: 0,
        currency: request.currency,
        status: request.status,
        release_date,
        is_featured: request.is_featured,
        genre_ids: request.genre_ids,
        tag_ids: request.tag_ids,
        platform_ids: request.platform_ids,
        header_image_url: request.header_image_url,
        average_rating: 0.0,
        total_reviews: 0,
        created_at: now,
        updated_at: now,
    };
    game.refresh_discount();
    games.insert(&game).await?;

    info!(game_id = %game.id, slug = %game.slug, "game created");
    state.events().publish(
        TOPIC,
        "game.created",
        json!({ "game_id": game.id, "slug": game.slug, "price": game.price }),
    );
    Ok(game.into())
}

pub async fn get_game(state: &SharedState, id: Uuid) -> Result<GameResponse, ServiceError> {
    Ok(load_game(state, id).await?.into())
}

pub async fn get_game_by_slug(
    state: &SharedState,
    slug: &str,
) -> Result<GameResponse, ServiceError> {
    state
        .repo::<Game>()
        .await?
        .find_one(Filter::eq("slug", slug.to_lowercase()))
        .await?
        .map(Into::into)
        .ok_or_else(|| ServiceError::not_found("game"))
}

/// Apply a partial update and recompute the discount.
pub async fn update_game(
    state: &SharedState,
    id: Uuid,
    request: UpdateGameRequest,
) -> Result<GameResponse, ServiceError> {
    let mut game = load_game(state, id).await?;

    if let Some(ids) = &request.genre_ids {
        ensure_known::<Genre>(state, ids, "genre").await?;
    }
    if let Some(ids) = &request.tag_ids {
        ensure_known::<Tag>(state, ids, "tag").await?;
    }
    if let Some(ids) = &request.platform_ids {
        ensure_known::<Platform>(state, ids, "platform").await?;
    }
    if let Some(date) = release_date(request.release_date.as_deref())? {
        game.release_date = Some(date);
    }

    let games = state.repo::<Game>().await?;
    if let Some(title) = request.title {
        if title != game.title {
            game.slug = unique_slug(&games, &title, "game", Some(game.id)).await?;
        }
        game.title = title;
    }
    if let Some(description) = request.description {
        game.description = Some(description);
    }
    if let Some(short_description) = request.short_description {
        game.short_description = Some(short_description);
    }
    if let Some(developer) = request.developer {
        game.developer = Some(developer);
    }
    if let Some(publisher) = request.publisher {
        game.publisher = Some(publisher);
    }
    if let Some(price) = request.price {
        game.price = price;
    }
    if let Some(original_price) = request.original_price {
        game.original_price = Some(original_price);
    }
    if let Some(currency) = request.currency {
        game.currency = currency;
    }
    if let Some(status) = request.status {
        game.status = status;
    }
    if let Some(is_featured) = request.is_featured {
        game.is_featured = is_featured;
    }
    if let Some(ids) = request.genre_ids {
        game.genre_ids = ids;
    }
    if let Some(ids) = request.tag_ids {
        game.tag_ids = ids;
    }
    if let Some(ids) = request.platform_ids {
        game.platform_ids = ids;
    }
    if let Some(url) = request.header_image_url {
        game.header_image_url = Some(url);
    }
    game.refresh_discount();
    game.updated_at = now_millis();

    if !games.replace(&game).await? {
        return Err(ServiceError::not_found("game"));
    }
    state.events().publish(
        TOPIC,
        "game.updated",
        json!({ "game_id": game.id, "price": game.price, "discount_percent": game.discount_percent }),
    );
    Ok(game.into())
}

pub async fn delete_game(state: &SharedState, id: Uuid) -> Result<(), ServiceError> {
    if !state.repo::<Game>().await?.delete(id).await? {
        return Err(ServiceError::not_found("game"));
    }
    info!(game_id = %id, "game deleted");
    state
        .events()
        .publish(TOPIC, "game.deleted", json!({ "game_id": id }));
    Ok(())
}

fn search_filter(params: &GameSearchParams) -> Filter {
    let mut filter = Filter::All;
    if let Some(q) = params.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        filter = filter.and(Filter::contains(SEARCH_FIELDS, q));
    }
    if let Some(id) = params.genre_id {
        filter = filter.and(Filter::id("genre_ids", id));
    }
    if let Some(id) = params.tag_id {
        filter = filter.and(Filter::id("tag_ids", id));
    }
    if let Some(id) = params.platform_id {
        filter = filter.and(Filter::id("platform_ids", id));
    }
    if let Some(min) = params.min_price {
        filter = filter.and(Filter::gte("price", min));
    }
    if let Some(max) = params.max_price {
        filter = filter.and(Filter::lte("price", max));
    }
    if params.on_sale == Some(true) {
        filter = filter.and(Filter::gt("discount_percent", 0));
    }
    filter
}

fn sorted(query: Query, sort: GameSort) -> Query {
    match sort {
        GameSort::Newest => query.sort_desc("created_at"),
        GameSort::PriceAsc => query.sort_asc("price").sort_asc("title"),
        GameSort::PriceDesc => query.sort_desc("price").sort_asc("title"),
        GameSort::Title => query.sort_asc("title"),
        GameSort::Rating => query.sort_desc("average_rating").sort_desc("total_reviews"),
    }
}

/// Filtered, sorted and paged catalog search.
pub async fn search_games(
    state: &SharedState,
    params: GameSearchParams,
) -> Result<GamePage, ServiceError> {
    let (page, per_page) = PageParams {
        page: params.page,
        per_page: params.per_page,
    }
    .resolve(20, 100);
    let filter = search_filter(&params);
    let games = state.repo::<Game>().await?;

    let total = games.count(filter.clone()).await?;
    let query = sorted(Query::new(filter), params.sort.unwrap_or_default())
        .skip((page - 1) * per_page)
        .limit(per_page);
    let items = games.find(query).await?;

    Ok(GamePage {
        items: items.into_iter().map(Into::into).collect(),
        total,
        page,
        per_page,
        total_pages: total_pages(total, per_page),
    })
}

async fn listed(
    state: &SharedState,
    query: Query,
) -> Result<Vec<GameResponse>, ServiceError> {
    let games = state.repo::<Game>().await?.find(query).await?;
    Ok(games.into_iter().map(Into::into).collect())
}

pub async fn featured_games(
    state: &SharedState,
    limit: u64,
) -> Result<Vec<GameResponse>, ServiceError> {
    let filter = Filter::eq("is_featured", true).and(Filter::ne("status", "delisted"));
    listed(
        state,
        Query::new(filter).sort_desc("average_rating").limit(limit),
    )
    .await
}

/// Games already released, most recent release first.
pub async fn new_releases(
    state: &SharedState,
    limit: u64,
) -> Result<Vec<GameResponse>, ServiceError> {
    let filter = Filter::lte("release_date", now_millis()).and(Filter::ne("status", "delisted"));
    listed(
        state,
        Query::new(filter).sort_desc("release_date").limit(limit),
    )
    .await
}

pub async fn on_sale(state: &SharedState, limit: u64) -> Result<Vec<GameResponse>, ServiceError> {
    let filter = Filter::gt("discount_percent", 0).and(Filter::ne("status", "delisted"));
    listed(
        state,
        Query::new(filter)
            .sort_desc("discount_percent")
            .sort_asc("price")
            .limit(limit),
    )
    .await
}

async fn ensure_name_free<T: Entity>(
    state: &SharedState,
    name: &str,
    what: &str,
) -> Result<(), ServiceError> {
    if state
        .repo::<T>()
        .await?
        .count(Filter::eq("name", name))
        .await?
        > 0
    {
        return Err(ServiceError::Conflict(format!("{what} `{name}` already exists")));
    }
    Ok(())
}

pub async fn create_genre(
    state: &SharedState,
    request: GenreRequest,
) -> Result<GenreResponse, ServiceError> {
    let name = request.name.trim().to_owned();
    ensure_name_free::<Genre>(state, &name, "genre").await?;
    let genre = Genre {
        id: Uuid::new_v4(),
        name,
        description: request.description,
        created_at: now_millis(),
    };
    state.repo::<Genre>().await?.insert(&genre).await?;
    Ok(genre.into())
}

pub async fn list_genres(state: &SharedState) -> Result<Vec<GenreResponse>, ServiceError> {
    let genres = state
        .repo::<Genre>()
        .await?
        .find(Query::all().sort_asc("name"))
        .await?;
    Ok(genres.into_iter().map(Into::into).collect())
}

pub async fn get_genre(state: &SharedState, id: Uuid) -> Result<GenreResponse, ServiceError> {
    state
        .repo::<Genre>()
        .await?
        .get(id)
        .await?
        .map(Into::into)
        .ok_or_else(|| ServiceError::not_found("genre"))
}

pub async fn create_tag(
    state: &SharedState,
    request: TagRequest,
) -> Result<TagResponse, ServiceError> {
    let name = request.name.trim().to_owned();
    ensure_name_free::<Tag>(state, &name, "tag").await?;
    let tag = Tag {
        id: Uuid::new_v4(),
        name,
        category: request.category,
        created_at: now_millis(),
    };
    state.repo::<Tag>().await?.insert(&tag).await?;
    Ok(tag.into())
}

pub async fn list_tags(state: &SharedState) -> Result<Vec<TagResponse>, ServiceError> {
    let tags = state
        .repo::<Tag>()
        .await?
        .find(Query::all().sort_asc("name"))
        .await?;
    Ok(tags.into_iter().map(Into::into).collect())
}

pub async fn get_tag(state: &SharedState, id: Uuid) -> Result<TagResponse, ServiceError> {
    state
        .repo::<Tag>()
        .await?
        .get(id)
        .await?
        .map(Into::into)
        .ok_or_else(|| ServiceError::not_found("tag"))
}

pub async fn create_platform(
    state: &SharedState,
    request: PlatformRequest,
) -> Result<PlatformResponse, ServiceError> {
    let name = request.name.trim().to_owned();
    ensure_name_free::<Platform>(state, &name, "platform").await?;
    let platform = Platform {
        id: Uuid::new_v4(),
        name,
        display_name: request.display_name,
        created_at: now_millis(),
    };
    state.repo::<Platform>().await?.insert(&platform).await?;
    Ok(platform.into())
}

pub async fn list_platforms(state: &SharedState) -> Result<Vec<PlatformResponse>, ServiceError> {
    let platforms = state
        .repo::<Platform>()
        .await?
        .find(Query::all().sort_asc("name"))
        .await?;
    Ok(platforms.into_iter().map(Into::into).collect())
}

pub async fn get_platform(
    state: &SharedState,
    id: Uuid,
) -> Result<PlatformResponse, ServiceError> {
    state
        .repo::<Platform>()
        .await?
        .get(id)
        .await?
        .map(Into::into)
        .ok_or_else(|| ServiceError::not_found("platform"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{dao::models::catalog::GameStatus, state::test_support::memory_state};

    fn game(title: &str, price: i64, original_price: Option<i64>) -> CreateGameRequest {
        CreateGameRequest {
            title: title.into(),
            description: Some(format!("{title} description")),
            short_description: None,
            developer: Some("Valve".into()),
            publisher: None,
            price,
            original_price,
            currency: "USD".into(),
            status: GameStatus::Released,
            release_date: Some("2020-03-23T00:00:00Z".into()),
            is_featured: false,
            genre_ids: Vec::new(),
            tag_ids: Vec::new(),
            platform_ids: Vec::new(),
            header_image_url: None,
        }
    }

    #[tokio::test]
    async fn slugs_are_deduplicated_and_discount_computed() {
        let state = memory_state().await;
        let first = create_game(&state, game("Half-Life: Alyx", 4499, Some(5999)))
            .await
            .unwrap();
        let second = create_game(&state, game("Half Life Alyx", 4499, None))
            .await
            .unwrap();

        assert_eq!(first.slug, "half-life-alyx");
        assert_eq!(second.slug, "half-life-alyx-1");
        assert_eq!(first.discount_percent, 25);
        assert_eq!(second.discount_percent, 0);
        assert_eq!(
            get_game_by_slug(&state, "half-life-alyx-1").await.unwrap().id,
            second.id
        );
    }

    #[tokio::test]
    async fn update_recomputes_discount() {
        let state = memory_state().await;
        let created = create_game(&state, game("Portal", 999, Some(1999)))
            .await
            .unwrap();
        let updated = update_game(
            &state,
            created.id,
            UpdateGameRequest {
                price: Some(2999),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.discount_percent, 0);
        assert_eq!(updated.slug, "portal");
    }

    #[tokio::test]
    async fn unknown_references_are_rejected() {
        let state = memory_state().await;
        let mut request = game("Dota", 0, None);
        request.genre_ids = vec![Uuid::new_v4()];
        let err = create_game(&state, request).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn search_filters_sorts_and_pages() {
        let state = memory_state().await;
        let action = create_genre(
            &state,
            GenreRequest {
                name: "Action".into(),
                description: None,
            },
        )
        .await
        .unwrap();

        for (title, price) in [("Alpha", 500), ("Bravo", 1500), ("Charlie", 2500)] {
            let mut request = game(title, price, Some(3000));
            request.genre_ids = vec![action.id];
            create_game(&state, request).await.unwrap();
        }
        create_game(&state, game("Delta", 100, None)).await.unwrap();

        let page = search_games(
            &state,
            GameSearchParams {
                genre_id: Some(action.id),
                min_price: Some(1000),
                sort: Some(GameSort::PriceDesc),
                per_page: Some(1),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.items[0].title, "Charlie");

        let on_sale_only = search_games(
            &state,
            GameSearchParams {
                on_sale: Some(true),
                q: Some("ALPHA".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(on_sale_only.total, 1);

        let sale = on_sale(&state, 10).await.unwrap();
        assert_eq!(sale.len(), 3);
        assert_eq!(sale[0].title, "Alpha");
    }

    #[tokio::test]
    async fn duplicate_names_conflict() {
        let state = memory_state().await;
        let request = || TagRequest {
            name: "Co-op".into(),
            category: None,
        };
        create_tag(&state, request()).await.unwrap();
        assert!(matches!(
            create_tag(&state, request()).await,
            Err(ServiceError::Conflict(_))
        ));
        assert_eq!(list_tags(&state).await.unwrap().len(), 1);
    }
}
