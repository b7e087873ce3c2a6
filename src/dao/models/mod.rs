//! Persisted entities, one module per service domain.

pub mod achievements;
pub mod catalog;
pub mod forum;
pub mod notifications;
pub mod online;
pub mod payments;
pub mod purchases;
pub mod recommendations;
pub mod reviews;
pub mod shopping;
pub mod social;
pub mod users;
pub mod workshop;

use std::time::{SystemTime, UNIX_EPOCH};

use crate::dao::{
    document_store::{DocumentStore, ensure_entity_indexes},
    storage::StorageResult,
};

/// Unix epoch milliseconds, the timestamp representation of every entity.
pub type Millis = i64;

/// Current wall-clock time in Unix milliseconds.
pub fn now_millis() -> Millis {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as Millis)
        .unwrap_or_default()
}

/// Declare the unique indexes of every entity on a freshly connected store.
pub async fn ensure_indexes(store: &dyn DocumentStore) -> StorageResult<()> {
    ensure_entity_indexes::<users::User>(store).await?;
    ensure_entity_indexes::<users::UserPreference>(store).await?;
    ensure_entity_indexes::<catalog::Game>(store).await?;
    ensure_entity_indexes::<catalog::Genre>(store).await?;
    ensure_entity_indexes::<catalog::Tag>(store).await?;
    ensure_entity_indexes::<catalog::Platform>(store).await?;
    ensure_entity_indexes::<reviews::Review>(store).await?;
    ensure_entity_indexes::<reviews::ReviewVote>(store).await?;
    ensure_entity_indexes::<shopping::CartItem>(store).await?;
    ensure_entity_indexes::<shopping::WishlistItem>(store).await?;
    ensure_entity_indexes::<social::Friendship>(store).await?;
    ensure_entity_indexes::<social::Follow>(store).await?;
    ensure_entity_indexes::<recommendations::UserGameInteraction>(store).await?;
    ensure_entity_indexes::<forum::ForumPost>(store).await?;
    ensure_entity_indexes::<forum::ForumPostLike>(store).await?;
    ensure_entity_indexes::<workshop::WorkshopItem>(store).await?;
    ensure_entity_indexes::<workshop::WorkshopVote>(store).await?;
    ensure_entity_indexes::<workshop::WorkshopRating>(store).await?;
    ensure_entity_indexes::<online::UserPresence>(store).await?;
    ensure_entity_indexes::<achievements::Achievement>(store).await?;
    ensure_entity_indexes::<achievements::UserAchievement>(store).await?;
    ensure_entity_indexes::<achievements::UserScore>(store).await?;
    Ok(())
}
