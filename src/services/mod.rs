/// Achievement definitions, user progress, star tokens and leaderboard.
pub mod achievements_service;
/// Keyword scoring applied to freshly published workshop items.
pub mod auto_moderation;
/// Games, genres, tags and platforms.
pub mod catalog_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Discussion posts, likes and threaded replies.
pub mod forum_service;
/// Health check service.
pub mod health_service;
pub mod notifications_service;
/// Presence, direct messages and multiplayer lobbies.
pub mod online_service;
/// Simulated payment provider.
pub mod payments_service;
/// Best-effort HTTP calls to sibling services.
pub mod peers;
pub mod purchases_service;
/// Stored recommendations, interactions and model training.
pub mod recommendations_service;
/// Collaborative filtering over the user/game interaction matrix.
pub mod recommender;
pub mod reviews_service;
pub mod shopping_service;
/// URL slug generation.
pub mod slug;
pub mod social_service;
/// Server-Sent Events streaming of lobby activity.
pub mod sse_service;
/// Storage connection supervision with exponential backoff.
pub mod storage_supervisor;
/// Accounts, sessions and preferences.
pub mod users_service;
/// Lobby chat over WebSocket, fed by the event bus.
pub mod websocket_service;
pub mod workshop_service;
pub mod workshop_storage;
