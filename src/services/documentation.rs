use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme},
};

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for every storefront domain.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::health::service_info,
        crate::routes::users::register,
        crate::routes::users::login,
        crate::routes::users::me,
        crate::routes::users::update_me,
        crate::routes::users::change_password,
        crate::routes::users::logout,
        crate::routes::users::list_users,
        crate::routes::users::get_user,
        crate::routes::users::list_preferences,
        crate::routes::users::upsert_preference,
        crate::routes::users::update_preference,
        crate::routes::users::list_sessions,
        crate::routes::catalog::create_game,
        crate::routes::catalog::search_games,
        crate::routes::catalog::get_game,
        crate::routes::catalog::get_game_by_slug,
        crate::routes::catalog::update_game,
        crate::routes::catalog::delete_game,
        crate::routes::catalog::featured_games,
        crate::routes::catalog::new_releases,
        crate::routes::catalog::on_sale,
        crate::routes::catalog::create_genre,
        crate::routes::catalog::list_genres,
        crate::routes::catalog::get_genre,
        crate::routes::catalog::create_tag,
        crate::routes::catalog::list_tags,
        crate::routes::catalog::get_tag,
        crate::routes::catalog::create_platform,
        crate::routes::catalog::list_platforms,
        crate::routes::catalog::get_platform,
        crate::routes::reviews::create_review,
        crate::routes::reviews::get_review,
        crate::routes::reviews::game_reviews,
        crate::routes::reviews::user_reviews,
        crate::routes::reviews::update_review,
        crate::routes::reviews::delete_review,
        crate::routes::reviews::add_comment,
        crate::routes::reviews::list_comments,
        crate::routes::reviews::vote,
        crate::routes::shopping::create_cart,
        crate::routes::shopping::get_cart,
        crate::routes::shopping::user_cart,
        crate::routes::shopping::add_item,
        crate::routes::shopping::update_item,
        crate::routes::shopping::remove_item,
        crate::routes::shopping::clear_cart,
        crate::routes::shopping::create_wishlist,
        crate::routes::shopping::get_wishlist,
        crate::routes::shopping::user_wishlists,
        crate::routes::shopping::add_wishlist_item,
        crate::routes::shopping::remove_wishlist_item,
        crate::routes::purchases::create_purchase,
        crate::routes::purchases::get_purchase,
        crate::routes::purchases::user_purchases,
        crate::routes::purchases::update_purchase,
        crate::routes::purchases::request_refund,
        crate::routes::purchases::get_refund,
        crate::routes::purchases::user_refunds,
        crate::routes::payments::create_intent,
        crate::routes::payments::get_intent,
        crate::routes::payments::create_charge,
        crate::routes::payments::create_refund,
        crate::routes::online::update_presence,
        crate::routes::online::get_presence,
        crate::routes::online::list_presence,
        crate::routes::online::send_message,
        crate::routes::online::conversation,
        crate::routes::online::create_lobby,
        crate::routes::online::list_lobbies,
        crate::routes::online::get_lobby,
        crate::routes::online::join_lobby,
        crate::routes::online::leave_lobby,
        crate::routes::online::set_ready,
        crate::routes::online::post_lobby_message,
        crate::routes::online::lobby_messages,
        crate::routes::online::lobby_events,
        crate::routes::online::lobby_socket,
        crate::routes::social::send_friend_request,
        crate::routes::social::respond_friend_request,
        crate::routes::social::pending_requests,
        crate::routes::social::list_friends,
        crate::routes::social::follow,
        crate::routes::social::unfollow,
        crate::routes::social::following,
        crate::routes::social::followers,
        crate::routes::notifications::create_notification,
        crate::routes::notifications::user_notifications,
        crate::routes::notifications::mark_read,
        crate::routes::recommendations::replace_batch,
        crate::routes::recommendations::user_recommendations,
        crate::routes::recommendations::record_feedback,
        crate::routes::recommendations::ingest_interactions,
        crate::routes::recommendations::train,
        crate::routes::recommendations::generate,
        crate::routes::achievements::create_achievement,
        crate::routes::achievements::list_achievements,
        crate::routes::achievements::get_achievement,
        crate::routes::achievements::update_achievement,
        crate::routes::achievements::record_progress,
        crate::routes::achievements::user_overview,
        crate::routes::achievements::leaderboard,
        crate::routes::forum::create_post,
        crate::routes::forum::list_posts,
        crate::routes::forum::get_post,
        crate::routes::forum::update_post,
        crate::routes::forum::delete_post,
        crate::routes::forum::toggle_like,
        crate::routes::forum::create_reply,
        crate::routes::forum::list_replies,
        crate::routes::workshop::create_item,
        crate::routes::workshop::upload_item,
        crate::routes::workshop::list_items,
        crate::routes::workshop::get_item,
        crate::routes::workshop::update_item,
        crate::routes::workshop::delete_item,
        crate::routes::workshop::vote,
        crate::routes::workshop::record_download,
        crate::routes::workshop::moderate,
        crate::routes::workshop::add_comment,
        crate::routes::workshop::list_comments,
        crate::routes::workshop::rate,
        crate::routes::workshop::rating_summary,
        crate::routes::workshop::reset,
    ),
    components(
        schemas(
            crate::dto::MessageResponse,
            crate::dto::health::HealthResponse,
            crate::dto::health::ServiceInfo,
            crate::dto::online::LobbySocketFrame,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Liveness and process information"),
        (name = "users", description = "Accounts, sessions and preferences"),
        (name = "catalog", description = "Games, genres, tags and platforms"),
        (name = "reviews", description = "Game reviews, comments and helpfulness votes"),
        (name = "shopping", description = "Carts and wishlists"),
        (name = "purchases", description = "Orders and refunds"),
        (name = "payments", description = "Payment intents, charges and refunds"),
        (name = "online", description = "Presence, direct messages and lobbies"),
        (name = "social", description = "Friends and follows"),
        (name = "notifications", description = "User notifications"),
        (name = "recommendations", description = "Personalised recommendations and model training"),
        (name = "achievements", description = "Achievements, progress and leaderboard"),
        (name = "forum", description = "Discussion posts and replies"),
        (name = "workshop", description = "User-generated content"),
    )
)]
pub struct ApiDoc;

/// Registers the bearer token and admin token schemes referenced by handlers.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
        );
        components.add_security_scheme(
            "admin_token",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("x-admin-token"))),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_domain() {
        let doc = ApiDoc::openapi();
        for prefix in ["users", "catalog", "online", "achievements", "workshop"] {
            assert!(
                doc.paths
                    .paths
                    .keys()
                    .any(|path| path.starts_with(&format!("/api/v1/{prefix}"))),
                "missing {prefix} paths"
            );
        }
        let schemes = doc.components.expect("components").security_schemes;
        assert!(schemes.contains_key("bearer"));
        assert!(schemes.contains_key("admin_token"));
    }
}
