use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::{
    dao::{
        document_store::{Filter, Query},
        models::{
            now_millis,
            shopping::{
                AmountOverflow, CartItem, CartStatus, MAX_LINE_QUANTITY, ShoppingCart, Wishlist,
                WishlistItem,
            },
        },
    },
    dto::shopping::{
        AddCartItemRequest, AddWishlistItemRequest, CartResponse, CreateCartRequest,
        CreateWishlistRequest, UpdateCartItemRequest, WishlistResponse,
    },
    error::ServiceError,
    state::SharedState,
};

const TOPIC: &str = "shopping";

async fn load_cart(state: &SharedState, id: Uuid) -> Result<ShoppingCart, ServiceError> {
    state
        .repo::<ShoppingCart>()
        .await?
        .get(id)
        .await?
        .ok_or_else(|| ServiceError::not_found("cart"))
}

async fn active_cart(state: &SharedState, id: Uuid) -> Result<ShoppingCart, ServiceError> {
    let cart = load_cart(state, id).await?;
    if cart.status != CartStatus::Active {
        return Err(ServiceError::InvalidState("cart is no longer active".into()));
    }
    Ok(cart)
}

async fn cart_items(state: &SharedState, cart_id: Uuid) -> Result<Vec<CartItem>, ServiceError> {
    Ok(state
        .repo::<CartItem>()
        .await?
        .find(Query::new(Filter::id("cart_id", cart_id)).sort_asc("created_at"))
        .await?)
}

/// Recompute and persist the cart totals from its stored items.
async fn refresh_cart(
    state: &SharedState,
    mut cart: ShoppingCart,
) -> Result<CartResponse, ServiceError> {
    let items = cart_items(state, cart.id).await?;
    cart.recalculate(&items).map_err(out_of_range)?;
    cart.updated_at = now_millis();
    state.repo::<ShoppingCart>().await?.replace(&cart).await?;
    Ok(CartResponse::new(cart, items))
}

fn out_of_range(err: AmountOverflow) -> ServiceError {
    ServiceError::Unprocessable(err.to_string())
}

fn check_discount(unit_price: i64, quantity: i64, discount: i64) -> Result<(), ServiceError> {
    let gross = unit_price
        .checked_mul(quantity)
        .ok_or_else(|| out_of_range(AmountOverflow))?;
    if discount > gross {
        return Err(ServiceError::InvalidInput(
            "discount exceeds the line amount".into(),
        ));
    }
    Ok(())
}

pub async fn create_cart(
    state: &SharedState,
    request: CreateCartRequest,
) -> Result<CartResponse, ServiceError> {
    let now = now_millis();
    let cart = ShoppingCart {
        id: Uuid::new_v4(),
        user_id: request.user_id,
        status: CartStatus::Active,
        currency: request.currency,
        subtotal: 0,
        discount_amount: 0,
        tax_amount: 0,
        total_amount: 0,
        created_at: now,
        updated_at: now,
    };
    state.repo::<ShoppingCart>().await?.insert(&cart).await?;
    state.events().publish(
        TOPIC,
        "cart.created",
        json!({ "cart_id": cart.id, "user_id": cart.user_id }),
    );
    Ok(CartResponse::new(cart, Vec::new()))
}

pub async fn get_cart(state: &SharedState, id: Uuid) -> Result<CartResponse, ServiceError> {
    let cart = load_cart(state, id).await?;
    let items = cart_items(state, id).await?;
    Ok(CartResponse::new(cart, items))
}

/// Newest active cart of a user.
pub async fn user_cart(state: &SharedState, user_id: Uuid) -> Result<CartResponse, ServiceError> {
    let cart = state
        .repo::<ShoppingCart>()
        .await?
        .find(
            Query::new(Filter::id("user_id", user_id).and(Filter::eq("status", "active")))
                .sort_desc("created_at")
                .limit(1),
        )
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| ServiceError::not_found("active cart"))?;
    let items = cart_items(state, cart.id).await?;
    Ok(CartResponse::new(cart, items))
}

/// Add a game; adding it again bumps the quantity and takes the new price.
pub async fn add_item(
    state: &SharedState,
    cart_id: Uuid,
    request: AddCartItemRequest,
) -> Result<CartResponse, ServiceError> {
    let cart = active_cart(state, cart_id).await?;
    let items = state.repo::<CartItem>().await?;
    let now = now_millis();

    match items
        .find_one(Filter::id("cart_id", cart_id).and(Filter::id("game_id", request.game_id)))
        .await?
    {
        Some(mut item) => {
            item.quantity = item
                .quantity
                .checked_add(request.quantity)
                .filter(|quantity| *quantity <= MAX_LINE_QUANTITY)
                .ok_or_else(|| {
                    ServiceError::Unprocessable(format!(
                        "a cart line holds at most {MAX_LINE_QUANTITY} copies"
                    ))
                })?;
            item.unit_price = request.unit_price;
            item.discount_amount = request.discount_amount;
            item.game_name = request.game_name;
            check_discount(item.unit_price, item.quantity, item.discount_amount)?;
            item.refresh_total().map_err(out_of_range)?;
            item.updated_at = now;
            items.replace(&item).await?;
        }
        None => {
            check_discount(request.unit_price, request.quantity, request.discount_amount)?;
            let mut item = CartItem {
                id: Uuid::new_v4(),
                cart_id,
                game_id: request.game_id,
                game_name: request.game_name,
                quantity: request.quantity,
                unit_price: request.unit_price,
                discount_amount: request.discount_amount,
                total_price: 0,
                created_at: now,
                updated_at: now,
            };
            item.refresh_total().map_err(out_of_range)?;
            items.insert(&item).await?;
        }
    }

    state.events().publish(
        TOPIC,
        "cart.item_added",
        json!({ "cart_id": cart_id, "game_id": request.game_id }),
    );
    refresh_cart(state, cart).await
}

pub async fn update_item(
    state: &SharedState,
    item_id: Uuid,
    request: UpdateCartItemRequest,
) -> Result<CartResponse, ServiceError> {
    let items = state.repo::<CartItem>().await?;
    let mut item = items
        .get(item_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("cart item"))?;
    let cart = active_cart(state, item.cart_id).await?;

    if request.quantity == 0 {
        items.delete(item_id).await?;
    } else {
        item.quantity = request.quantity;
        if let Some(discount) = request.discount_amount {
            item.discount_amount = discount;
        }
        check_discount(item.unit_price, item.quantity, item.discount_amount)?;
        item.refresh_total().map_err(out_of_range)?;
        item.updated_at = now_millis();
        items.replace(&item).await?;
    }
    refresh_cart(state, cart).await
}

pub async fn remove_item(state: &SharedState, item_id: Uuid) -> Result<CartResponse, ServiceError> {
    let items = state.repo::<CartItem>().await?;
    let item = items
        .get(item_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("cart item"))?;
    let cart = active_cart(state, item.cart_id).await?;
    items.delete(item_id).await?;
    state.events().publish(
        TOPIC,
        "cart.item_removed",
        json!({ "cart_id": cart.id, "game_id": item.game_id }),
    );
    refresh_cart(state, cart).await
}

pub async fn clear_cart(state: &SharedState, cart_id: Uuid) -> Result<CartResponse, ServiceError> {
    let cart = active_cart(state, cart_id).await?;
    let removed = state
        .repo::<CartItem>()
        .await?
        .delete_many(Filter::id("cart_id", cart_id))
        .await?;
    info!(cart_id = %cart_id, removed, "cart cleared");
    refresh_cart(state, cart).await
}

async fn load_wishlist(state: &SharedState, id: Uuid) -> Result<Wishlist, ServiceError> {
    state
        .repo::<Wishlist>()
        .await?
        .get(id)
        .await?
        .ok_or_else(|| ServiceError::not_found("wishlist"))
}

async fn wishlist_items(
    state: &SharedState,
    wishlist_id: Uuid,
) -> Result<Vec<WishlistItem>, ServiceError> {
    Ok(state
        .repo::<WishlistItem>()
        .await?
        .find(Query::new(Filter::id("wishlist_id", wishlist_id)).sort_desc("created_at"))
        .await?)
}

pub async fn create_wishlist(
    state: &SharedState,
    request: CreateWishlistRequest,
) -> Result<WishlistResponse, ServiceError> {
    let now = now_millis();
    let wishlist = Wishlist {
        id: Uuid::new_v4(),
        user_id: request.user_id,
        name: request.name,
        description: request.description,
        is_public: request.is_public,
        created_at: now,
        updated_at: now,
    };
    state.repo::<Wishlist>().await?.insert(&wishlist).await?;
    Ok(WishlistResponse::new(wishlist, Vec::new()))
}

pub async fn get_wishlist(state: &SharedState, id: Uuid) -> Result<WishlistResponse, ServiceError> {
    let wishlist = load_wishlist(state, id).await?;
    let items = wishlist_items(state, id).await?;
    Ok(WishlistResponse::new(wishlist, items))
}

pub async fn user_wishlists(
    state: &SharedState,
    user_id: Uuid,
) -> Result<Vec<WishlistResponse>, ServiceError> {
    let wishlists = state
        .repo::<Wishlist>()
        .await?
        .find(Query::new(Filter::id("user_id", user_id)).sort_asc("created_at"))
        .await?;
    let mut responses = Vec::with_capacity(wishlists.len());
    for wishlist in wishlists {
        let items = wishlist_items(state, wishlist.id).await?;
        responses.push(WishlistResponse::new(wishlist, items));
    }
    Ok(responses)
}

/// Add a game to a wishlist; a game already present is left as is.
pub async fn add_wishlist_item(
    state: &SharedState,
    wishlist_id: Uuid,
    request: AddWishlistItemRequest,
) -> Result<WishlistResponse, ServiceError> {
    let wishlist = load_wishlist(state, wishlist_id).await?;
    let items = state.repo::<WishlistItem>().await?;
    let present = items
        .count(Filter::id("wishlist_id", wishlist_id).and(Filter::id("game_id", request.game_id)))
        .await?;
    if present == 0 {
        items
            .insert(&WishlistItem {
                id: Uuid::new_v4(),
                wishlist_id,
                game_id: request.game_id,
                game_name: request.game_name,
                price_when_added: request.price_when_added,
                currency: request.currency,
                created_at: now_millis(),
            })
            .await?;
        state.events().publish(
            TOPIC,
            "wishlist.item_added",
            json!({
                "wishlist_id": wishlist_id,
                "user_id": wishlist.user_id,
                "game_id": request.game_id,
            }),
        );
    }
    let items = wishlist_items(state, wishlist_id).await?;
    Ok(WishlistResponse::new(wishlist, items))
}

pub async fn remove_wishlist_item(state: &SharedState, item_id: Uuid) -> Result<(), ServiceError> {
    if !state.repo::<WishlistItem>().await?.delete(item_id).await? {
        return Err(ServiceError::not_found("wishlist item"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{dao::models::shopping::MAX_UNIT_PRICE, state::test_support::memory_state};

    fn line(game_id: Uuid, quantity: i64, unit_price: i64, discount: i64) -> AddCartItemRequest {
        AddCartItemRequest {
            game_id,
            game_name: "Factorio".into(),
            quantity,
            unit_price,
            discount_amount: discount,
        }
    }

    fn assert_totals(cart: &CartResponse) {
        let subtotal: i64 = cart
            .items
            .iter()
            .map(|item| item.unit_price * item.quantity)
            .sum();
        let discount: i64 = cart.items.iter().map(|item| item.discount_amount).sum();
        assert_eq!(cart.subtotal, subtotal);
        assert_eq!(cart.discount_amount, discount);
        assert_eq!(cart.tax_amount, (subtotal * 7 + 50) / 100);
        assert_eq!(cart.total_amount, subtotal - discount + cart.tax_amount);
        for item in &cart.items {
            assert_eq!(
                item.total_price,
                item.unit_price * item.quantity - item.discount_amount
            );
        }
    }

    #[tokio::test]
    async fn oversized_lines_are_unprocessable_not_panics() {
        let state = memory_state().await;
        let cart = create_cart(
            &state,
            CreateCartRequest {
                user_id: Uuid::new_v4(),
                currency: "USD".into(),
            },
        )
        .await
        .unwrap();
        let game = Uuid::new_v4();

        let err = add_item(&state, cart.id, line(game, 3, i64::MAX / 2, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unprocessable(_)));

        add_item(&state, cart.id, line(game, 60, 100, 0)).await.unwrap();
        let err = add_item(&state, cart.id, line(game, 60, 100, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unprocessable(_)));

        let cart = get_cart(&state, cart.id).await.unwrap();
        assert_eq!(cart.items[0].quantity, 60);
        assert_totals(&cart);
    }

    #[test]
    fn prices_above_the_cap_fail_validation() {
        use validator::Validate;
        assert!(line(Uuid::new_v4(), 1, MAX_UNIT_PRICE + 1, 0).validate().is_err());
        assert!(line(Uuid::new_v4(), 1, MAX_UNIT_PRICE, 0).validate().is_ok());
    }

    #[tokio::test]
    async fn totals_hold_after_every_mutation() {
        let state = memory_state().await;
        let cart = create_cart(
            &state,
            CreateCartRequest {
                user_id: Uuid::new_v4(),
                currency: "USD".into(),
            },
        )
        .await
        .unwrap();
        let (factorio, rimworld) = (Uuid::new_v4(), Uuid::new_v4());

        let cart = add_item(&state, cart.id, line(factorio, 1, 3500, 0)).await.unwrap();
        assert_totals(&cart);
        let cart = add_item(&state, cart.id, line(factorio, 2, 3000, 500)).await.unwrap();
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].quantity, 3);
        assert_eq!(cart.items[0].unit_price, 3000);
        assert_totals(&cart);

        let cart = add_item(&state, cart.id, line(rimworld, 1, 3499, 0)).await.unwrap();
        assert_totals(&cart);
        assert_eq!(cart.subtotal, 12_499);
        assert_eq!(cart.tax_amount, 875);

        let item_id = cart.items[0].id;
        let cart = update_item(
            &state,
            item_id,
            UpdateCartItemRequest {
                quantity: 0,
                discount_amount: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(cart.items.len(), 1);
        assert_totals(&cart);

        let cart = clear_cart(&state, cart.id).await.unwrap();
        assert!(cart.items.is_empty());
        assert_eq!(cart.total_amount, 0);
    }

    #[tokio::test]
    async fn user_cart_requires_an_active_cart() {
        let state = memory_state().await;
        let err = user_cart(&state, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn wishlist_adds_are_idempotent() {
        let state = memory_state().await;
        let wishlist = create_wishlist(
            &state,
            CreateWishlistRequest {
                user_id: Uuid::new_v4(),
                name: "Later".into(),
                description: None,
                is_public: false,
            },
        )
        .await
        .unwrap();
        let request = || AddWishlistItemRequest {
            game_id: Uuid::nil(),
            game_name: "Hades".into(),
            price_when_added: Some(2499),
            currency: "USD".into(),
        };
        add_wishlist_item(&state, wishlist.id, request()).await.unwrap();
        let wishlist = add_wishlist_item(&state, wishlist.id, request()).await.unwrap();
        assert_eq!(wishlist.items.len(), 1);
    }
}
