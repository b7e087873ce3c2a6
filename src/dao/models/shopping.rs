use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use super::Millis;
use crate::dao::document_store::Entity;

/// Sales tax applied to cart subtotals, in percent.
pub const CART_TAX_PERCENT: i64 = 7;
/// Highest accepted unit price, in cents.
pub const MAX_UNIT_PRICE: i64 = 100_000_000;
/// Highest quantity a single cart line may reach, merges included.
pub const MAX_LINE_QUANTITY: i64 = 100;

/// A cart amount left the representable range.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("cart amount out of range")]
pub struct AmountOverflow;

fn line_amount(unit_price: i64, quantity: i64) -> Result<i64, AmountOverflow> {
    unit_price.checked_mul(quantity).ok_or(AmountOverflow)
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CartStatus {
    #[default]
    Active,
    Converted,
    Abandoned,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShoppingCart {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: CartStatus,
    pub currency: String,
    pub subtotal: i64,
    pub discount_amount: i64,
    pub tax_amount: i64,
    pub total_amount: i64,
    pub created_at: Millis,
    pub updated_at: Millis,
}

impl ShoppingCart {
    /// Recompute the cart totals from its current items.
    pub fn recalculate(&mut self, items: &[CartItem]) -> Result<(), AmountOverflow> {
        let mut subtotal = 0i64;
        let mut discount = 0i64;
        for item in items {
            subtotal = subtotal
                .checked_add(line_amount(item.unit_price, item.quantity)?)
                .ok_or(AmountOverflow)?;
            discount = discount
                .checked_add(item.discount_amount)
                .ok_or(AmountOverflow)?;
        }
        let tax = subtotal
            .checked_mul(CART_TAX_PERCENT)
            .and_then(|scaled| scaled.checked_add(50))
            .ok_or(AmountOverflow)?
            / 100;
        let total = (subtotal - discount).checked_add(tax).ok_or(AmountOverflow)?;

        self.subtotal = subtotal;
        self.discount_amount = discount;
        self.tax_amount = tax;
        self.total_amount = total;
        Ok(())
    }
}

impl Entity for ShoppingCart {
    const COLLECTION: &'static str = "shopping_carts";

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CartItem {
    pub id: Uuid,
    pub cart_id: Uuid,
    pub game_id: Uuid,
    pub game_name: String,
    pub quantity: i64,
    pub unit_price: i64,
    pub discount_amount: i64,
    pub total_price: i64,
    pub created_at: Millis,
    pub updated_at: Millis,
}

impl CartItem {
    pub fn refresh_total(&mut self) -> Result<(), AmountOverflow> {
        self.total_price = line_amount(self.unit_price, self.quantity)?
            .checked_sub(self.discount_amount)
            .ok_or(AmountOverflow)?;
        Ok(())
    }
}

impl Entity for CartItem {
    const COLLECTION: &'static str = "cart_items";
    const UNIQUE_KEYS: &'static [&'static [&'static str]] = &[&["cart_id", "game_id"]];

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Wishlist {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_public: bool,
    pub created_at: Millis,
    pub updated_at: Millis,
}

impl Entity for Wishlist {
    const COLLECTION: &'static str = "wishlists";

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WishlistItem {
    pub id: Uuid,
    pub wishlist_id: Uuid,
    pub game_id: Uuid,
    pub game_name: String,
    pub price_when_added: Option<i64>,
    pub currency: String,
    pub created_at: Millis,
}

impl Entity for WishlistItem {
    const COLLECTION: &'static str = "wishlist_items";
    const UNIQUE_KEYS: &'static [&'static [&'static str]] = &[&["wishlist_id", "game_id"]];

    fn id(&self) -> Uuid {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(unit_price: i64, quantity: i64) -> CartItem {
        CartItem {
            id: Uuid::new_v4(),
            cart_id: Uuid::new_v4(),
            game_id: Uuid::new_v4(),
            game_name: "Game".into(),
            quantity,
            unit_price,
            discount_amount: 0,
            total_price: 0,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn oversized_amounts_are_reported_instead_of_wrapping() {
        assert_eq!(item(i64::MAX / 2, 3).refresh_total(), Err(AmountOverflow));

        let mut cart = ShoppingCart {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            status: CartStatus::Active,
            currency: "USD".into(),
            subtotal: 0,
            discount_amount: 0,
            tax_amount: 0,
            total_amount: 0,
            created_at: 0,
            updated_at: 0,
        };
        let lines = [item(i64::MAX / 2, 1), item(i64::MAX / 2, 1)];
        assert_eq!(cart.recalculate(&lines), Err(AmountOverflow));
        assert_eq!(cart.subtotal, 0);

        cart.recalculate(&[item(1_000, 2)]).unwrap();
        assert_eq!(cart.tax_amount, 140);
        assert_eq!(cart.total_amount, 2_140);
    }
}
