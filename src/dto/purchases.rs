use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::purchases::{Purchase, PurchaseLine, PurchaseStatus, Refund, RefundStatus},
    dto::{format_millis, format_opt_millis, validation::validate_currency},
};

fn default_currency() -> String {
    "USD".into()
}

fn default_quantity() -> i64 {
    1
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct PurchaseLineRequest {
    pub game_id: Uuid,
    #[validate(length(min = 1, max = 255))]
    pub game_name: String,
    #[validate(range(min = 0))]
    pub price: i64,
    #[serde(default = "default_quantity")]
    #[validate(range(min = 1))]
    pub quantity: i64,
}

impl From<PurchaseLineRequest> for PurchaseLine {
    fn from(line: PurchaseLineRequest) -> Self {
        Self {
            game_id: line.game_id,
            game_name: line.game_name,
            price: line.price,
            quantity: line.quantity,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreatePurchaseRequest {
    pub user_id: Uuid,
    #[serde(default)]
    #[validate(nested)]
    pub items: Vec<PurchaseLineRequest>,
    /// Must equal the sum of `price * quantity` when items are given.
    #[validate(range(min = 0))]
    pub total_amount: i64,
    #[serde(default = "default_currency")]
    #[validate(custom(function = "validate_currency"))]
    pub currency: String,
    pub payment_method: Option<String>,
    pub payment_id: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdatePurchaseRequest {
    pub status: Option<PurchaseStatus>,
    pub payment_method: Option<String>,
    pub payment_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PurchaseResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub items: Vec<PurchaseLine>,
    pub total_amount: i64,
    pub currency: String,
    pub status: PurchaseStatus,
    pub payment_method: Option<String>,
    pub payment_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Purchase> for PurchaseResponse {
    fn from(purchase: Purchase) -> Self {
        Self {
            id: purchase.id,
            user_id: purchase.user_id,
            items: purchase.items,
            total_amount: purchase.total_amount,
            currency: purchase.currency,
            status: purchase.status,
            payment_method: purchase.payment_method,
            payment_id: purchase.payment_id,
            created_at: format_millis(purchase.created_at),
            updated_at: format_millis(purchase.updated_at),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateRefundRequest {
    pub purchase_id: Uuid,
    pub user_id: Uuid,
    #[validate(length(max = 1000))]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RefundResponse {
    pub id: Uuid,
    pub purchase_id: Uuid,
    pub user_id: Uuid,
    pub amount: i64,
    pub reason: Option<String>,
    pub status: RefundStatus,
    pub processed_at: Option<String>,
    pub created_at: String,
}

impl From<Refund> for RefundResponse {
    fn from(refund: Refund) -> Self {
        Self {
            id: refund.id,
            purchase_id: refund.purchase_id,
            user_id: refund.user_id,
            amount: refund.amount,
            reason: refund.reason,
            status: refund.status,
            processed_at: format_opt_millis(refund.processed_at),
            created_at: format_millis(refund.created_at),
        }
    }
}
