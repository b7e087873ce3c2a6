use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::Millis;
use crate::dao::document_store::Entity;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseStatus {
    #[default]
    Pending,
    Completed,
    Cancelled,
    Refunded,
}

impl PurchaseStatus {
    /// Whether a purchase may move from `self` to `next`.
    pub fn can_become(self, next: PurchaseStatus) -> bool {
        use PurchaseStatus::*;
        matches!(
            (self, next),
            (Pending, Completed) | (Pending, Cancelled) | (Completed, Refunded)
        ) || self == next
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct PurchaseLine {
    pub game_id: Uuid,
    pub game_name: String,
    pub price: i64,
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Purchase {
    pub id: Uuid,
    pub user_id: Uuid,
    pub items: Vec<PurchaseLine>,
    pub total_amount: i64,
    pub currency: String,
    pub status: PurchaseStatus,
    pub payment_method: Option<String>,
    pub payment_id: Option<String>,
    pub created_at: Millis,
    pub updated_at: Millis,
}

impl Entity for Purchase {
    const COLLECTION: &'static str = "purchases";

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RefundStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Refund {
    pub id: Uuid,
    pub purchase_id: Uuid,
    pub user_id: Uuid,
    pub amount: i64,
    pub reason: Option<String>,
    pub status: RefundStatus,
    pub processed_at: Option<Millis>,
    pub created_at: Millis,
}

impl Entity for Refund {
    const COLLECTION: &'static str = "refunds";

    fn id(&self) -> Uuid {
        self.id
    }
}
