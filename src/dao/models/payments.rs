use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::Millis;
use crate::dao::document_store::Entity;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    #[default]
    RequiresPayment,
    Succeeded,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentIntent {
    pub id: Uuid,
    pub purchase_id: Option<Uuid>,
    pub user_id: Uuid,
    pub amount: i64,
    pub currency: String,
    pub status: IntentStatus,
    pub provider: String,
    pub client_secret: String,
    pub expires_at: Millis,
    pub created_at: Millis,
    pub updated_at: Millis,
}

impl Entity for PaymentIntent {
    const COLLECTION: &'static str = "payment_intents";

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChargeStatus {
    #[default]
    Succeeded,
    RefundPending,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentCharge {
    pub id: Uuid,
    pub intent_id: Uuid,
    pub provider_charge_id: String,
    pub amount: i64,
    pub currency: String,
    pub status: ChargeStatus,
    pub created_at: Millis,
    pub updated_at: Millis,
}

impl Entity for PaymentCharge {
    const COLLECTION: &'static str = "payment_charges";

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentRefund {
    pub id: Uuid,
    pub charge_id: Uuid,
    pub amount: i64,
    pub reason: Option<String>,
    /// Always `pending`; settlement happens with the provider out of band.
    pub status: String,
    pub created_at: Millis,
}

impl Entity for PaymentRefund {
    const COLLECTION: &'static str = "payment_refunds";

    fn id(&self) -> Uuid {
        self.id
    }
}
