use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::payments::{
        ChargeStatus, IntentStatus, PaymentCharge, PaymentIntent, PaymentRefund,
    },
    dto::{format_millis, validation::validate_currency},
};

fn default_currency() -> String {
    "USD".into()
}

fn default_provider() -> String {
    "test-gateway".into()
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateIntentRequest {
    pub purchase_id: Option<Uuid>,
    pub user_id: Uuid,
    /// Amount in cents.
    #[validate(range(min = 0))]
    pub amount: i64,
    #[serde(default = "default_currency")]
    #[validate(custom(function = "validate_currency"))]
    pub currency: String,
    #[serde(default = "default_provider")]
    #[validate(length(min = 1, max = 50))]
    pub provider: String,
    /// Lifetime of the intent, 30 minutes when omitted.
    #[validate(range(min = 1, max = 10080))]
    pub expires_in_minutes: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct IntentResponse {
    pub id: Uuid,
    pub purchase_id: Option<Uuid>,
    pub user_id: Uuid,
    pub amount: i64,
    pub currency: String,
    pub status: IntentStatus,
    pub provider: String,
    pub client_secret: String,
    pub expires_at: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<PaymentIntent> for IntentResponse {
    fn from(intent: PaymentIntent) -> Self {
        Self {
            id: intent.id,
            purchase_id: intent.purchase_id,
            user_id: intent.user_id,
            amount: intent.amount,
            currency: intent.currency,
            status: intent.status,
            provider: intent.provider,
            client_secret: intent.client_secret,
            expires_at: format_millis(intent.expires_at),
            created_at: format_millis(intent.created_at),
            updated_at: format_millis(intent.updated_at),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateChargeRequest {
    pub intent_id: Uuid,
    /// Provider reference; generated when omitted.
    #[validate(length(min = 1, max = 100))]
    pub provider_charge_id: Option<String>,
    /// Defaults to the intent amount.
    #[validate(range(min = 0))]
    pub amount: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ChargeResponse {
    pub id: Uuid,
    pub intent_id: Uuid,
    pub provider_charge_id: String,
    pub amount: i64,
    pub currency: String,
    pub status: ChargeStatus,
    pub created_at: String,
    pub updated_at: String,
}

impl From<PaymentCharge> for ChargeResponse {
    fn from(charge: PaymentCharge) -> Self {
        Self {
            id: charge.id,
            intent_id: charge.intent_id,
            provider_charge_id: charge.provider_charge_id,
            amount: charge.amount,
            currency: charge.currency,
            status: charge.status,
            created_at: format_millis(charge.created_at),
            updated_at: format_millis(charge.updated_at),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreatePaymentRefundRequest {
    pub charge_id: Uuid,
    #[validate(range(min = 1))]
    pub amount: i64,
    #[validate(length(max = 255))]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentRefundResponse {
    pub id: Uuid,
    pub charge_id: Uuid,
    pub amount: i64,
    pub reason: Option<String>,
    pub status: String,
    pub created_at: String,
}

impl From<PaymentRefund> for PaymentRefundResponse {
    fn from(refund: PaymentRefund) -> Self {
        Self {
            id: refund.id,
            charge_id: refund.charge_id,
            amount: refund.amount,
            reason: refund.reason,
            status: refund.status,
            created_at: format_millis(refund.created_at),
        }
    }
}
