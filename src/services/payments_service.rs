use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::{
    dao::models::{
        now_millis,
        payments::{ChargeStatus, IntentStatus, PaymentCharge, PaymentIntent, PaymentRefund},
    },
    dto::payments::{
        ChargeResponse, CreateChargeRequest, CreateIntentRequest, CreatePaymentRefundRequest,
        IntentResponse, PaymentRefundResponse,
    },
    error::ServiceError,
    state::SharedState,
};

const TOPIC: &str = "payments";
const DEFAULT_INTENT_MINUTES: i64 = 30;

fn random_reference(prefix: &str) -> String {
    format!("{prefix}_{}", hex::encode(rand::random::<[u8; 16]>()))
}

pub async fn create_intent(
    state: &SharedState,
    request: CreateIntentRequest,
) -> Result<IntentResponse, ServiceError> {
    let now = now_millis();
    let minutes = request.expires_in_minutes.unwrap_or(DEFAULT_INTENT_MINUTES);
    let intent = PaymentIntent {
        id: Uuid::new_v4(),
        purchase_id: request.purchase_id,
        user_id: request.user_id,
        amount: request.amount,
        currency: request.currency,
        status: IntentStatus::RequiresPayment,
        provider: request.provider,
        client_secret: random_reference("secret"),
        expires_at: now + minutes * 60_000,
        created_at: now,
        updated_at: now,
    };
    state.repo::<PaymentIntent>().await?.insert(&intent).await?;

    state.events().publish(
        TOPIC,
        "payment_intent.created",
        json!({ "intent_id": intent.id, "purchase_id": intent.purchase_id }),
    );
    Ok(intent.into())
}

pub async fn get_intent(state: &SharedState, id: Uuid) -> Result<IntentResponse, ServiceError> {
    state
        .repo::<PaymentIntent>()
        .await?
        .get(id)
        .await?
        .map(Into::into)
        .ok_or_else(|| ServiceError::not_found("payment intent"))
}

/// Capture an intent; it must be unexpired and not yet paid.
pub async fn create_charge(
    state: &SharedState,
    request: CreateChargeRequest,
) -> Result<ChargeResponse, ServiceError> {
    let intents = state.repo::<PaymentIntent>().await?;
    let mut intent = intents
        .get(request.intent_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("payment intent"))?;

    let now = now_millis();
    if intent.status == IntentStatus::Succeeded {
        return Err(ServiceError::InvalidState(
            "payment intent already succeeded".into(),
        ));
    }
    if intent.expires_at <= now {
        return Err(ServiceError::InvalidState("payment intent expired".into()));
    }
    let amount = request.amount.unwrap_or(intent.amount);
    if amount > intent.amount {
        return Err(ServiceError::InvalidInput(
            "charge amount exceeds the intent amount".into(),
        ));
    }

    let charge = PaymentCharge {
        id: Uuid::new_v4(),
        intent_id: intent.id,
        provider_charge_id: request
            .provider_charge_id
            .unwrap_or_else(|| random_reference("ch")),
        amount,
        currency: intent.currency.clone(),
        status: ChargeStatus::Succeeded,
        created_at: now,
        updated_at: now,
    };
    state.repo::<PaymentCharge>().await?.insert(&charge).await?;

    intent.status = IntentStatus::Succeeded;
    intent.updated_at = now;
    intents.replace(&intent).await?;

    info!(charge_id = %charge.id, intent_id = %intent.id, amount, "payment captured");
    state.events().publish(
        TOPIC,
        "payment_charge.succeeded",
        json!({
            "charge_id": charge.id,
            "intent_id": intent.id,
            "purchase_id": intent.purchase_id,
            "amount": amount,
        }),
    );
    Ok(charge.into())
}

/// Open a refund against a charge, at most the charged amount.
pub async fn create_refund(
    state: &SharedState,
    request: CreatePaymentRefundRequest,
) -> Result<PaymentRefundResponse, ServiceError> {
    let charges = state.repo::<PaymentCharge>().await?;
    let mut charge = charges
        .get(request.charge_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("charge"))?;
    if request.amount > charge.amount {
        return Err(ServiceError::InvalidInput(
            "refund amount exceeds the charged amount".into(),
        ));
    }

    let now = now_millis();
    let refund = PaymentRefund {
        id: Uuid::new_v4(),
        charge_id: charge.id,
        amount: request.amount,
        reason: request.reason,
        status: "pending".into(),
        created_at: now,
    };
    state.repo::<PaymentRefund>().await?.insert(&refund).await?;

    charge.status = ChargeStatus::RefundPending;
    charge.updated_at = now;
    charges.replace(&charge).await?;

    state.events().publish(
        TOPIC,
        "payment_refund.created",
        json!({ "refund_id": refund.id, "charge_id": charge.id, "amount": refund.amount }),
    );
    Ok(refund.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::memory_state;

    fn intent_request(expires_in_minutes: Option<i64>) -> CreateIntentRequest {
        CreateIntentRequest {
            purchase_id: Some(Uuid::new_v4()),
            user_id: Uuid::new_v4(),
            amount: 2500,
            currency: "USD".into(),
            provider: "test-gateway".into(),
            expires_in_minutes,
        }
    }

    fn charge_for(intent_id: Uuid) -> CreateChargeRequest {
        CreateChargeRequest {
            intent_id,
            provider_charge_id: None,
            amount: None,
        }
    }

    #[tokio::test]
    async fn intents_are_charged_once() {
        let state = memory_state().await;
        let intent = create_intent(&state, intent_request(None)).await.unwrap();
        assert!(intent.client_secret.starts_with("secret_"));
        assert_eq!(intent.client_secret.len(), "secret_".len() + 32);

        let charge = create_charge(&state, charge_for(intent.id)).await.unwrap();
        assert_eq!(charge.amount, 2500);
        assert_eq!(
            get_intent(&state, intent.id).await.unwrap().status,
            IntentStatus::Succeeded
        );

        let again = create_charge(&state, charge_for(intent.id)).await;
        assert!(matches!(again, Err(ServiceError::InvalidState(_))));
    }

    #[tokio::test]
    async fn expired_intents_cannot_be_charged() {
        let state = memory_state().await;
        let intent = create_intent(&state, intent_request(Some(1))).await.unwrap();
        let intents = state.repo::<PaymentIntent>().await.unwrap();
        let mut stored = intents.get(intent.id).await.unwrap().unwrap();
        stored.expires_at = now_millis() - 1;
        intents.replace(&stored).await.unwrap();

        let err = create_charge(&state, charge_for(intent.id)).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn refunds_are_capped_by_the_charge() {
        let state = memory_state().await;
        let intent = create_intent(&state, intent_request(None)).await.unwrap();
        let charge = create_charge(&state, charge_for(intent.id)).await.unwrap();

        let too_much = create_refund(
            &state,
            CreatePaymentRefundRequest {
                charge_id: charge.id,
                amount: 2501,
                reason: None,
            },
        )
        .await;
        assert!(matches!(too_much, Err(ServiceError::InvalidInput(_))));

        let refund = create_refund(
            &state,
            CreatePaymentRefundRequest {
                charge_id: charge.id,
                amount: 1000,
                reason: Some("partial".into()),
            },
        )
        .await
        .unwrap();
        assert_eq!(refund.status, "pending");
        let stored = state
            .repo::<PaymentCharge>()
            .await
            .unwrap()
            .get(charge.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, ChargeStatus::RefundPending);
    }
}
