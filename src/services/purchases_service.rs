use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::{
    dao::{
        document_store::{Filter, Query},
        models::{
            now_millis,
            purchases::{Purchase, PurchaseLine, PurchaseStatus, Refund, RefundStatus},
        },
    },
    dto::purchases::{
        CreatePurchaseRequest, CreateRefundRequest, PurchaseResponse, RefundResponse,
        UpdatePurchaseRequest,
    },
    error::ServiceError,
    state::SharedState,
};

const TOPIC: &str = "purchases";

async fn load_purchase(state: &SharedState, id: Uuid) -> Result<Purchase, ServiceError> {
    state
        .repo::<Purchase>()
        .await?
        .get(id)
        .await?
        .ok_or_else(|| ServiceError::not_found("purchase"))
}

/// Record a pending purchase; itemised totals must add up.
pub async fn create_purchase(
    state: &SharedState,
    request: CreatePurchaseRequest,
) -> Result<PurchaseResponse, ServiceError> {
    let items: Vec<PurchaseLine> = request.items.into_iter().map(Into::into).collect();
    if !items.is_empty() {
        let expected: i64 = items.iter().map(|line| line.price * line.quantity).sum();
        if expected != request.total_amount {
            return Err(ServiceError::InvalidInput(format!(
                "total_amount {} does not match item total {expected}",
                request.total_amount
            )));
        }
    }

    let now = now_millis();
    let purchase = Purchase {
        id: Uuid::new_v4(),
        user_id: request.user_id,
        items,
        total_amount: request.total_amount,
        currency: request.currency,
        status: PurchaseStatus::Pending,
        payment_method: request.payment_method,
        payment_id: request.payment_id,
        created_at: now,
        updated_at: now,
    };
    state.repo::<Purchase>().await?.insert(&purchase).await?;

    info!(purchase_id = %purchase.id, total = purchase.total_amount, "purchase created");
    state.events().publish(
        TOPIC,
        "purchase.created",
        json!({
            "purchase_id": purchase.id,
            "user_id": purchase.user_id,
            "total_amount": purchase.total_amount,
        }),
    );
    Ok(purchase.into())
}

pub async fn get_purchase(
    state: &SharedState,
    id: Uuid,
) -> Result<PurchaseResponse, ServiceError> {
    Ok(load_purchase(state, id).await?.into())
}

pub async fn user_purchases(
    state: &SharedState,
    user_id: Uuid,
    skip: u64,
    limit: u64,
) -> Result<Vec<PurchaseResponse>, ServiceError> {
    let purchases = state
        .repo::<Purchase>()
        .await?
        .find(
            Query::new(Filter::id("user_id", user_id))
                .sort_desc("created_at")
                .skip(skip)
                .limit(limit),
        )
        .await?;
    Ok(purchases.into_iter().map(Into::into).collect())
}

/// Update payment details and move the purchase through its lifecycle.
pub async fn update_purchase(
    state: &SharedState,
    id: Uuid,
    request: UpdatePurchaseRequest,
) -> Result<PurchaseResponse, ServiceError> {
    let mut purchase = load_purchase(state, id).await?;
    let previous = purchase.status;

    if let Some(next) = request.status {
        if !previous.can_become(next) {
            return Err(ServiceError::InvalidState(format!(
                "cannot move purchase from {previous:?} to {next:?}"
            )));
        }
        purchase.status = next;
    }
    if let Some(method) = request.payment_method {
        purchase.payment_method = Some(method);
    }
    if let Some(payment_id) = request.payment_id {
        purchase.payment_id = Some(payment_id);
    }
    purchase.updated_at = now_millis();
    state.repo::<Purchase>().await?.replace(&purchase).await?;

    if purchase.status != previous {
        state.events().publish(
            TOPIC,
            "purchase.status_changed",
            json!({
                "purchase_id": purchase.id,
                "user_id": purchase.user_id,
                "from": previous,
                "to": purchase.status,
            }),
        );
    }
    Ok(purchase.into())
}

/// Open a refund for the full purchase amount.
pub async fn request_refund(
    state: &SharedState,
    request: CreateRefundRequest,
) -> Result<RefundResponse, ServiceError> {
    let purchase = load_purchase(state, request.purchase_id).await?;
    let refund = Refund {
        id: Uuid::new_v4(),
        purchase_id: purchase.id,
        user_id: request.user_id,
        amount: purchase.total_amount,
        reason: request.reason,
        status: RefundStatus::Pending,
        processed_at: None,
        created_at: now_millis(),
    };
    state.repo::<Refund>().await?.insert(&refund).await?;

    state.events().publish(
        TOPIC,
        "refund.requested",
        json!({
            "refund_id": refund.id,
            "purchase_id": refund.purchase_id,
            "amount": refund.amount,
        }),
    );
    Ok(refund.into())
}

pub async fn get_refund(state: &SharedState, id: Uuid) -> Result<RefundResponse, ServiceError> {
    state
        .repo::<Refund>()
        .await?
        .get(id)
        .await?
        .map(Into::into)
        .ok_or_else(|| ServiceError::not_found("refund"))
}

pub async fn user_refunds(
    state: &SharedState,
    user_id: Uuid,
) -> Result<Vec<RefundResponse>, ServiceError> {
    let refunds = state
        .repo::<Refund>()
        .await?
        .find(Query::new(Filter::id("user_id", user_id)).sort_desc("created_at"))
        .await?;
    Ok(refunds.into_iter().map(Into::into).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{dto::purchases::PurchaseLineRequest, state::test_support::memory_state};

    fn purchase(total_amount: i64) -> CreatePurchaseRequest {
        CreatePurchaseRequest {
            user_id: Uuid::new_v4(),
            items: vec![
                PurchaseLineRequest {
                    game_id: Uuid::new_v4(),
                    game_name: "Celeste".into(),
                    price: 1999,
                    quantity: 1,
                },
                PurchaseLineRequest {
                    game_id: Uuid::new_v4(),
                    game_name: "Hollow Knight".into(),
                    price: 1499,
                    quantity: 2,
                },
            ],
            total_amount,
            currency: "USD".into(),
            payment_method: None,
            payment_id: None,
        }
    }

    #[tokio::test]
    async fn totals_must_match_items() {
        let state = memory_state().await;
        let err = create_purchase(&state, purchase(100)).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));

        let created = create_purchase(&state, purchase(4997)).await.unwrap();
        assert_eq!(created.status, PurchaseStatus::Pending);
    }

    #[tokio::test]
    async fn status_transitions_are_enforced() {
        let state = memory_state().await;
        let created = create_purchase(&state, purchase(4997)).await.unwrap();
        let to = |status| UpdatePurchaseRequest {
            status: Some(status),
            ..Default::default()
        };

        let err = update_purchase(&state, created.id, to(PurchaseStatus::Refunded))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));

        update_purchase(&state, created.id, to(PurchaseStatus::Completed))
            .await
            .unwrap();
        let refunded = update_purchase(&state, created.id, to(PurchaseStatus::Refunded))
            .await
            .unwrap();
        assert_eq!(refunded.status, PurchaseStatus::Refunded);
    }

    #[tokio::test]
    async fn refunds_cover_the_full_purchase() {
        let state = memory_state().await;
        let created = create_purchase(&state, purchase(4997)).await.unwrap();
        let refund = request_refund(
            &state,
            CreateRefundRequest {
                purchase_id: created.id,
                user_id: created.user_id,
                reason: Some("changed my mind".into()),
            },
        )
        .await
        .unwrap();
        assert_eq!(refund.amount, 4997);
        assert_eq!(user_refunds(&state, created.user_id).await.unwrap().len(), 1);

        let missing = request_refund(
            &state,
            CreateRefundRequest {
                purchase_id: Uuid::new_v4(),
                user_id: created.user_id,
                reason: None,
            },
        )
        .await;
        assert!(matches!(missing, Err(ServiceError::NotFound(_))));
    }
}
