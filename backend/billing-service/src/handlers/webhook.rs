/// Payment webhook handler
///
/// The gateway retries any non-2xx delivery, so replays and references we no
/// longer know both acknowledge with 200.
use crate::clients::PaymentGateway;
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::services::PurchaseService;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct PaymentWebhookPayload {
    pub purchase_id: Option<Uuid>,
    pub external_reference: Option<Uuid>,
    pub status: String,
}

/// Apply an asynchronous payment status delivery
pub async fn payment_webhook(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    gateway: web::Data<Arc<dyn PaymentGateway>>,
    payload: web::Json<PaymentWebhookPayload>,
) -> Result<HttpResponse> {
    let reference = payload
        .purchase_id
        .or(payload.external_reference)
        .ok_or_else(|| {
            AppError::BadRequest("purchase_id or external_reference is required".to_string())
        })?;

    let service = PurchaseService::new(
        (**pool).clone(),
        config.billing.clone(),
        gateway.get_ref().clone(),
        config.payment.return_url.clone(),
    );

    match service.confirm_purchase(reference, &payload.status).await {
        Ok(purchase) => Ok(HttpResponse::Ok().json(serde_json::json!({
            "status": purchase.status,
        }))),
        Err(AppError::NotFound(_)) => {
            tracing::warn!(%reference, status = %payload.status, "webhook for unknown purchase");
            Ok(HttpResponse::Ok().json(serde_json::json!({
                "status": "ignored",
            })))
        }
        Err(err) => Err(err),
    }
}
