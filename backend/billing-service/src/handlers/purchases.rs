/// Purchase handlers - HTTP endpoints for block purchases
use crate::clients::PaymentGateway;
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::PurchaseResponse;
use crate::services::PurchaseService;
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreatePurchaseRequest {
    pub blocks: i64,
}

#[derive(Debug, Serialize)]
pub struct CreatePurchaseResponse {
    pub purchase: PurchaseResponse,
}

/// Create a block purchase and a hosted checkout session
pub async fn create_purchase(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    gateway: web::Data<Arc<dyn PaymentGateway>>,
    creator_id: web::Path<Uuid>,
    req: web::Json<CreatePurchaseRequest>,
) -> Result<HttpResponse> {
    let service = PurchaseService::new(
        (**pool).clone(),
        config.billing.clone(),
        gateway.get_ref().clone(),
        config.payment.return_url.clone(),
    );

    let purchase = service.create_purchase(*creator_id, req.blocks).await?;

    Ok(HttpResponse::Created().json(CreatePurchaseResponse {
        purchase: purchase.into(),
    }))
}

/// Get a purchase, e.g. for polling after checkout returns
pub async fn get_purchase(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    gateway: web::Data<Arc<dyn PaymentGateway>>,
    path: web::Path<(Uuid, Uuid)>,
) -> Result<HttpResponse> {
    let (creator_id, purchase_id) = path.into_inner();
    let service = PurchaseService::new(
        (**pool).clone(),
        config.billing.clone(),
        gateway.get_ref().clone(),
        config.payment.return_url.clone(),
    );

    let purchase = service
        .get_purchase(purchase_id)
        .await?
        .filter(|p| p.creator_id == creator_id)
        .ok_or_else(|| AppError::NotFound(format!("purchase {} not found", purchase_id)))?;

    Ok(HttpResponse::Ok().json(PurchaseResponse::from(purchase)))
}
