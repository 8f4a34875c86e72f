/// Block handlers - HTTP endpoints for ledger summaries and admission checks
use crate::config::Config;
use crate::db::ledger_repo;
use crate::error::{AppError, Result};
use crate::models::LedgerResponse;
use crate::services::{AdmissionService, GrantService};
use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Get a creator's ledger summary
pub async fn get_creator_blocks(
    pool: web::Data<PgPool>,
    creator_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let ledger = ledger_repo::find_ledger(pool.get_ref(), *creator_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("no ledger for creator {}", creator_id)))?;

    Ok(HttpResponse::Ok().json(LedgerResponse::from_ledger(&ledger, Utc::now())))
}

#[derive(Debug, Deserialize)]
pub struct CalculateRequest {
    pub size_gb: f64,
}

#[derive(Debug, Serialize)]
pub struct CalculateResponse {
    pub blocks_needed: i64,
    pub price_per_block_cents: i64,
    pub total_price_cents: i64,
}

/// Pure size-to-price calculation; reads nothing and mutates nothing.
pub async fn calculate(
    config: web::Data<Config>,
    req: web::Json<CalculateRequest>,
) -> Result<HttpResponse> {
    let policy = &config.billing;
    let blocks_needed = block_core::blocks_needed(policy, req.size_gb)?;

    Ok(HttpResponse::Ok().json(CalculateResponse {
        blocks_needed,
        price_per_block_cents: policy.price_per_block_cents,
        total_price_cents: blocks_needed * policy.price_per_block_cents,
    }))
}

#[derive(Debug, Deserialize)]
pub struct EstimateRequest {
    pub duration_minutes: f64,
    pub resolution: String,
}

#[derive(Debug, Serialize)]
pub struct EstimateResponse {
    pub estimated_size_gb: f64,
    pub blocks_needed: i64,
}

/// Heuristic duration/resolution estimate. Never authoritative; the video
/// host's measured size wins at finalize time.
pub async fn estimate(
    config: web::Data<Config>,
    req: web::Json<EstimateRequest>,
) -> Result<HttpResponse> {
    if req.duration_minutes <= 0.0 || !req.duration_minutes.is_finite() {
        return Err(AppError::BadRequest(
            "duration_minutes must be positive".to_string(),
        ));
    }

    let estimated_size_gb = block_core::estimate_size_gb(req.duration_minutes, &req.resolution);
    let blocks_needed = block_core::blocks_needed(&config.billing, estimated_size_gb)?;

    Ok(HttpResponse::Ok().json(EstimateResponse {
        estimated_size_gb,
        blocks_needed,
    }))
}

#[derive(Debug, Deserialize)]
pub struct CheckUploadRequest {
    pub size_gb: f64,
}

/// Admission check for an upload of the given size
pub async fn check_upload(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    creator_id: web::Path<Uuid>,
    req: web::Json<CheckUploadRequest>,
) -> Result<HttpResponse> {
    let service = AdmissionService::new((**pool).clone(), config.billing.clone());
    let decision = service.check_upload(*creator_id, req.size_gb).await?;

    Ok(HttpResponse::Ok().json(decision))
}

#[derive(Debug, Deserialize)]
pub struct ApproveCreatorRequest {
    pub joined_at: Option<DateTime<Utc>>,
}

/// Approve a creator: create the ledger and grant the grace allowance.
/// Called by the identity flow when a creator account is activated.
pub async fn approve_creator(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    creator_id: web::Path<Uuid>,
    req: web::Json<ApproveCreatorRequest>,
) -> Result<HttpResponse> {
    let service = GrantService::new((**pool).clone(), config.billing.clone());
    let ledger = service.approve_creator(*creator_id, req.joined_at).await?;

    Ok(HttpResponse::Created().json(LedgerResponse::from_ledger(&ledger, Utc::now())))
}
