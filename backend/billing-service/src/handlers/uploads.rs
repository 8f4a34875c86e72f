/// Upload handlers - HTTP endpoints for the reservation flow
use crate::clients::VideoHost;
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{IntentResponse, IntentState, UploadIntent};
use crate::services::UploadService;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct AddVideoRequest {
    pub video_id: Uuid,
    pub title: String,
    pub size_gb: f64,
}

/// Create an upload intent, reserve its blocks and open ingest at the host
pub async fn add_video(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    video_host: web::Data<Arc<dyn VideoHost>>,
    creator_id: web::Path<Uuid>,
    req: web::Json<AddVideoRequest>,
) -> Result<HttpResponse> {
    let service = UploadService::new(
        (**pool).clone(),
        config.billing.clone(),
        video_host.get_ref().clone(),
    );

    let intent = service
        .add_video(*creator_id, req.video_id, &req.title, req.size_gb)
        .await?;

    Ok(HttpResponse::Created().json(IntentResponse::from(intent)))
}

/// Get an upload intent
pub async fn get_upload_intent(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    video_host: web::Data<Arc<dyn VideoHost>>,
    path: web::Path<(Uuid, Uuid)>,
) -> Result<HttpResponse> {
    let (creator_id, intent_id) = path.into_inner();
    let service = UploadService::new(
        (**pool).clone(),
        config.billing.clone(),
        video_host.get_ref().clone(),
    );

    let intent = owned_intent(&service, creator_id, intent_id).await?;
    Ok(HttpResponse::Ok().json(IntentResponse::from(intent)))
}

#[derive(Debug, Deserialize)]
pub struct FinalizeUploadRequest {
    /// Authoritative size from the host's completion callback. When absent
    /// the service asks the host for its media report.
    pub actual_size_gb: Option<f64>,
}

/// Finalize an upload. Responds 409 with the intent when the final size
/// exceeded the reservation and the intent parked in shortfall.
pub async fn finalize_upload(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    video_host: web::Data<Arc<dyn VideoHost>>,
    path: web::Path<(Uuid, Uuid)>,
    req: web::Json<FinalizeUploadRequest>,
) -> Result<HttpResponse> {
    let (creator_id, intent_id) = path.into_inner();
    let service = UploadService::new(
        (**pool).clone(),
        config.billing.clone(),
        video_host.get_ref().clone(),
    );

    owned_intent(&service, creator_id, intent_id).await?;
    let intent = service.finalize_upload(intent_id, req.actual_size_gb).await?;

    if intent.get_state() == IntentState::PendingBlockShortfall {
        return Ok(HttpResponse::Conflict().json(IntentResponse::from(intent)));
    }

    Ok(HttpResponse::Ok().json(IntentResponse::from(intent)))
}

/// Abort an upload and release its reservation
pub async fn abort_upload(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    video_host: web::Data<Arc<dyn VideoHost>>,
    path: web::Path<(Uuid, Uuid)>,
) -> Result<HttpResponse> {
    let (creator_id, intent_id) = path.into_inner();
    let service = UploadService::new(
        (**pool).clone(),
        config.billing.clone(),
        video_host.get_ref().clone(),
    );

    owned_intent(&service, creator_id, intent_id).await?;
    let intent = service.abort_upload(intent_id).await?;

    Ok(HttpResponse::Ok().json(IntentResponse::from(intent)))
}

/// Load an intent and verify it belongs to the creator in the path.
async fn owned_intent(
    service: &UploadService,
    creator_id: Uuid,
    intent_id: Uuid,
) -> Result<UploadIntent> {
    let intent = service
        .get_intent(intent_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("intent {} not found", intent_id)))?;

    if intent.creator_id != creator_id {
        return Err(AppError::NotFound(format!("intent {} not found", intent_id)));
    }

    Ok(intent)
}
