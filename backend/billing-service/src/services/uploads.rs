/// Upload reservation flow - ties a content upload to ledger reservations
///
/// Lifecycle: estimated -> reserved -> uploading -> completed, with
/// failed/cancelled releasing the hold and pending_block_shortfall parking
/// an upload whose final size outgrew its reservation.
use crate::clients::{video_host::IngestRequest, VideoHost};
use crate::db::intent_repo;
use crate::error::{AppError, Result};
use crate::models::{IntentState, UploadIntent};
use crate::services::AdmissionService;
use block_core::{self, BillingPolicy};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

pub struct UploadService {
    pool: PgPool,
    policy: BillingPolicy,
    admission: AdmissionService,
    video_host: Arc<dyn VideoHost>,
}

impl UploadService {
    pub fn new(pool: PgPool, policy: BillingPolicy, video_host: Arc<dyn VideoHost>) -> Self {
        let admission = AdmissionService::new(pool.clone(), policy.clone());
        Self {
            pool,
            policy,
            admission,
            video_host,
        }
    }

    /// Run the front half of the flow: create the intent, take the
    /// reservation, open the ingest slot at the video host.
    ///
    /// On `InsufficientBlocks` the intent stays in `estimated` (it holds no
    /// capacity) and the caller is routed to the purchase flow. On an ingest
    /// failure the fresh reservation is released before the error surfaces.
    pub async fn add_video(
        &self,
        creator_id: Uuid,
        video_id: Uuid,
        title: &str,
        size_gb: f64,
    ) -> Result<UploadIntent> {
        if title.trim().is_empty() {
            return Err(AppError::ValidationError("title is required".to_string()));
        }

        let blocks_needed = block_core::blocks_needed(&self.policy, size_gb)?;

        let intent =
            intent_repo::create_intent(&self.pool, creator_id, video_id, title, size_gb, blocks_needed)
                .await?;

        let intent = self
            .admission
            .reserve_for_intent(intent.id, blocks_needed)
            .await?;

        let request = IngestRequest {
            creator_id,
            video_id,
            title: title.to_string(),
        };

        // Long-running collaborator I/O, after the reservation committed and
        // with no locks held.
        let ticket = match self.video_host.begin_ingest(&request).await {
            Ok(ticket) => ticket,
            Err(err) => {
                self.admission
                    .release_for_intent(intent.id, IntentState::Failed)
                    .await?;
                return Err(AppError::VideoHostError(err.to_string()));
            }
        };

        intent_repo::mark_uploading(&self.pool, intent.id, &ticket.upload_url).await?;

        tracing::info!(
            intent_id = %intent.id,
            creator_id = %creator_id,
            video_id = %video_id,
            blocks = blocks_needed,
            "upload admitted and handed to video host"
        );

        intent_repo::find_intent(&self.pool, intent.id)
            .await?
            .ok_or_else(|| AppError::Internal("intent vanished after hand-off".to_string()))
    }

    /// Finalize with the host's authoritative size. When the caller has no
    /// size (completion callback without measurements), ask the host.
    pub async fn finalize_upload(
        &self,
        intent_id: Uuid,
        actual_size_gb: Option<f64>,
    ) -> Result<UploadIntent> {
        let size_gb = match actual_size_gb {
            Some(size) => size,
            None => {
                let intent = intent_repo::find_intent(&self.pool, intent_id)
                    .await?
                    .ok_or_else(|| {
                        AppError::NotFound(format!("intent {} not found", intent_id))
                    })?;

                let report = self
                    .video_host
                    .fetch_media_report(intent.video_id)
                    .await
                    .map_err(|e| AppError::VideoHostError(e.to_string()))?
                    .ok_or_else(|| {
                        AppError::Conflict(format!(
                            "video host has no media report for video {} yet",
                            intent.video_id
                        ))
                    })?;

                report.size_gb
            }
        };

        self.admission.finalize_for_intent(intent_id, size_gb).await
    }

    /// Abort an in-flight upload, releasing its hold. Safe to call from any
    /// failure path.
    pub async fn abort_upload(&self, intent_id: Uuid) -> Result<UploadIntent> {
        self.admission
            .release_for_intent(intent_id, IntentState::Cancelled)
            .await
    }

    pub async fn get_intent(&self, intent_id: Uuid) -> Result<Option<UploadIntent>> {
        Ok(intent_repo::find_intent(&self.pool, intent_id).await?)
    }
}
