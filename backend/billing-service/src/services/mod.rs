/// Business logic layer for billing-service
///
/// This module provides high-level operations:
/// - Admission: upload gating, reservations, finalize/release
/// - Purchases: checkout sessions and idempotent webhook confirmation
/// - Uploads: the reservation flow tied to the video host
/// - Grants: grace allowances and seasonal promotional credits
pub mod admission;
pub mod grants;
pub mod purchases;
pub mod uploads;

// Re-export commonly used services
pub use admission::{AdmissionDecision, AdmissionService};
pub use grants::GrantService;
pub use purchases::PurchaseService;
pub use uploads::UploadService;
