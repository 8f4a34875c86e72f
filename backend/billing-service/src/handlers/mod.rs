/// HTTP handlers for billing endpoints
///
/// This module contains handlers for:
/// - Blocks: ledger summaries, price calculation, admission checks
/// - Uploads: the add-video reservation flow, finalize and abort
/// - Purchases: checkout-session creation
/// - Webhook: asynchronous payment confirmations
pub mod blocks;
pub mod purchases;
pub mod uploads;
pub mod webhook;

// Re-export handler functions at module level
pub use blocks::{approve_creator, calculate, check_upload, estimate, get_creator_blocks};
pub use purchases::{create_purchase, get_purchase};
pub use uploads::{abort_upload, add_video, finalize_upload, get_upload_intent};
pub use webhook::payment_webhook;
