/// Collaborator clients
///
/// The billing-service consumes two external systems through thin typed
/// clients: the payment gateway (checkout sessions, webhook confirmations)
/// and the video host (upload ingest, authoritative media reports).
/// Both are traits so tests can substitute doubles.
pub mod payment_gateway;
pub mod video_host;

pub use payment_gateway::{CheckoutRequest, CheckoutSession, HttpPaymentGateway, PaymentGateway};
pub use video_host::{HttpVideoHost, IngestTicket, MediaReport, VideoHost};

use thiserror::Error;

/// Errors from collaborator calls. Non-fatal for the caller: purchases are
/// marked failed and retried, uploads release their reservation.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("malformed response: {0}")]
    Decode(String),
}
