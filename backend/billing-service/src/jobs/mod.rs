/// Background jobs
///
/// - Reservation reaper: returns stale holds to available capacity
/// - Purchase expirer: times out abandoned pending purchases
/// - Promo granter: seasonal credit grants and expired-credit sweeps
///
/// Each job exposes its cycle as a standalone method so tests can drive it
/// without the interval loop.
pub mod promo_granter;
pub mod purchase_expirer;
pub mod reservation_reaper;

pub use promo_granter::PromoGranter;
pub use purchase_expirer::PurchaseExpirer;
pub use reservation_reaper::ReservationReaper;
