//! Stock reservation records.

use chrono::{DateTime, Utc};
use common::{OrderId, ProductId, ReservationId};
use serde::{Deserialize, Serialize};

/// The state of a reservation row.
///
/// A reservation leaves `Active` exactly once:
/// ```text
/// Active ──┬──► Committed   (sale finalized)
///          ├──► Released    (compensated)
///          └──► Expired     (reclaimed by the sweep)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReservationStatus {
    /// Quantity is held against the counter.
    Active,
    /// The sale was finalized; stock left the system.
    Committed,
    /// The hold was returned to available stock.
    Released,
    /// The hold timed out and was returned to available stock.
    Expired,
}

impl ReservationStatus {
    /// Returns true once the row can no longer change.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReservationStatus::Active)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Active => "Active",
            ReservationStatus::Committed => "Committed",
            ReservationStatus::Released => "Released",
            ReservationStatus::Expired => "Expired",
        }
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One product's share of a stock reservation.
///
/// A single `reservation_id` covers one row per product when a whole order
/// is reserved in one call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    /// Reservation this row belongs to.
    pub reservation_id: ReservationId,
    /// Order the stock is held for.
    pub order_id: OrderId,
    /// Reserved product.
    pub product_id: ProductId,
    /// Reserved quantity.
    pub quantity: u32,
    /// Current row state.
    pub status: ReservationStatus,
    /// When the hold lapses unless committed or released first.
    pub expires_at: DateTime<Utc>,
    /// When the row was created.
    pub created_at: DateTime<Utc>,
}

impl Reservation {
    /// Creates an Active reservation row.
    pub fn new(
        reservation_id: ReservationId,
        order_id: OrderId,
        product_id: ProductId,
        quantity: u32,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            reservation_id,
            order_id,
            product_id,
            quantity,
            status: ReservationStatus::Active,
            expires_at,
            created_at: Utc::now(),
        }
    }

    /// Returns true while the hold counts against the counter.
    pub fn is_active(&self) -> bool {
        self.status == ReservationStatus::Active
    }

    /// Returns true if an active hold has lapsed.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && self.expires_at <= now
    }

    /// Marks the row committed.
    pub fn mark_committed(&mut self) {
        self.status = ReservationStatus::Committed;
    }

    /// Marks the row released.
    pub fn mark_released(&mut self) {
        self.status = ReservationStatus::Released;
    }

    /// Marks the row expired.
    pub fn mark_expired(&mut self) {
        self.status = ReservationStatus::Expired;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample(expires_in: Duration) -> Reservation {
        Reservation::new(
            ReservationId::new(),
            OrderId::new(),
            ProductId::new("SKU-001"),
            3,
            Utc::now() + expires_in,
        )
    }

    #[test]
    fn new_reservation_is_active() {
        let reservation = sample(Duration::minutes(15));
        assert!(reservation.is_active());
        assert!(!reservation.status.is_terminal());
    }

    #[test]
    fn terminal_states() {
        let mut committed = sample(Duration::minutes(15));
        committed.mark_committed();
        assert!(committed.status.is_terminal());

        let mut released = sample(Duration::minutes(15));
        released.mark_released();
        assert_eq!(released.status, ReservationStatus::Released);

        let mut expired = sample(Duration::minutes(15));
        expired.mark_expired();
        assert_eq!(expired.status, ReservationStatus::Expired);
    }

    #[test]
    fn expiry_check_only_applies_to_active_rows() {
        let now = Utc::now();
        let stale = sample(Duration::minutes(-1));
        assert!(stale.is_expired_at(now));

        let mut released = sample(Duration::minutes(-1));
        released.mark_released();
        assert!(!released.is_expired_at(now));

        let fresh = sample(Duration::minutes(15));
        assert!(!fresh.is_expired_at(now));
    }

    #[test]
    fn status_display() {
        assert_eq!(ReservationStatus::Active.to_string(), "Active");
        assert_eq!(ReservationStatus::Expired.to_string(), "Expired");
    }
}
