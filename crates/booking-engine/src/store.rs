//! Collaborator interfaces the engine consumes: persistence, billing, and
//! notification dispatch.
//!
//! The engine is synchronous and performs no I/O of its own; implementations
//! are expected to be transactional where the trait contract says so. The
//! conditional-update methods are the concurrency primitive — "set
//! status=booked where id=X and status=available" — so only one of two
//! racing callers succeeds.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::booking::{Booking, BookingStatus};
use crate::error::Result;
use crate::slots::SlotStatus;
use crate::template::{BillingOverride, LocationType};

/// A persisted, bookable slot row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub id: String,
    pub owner: String,
    pub event: String,
    pub date: NaiveDate,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: SlotStatus,
    pub location_types: Vec<LocationType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing: Option<BillingOverride>,
    /// Back-reference to the non-terminal booking consuming this slot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<String>,
}

/// Slot persistence.
pub trait SlotStore {
    fn get_slot(&self, slot_id: &str) -> Result<Option<TimeSlot>>;

    /// Atomically move a slot from `expected` to `next` status, setting the
    /// booking back-reference. Returns `false` (without modifying anything)
    /// when the slot is missing or not in `expected` status — the caller
    /// lost a race or holds a stale view.
    fn compare_and_set_status(
        &mut self,
        slot_id: &str,
        expected: SlotStatus,
        next: SlotStatus,
        booking_id: Option<&str>,
    ) -> Result<bool>;
}

/// Booking persistence.
pub trait BookingStore {
    fn get_booking(&self, booking_id: &str) -> Result<Option<Booking>>;

    fn insert_booking(&mut self, booking: &Booking) -> Result<()>;

    /// Status-guarded update: persist `booking` only if the stored row is
    /// still in `expected` status. Returns `false` when a concurrent
    /// transition got there first.
    fn update_booking(&mut self, booking: &Booking, expected: BookingStatus) -> Result<bool>;
}

/// Invoice creation, invoked only for slots carrying a billing override.
/// A failure here aborts booking creation.
pub trait BillingProvider {
    fn create_invoice(
        &mut self,
        customer: &str,
        merchant: &str,
        amount_cents: i64,
        currency: &str,
        due_at: DateTime<Utc>,
    ) -> Result<String>;
}

/// Lifecycle events handed to the notification collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    BookingCreated,
    BookingConfirmed,
    BookingRejected,
    BookingCancelled,
    NoShowMarked,
    BookingCompleted,
}

/// Fire-and-forget notification dispatch. Failures never roll back a
/// transition — the state machine logs and swallows them.
pub trait NotificationSink {
    fn notify(&mut self, booking: &Booking, kind: NotificationKind) -> Result<()>;
}
