//! Booking lifecycle state machine.
//!
//! Transitions: `pending → {confirmed, rejected, cancelled}` and
//! `confirmed → {cancelled, completed, no_show_client, no_show_provider}`;
//! every other status is terminal. Each transition re-reads the booking and
//! persists through a status-guarded update, so concurrent double-confirm /
//! double-cancel races lose cleanly with a Conflict.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{codes, EngineError, Result};
use crate::slots::SlotStatus;
use crate::store::{BillingProvider, BookingStore, NotificationKind, NotificationSink, SlotStore};

/// Cancellation reasons are mandatory and capped at this many characters.
pub const MAX_CANCELLATION_REASON_CHARS: usize = 500;

// Asymmetric no-show windows, minutes past the scheduled start. Business
// policy literals, not derived from anything.
const CLIENT_MARKS_PROVIDER_AFTER_MINUTES: i64 = 5;
const PROVIDER_MARKS_CLIENT_AFTER_MINUTES: i64 = 10;

/// Lifecycle status of a booking. The no-show statuses name the absent
/// party.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Rejected,
    Cancelled,
    Completed,
    NoShowClient,
    NoShowProvider,
}

impl BookingStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }

    pub fn is_no_show(self) -> bool {
        matches!(
            self,
            BookingStatus::NoShowClient | BookingStatus::NoShowProvider
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Rejected => "rejected",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
            BookingStatus::NoShowClient => "no_show_client",
            BookingStatus::NoShowProvider => "no_show_provider",
        };
        f.write_str(label)
    }
}

/// One side of a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Party {
    Client,
    Provider,
}

/// A client's claim on one slot. Never physically deleted — terminal
/// statuses end the lifecycle and the audit fields record how.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub client: String,
    pub provider: String,
    /// The consumed slot; exactly one non-terminal booking may reference a
    /// slot at a time.
    pub slot_id: String,
    pub status: BookingStatus,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i64,
    pub booked_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_by: Option<Party>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_show_marked_by: Option<Party>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_show_marked_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_show_reason: Option<String>,
}

/// The state machine over its collaborators. Fields are public so callers
/// can reach the underlying stores after a sequence of transitions.
pub struct BookingStateMachine<S, B, P, N> {
    pub slots: S,
    pub bookings: B,
    pub billing: P,
    pub notifier: N,
}

impl<S, B, P, N> BookingStateMachine<S, B, P, N>
where
    S: SlotStore,
    B: BookingStore,
    P: BillingProvider,
    N: NotificationSink,
{
    pub fn new(slots: S, bookings: B, billing: P, notifier: N) -> Self {
        BookingStateMachine {
            slots,
            bookings,
            billing,
            notifier,
        }
    }

    /// Reserve `slot_id` for `client` and create the booking in `pending`.
    ///
    /// The slot flip available→booked is a conditional update: of two racing
    /// reservations exactly one succeeds, the loser observes a Conflict and
    /// must retry against a different slot. When the slot carries a billing
    /// override, the invoice is created before the booking row; a billing
    /// failure releases the slot again and aborts with no partial state.
    ///
    /// # Errors
    /// `NotFound` for an unknown slot, `Conflict` when the slot is not
    /// available, `Validation` when the slot bounds produce an out-of-range
    /// duration.
    pub fn create(&mut self, client: &str, slot_id: &str, now: DateTime<Utc>) -> Result<Booking> {
        let slot = self
            .slots
            .get_slot(slot_id)?
            .ok_or_else(|| EngineError::NotFound(format!("slot {}", slot_id)))?;
        if slot.status != SlotStatus::Available {
            return Err(EngineError::Conflict(format!(
                "slot {} is not available",
                slot_id
            )));
        }

        let duration_minutes = (slot.end_time - slot.start_time).num_minutes();
        if !(15..=480).contains(&duration_minutes) {
            return Err(EngineError::Validation(format!(
                "slot {} spans {} minutes, outside 15-480",
                slot_id, duration_minutes
            )));
        }

        let booking_id = Uuid::new_v4().to_string();
        if !self.slots.compare_and_set_status(
            slot_id,
            SlotStatus::Available,
            SlotStatus::Booked,
            Some(&booking_id),
        )? {
            return Err(EngineError::Conflict(format!(
                "slot {} was booked concurrently",
                slot_id
            )));
        }

        let mut invoice_id = None;
        if let Some(billing) = &slot.billing {
            match self.billing.create_invoice(
                client,
                &slot.owner,
                billing.amount_cents,
                &billing.currency,
                slot.start_time,
            ) {
                Ok(id) => invoice_id = Some(id),
                Err(e) => {
                    self.release_slot(slot_id)?;
                    return Err(e);
                }
            }
        }

        let booking = Booking {
            id: booking_id,
            client: client.to_string(),
            provider: slot.owner.clone(),
            slot_id: slot_id.to_string(),
            status: BookingStatus::Pending,
            scheduled_at: slot.start_time,
            duration_minutes,
            booked_at: now,
            confirmation_timestamp: None,
            invoice_id,
            rejection_reason: None,
            cancelled_by: None,
            cancelled_at: None,
            cancellation_reason: None,
            no_show_marked_by: None,
            no_show_marked_at: None,
            no_show_reason: None,
        };
        if let Err(e) = self.bookings.insert_booking(&booking) {
            self.release_slot(slot_id)?;
            return Err(e);
        }

        tracing::debug!(booking = %booking.id, slot = %slot_id, "booking created");
        self.emit(&booking, NotificationKind::BookingCreated);
        Ok(booking)
    }

    /// Provider accepts a pending booking.
    ///
    /// No timing restriction beyond the pending status: the
    /// confirmation-window policy belongs to the surrounding service, not
    /// the state machine.
    pub fn confirm(&mut self, booking_id: &str, now: DateTime<Utc>) -> Result<Booking> {
        let mut booking = self.load(booking_id)?;
        if booking.status != BookingStatus::Pending {
            return Err(invalid_transition(booking.status, BookingStatus::Confirmed));
        }
        let expected = booking.status;
        booking.status = BookingStatus::Confirmed;
        booking.confirmation_timestamp = Some(now);
        self.persist(&booking, expected)?;

        tracing::debug!(booking = %booking.id, "booking confirmed");
        self.emit(&booking, NotificationKind::BookingConfirmed);
        Ok(booking)
    }

    /// Provider declines a pending booking; the slot returns to available.
    pub fn reject(
        &mut self,
        booking_id: &str,
        reason: Option<&str>,
        _now: DateTime<Utc>,
    ) -> Result<Booking> {
        let mut booking = self.load(booking_id)?;
        if booking.status != BookingStatus::Pending {
            return Err(invalid_transition(booking.status, BookingStatus::Rejected));
        }
        let expected = booking.status;
        booking.status = BookingStatus::Rejected;
        booking.rejection_reason = reason.map(str::to_string);
        self.persist(&booking, expected)?;
        self.release_slot(&booking.slot_id)?;

        tracing::debug!(booking = %booking.id, "booking rejected");
        self.emit(&booking, NotificationKind::BookingRejected);
        Ok(booking)
    }

    /// Either party cancels a pending or confirmed booking; the slot returns
    /// to available. The reason is mandatory and capped at
    /// [`MAX_CANCELLATION_REASON_CHARS`].
    pub fn cancel(
        &mut self,
        booking_id: &str,
        cancelled_by: Party,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Booking> {
        if reason.trim().is_empty() {
            return Err(EngineError::Validation(
                "cancellation reason is required".to_string(),
            ));
        }
        if reason.chars().count() > MAX_CANCELLATION_REASON_CHARS {
            return Err(EngineError::Validation(format!(
                "cancellation reason exceeds {} characters",
                MAX_CANCELLATION_REASON_CHARS
            )));
        }

        let mut booking = self.load(booking_id)?;
        if booking.status.is_terminal() {
            return Err(invalid_transition(booking.status, BookingStatus::Cancelled));
        }
        let expected = booking.status;
        booking.status = BookingStatus::Cancelled;
        booking.cancelled_by = Some(cancelled_by);
        booking.cancelled_at = Some(now);
        booking.cancellation_reason = Some(reason.to_string());
        self.persist(&booking, expected)?;
        self.release_slot(&booking.slot_id)?;

        tracing::debug!(booking = %booking.id, by = ?cancelled_by, "booking cancelled");
        self.emit(&booking, NotificationKind::BookingCancelled);
        Ok(booking)
    }

    /// Record that the other party failed to attend a confirmed booking.
    ///
    /// The timing guard is asymmetric: a client may mark the provider
    /// no-show from 5 minutes past the scheduled start, a provider may mark
    /// the client from 10 minutes past. The resulting status names the
    /// absent party. The slot stays consumed for audit.
    ///
    /// # Errors
    /// `NO_SHOW_ALREADY_MARKED` when a no-show was already recorded (by
    /// either role), `NO_SHOW_TOO_EARLY` inside the marker's window,
    /// `INVALID_STATUS_TRANSITION` for non-confirmed bookings.
    pub fn mark_no_show(
        &mut self,
        booking_id: &str,
        marker: Party,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Booking> {
        let mut booking = self.load(booking_id)?;
        if booking.status.is_no_show() {
            return Err(EngineError::business(
                codes::NO_SHOW_ALREADY_MARKED,
                format!("booking {} is already marked {}", booking.id, booking.status),
            ));
        }
        let (window_minutes, next_status) = match marker {
            Party::Client => (
                CLIENT_MARKS_PROVIDER_AFTER_MINUTES,
                BookingStatus::NoShowProvider,
            ),
            Party::Provider => (
                PROVIDER_MARKS_CLIENT_AFTER_MINUTES,
                BookingStatus::NoShowClient,
            ),
        };
        if booking.status != BookingStatus::Confirmed {
            return Err(invalid_transition(booking.status, next_status));
        }
        let earliest = booking.scheduled_at + Duration::minutes(window_minutes);
        if now < earliest {
            return Err(EngineError::business(
                codes::NO_SHOW_TOO_EARLY,
                format!(
                    "no-show may be marked no sooner than {} minutes past the scheduled start",
                    window_minutes
                ),
            ));
        }

        let expected = booking.status;
        booking.status = next_status;
        booking.no_show_marked_by = Some(marker);
        booking.no_show_marked_at = Some(now);
        booking.no_show_reason = reason.map(str::to_string);
        self.persist(&booking, expected)?;
        // Slot stays booked: terminal, consumed for audit.

        tracing::debug!(booking = %booking.id, status = %booking.status, "no-show marked");
        self.emit(&booking, NotificationKind::NoShowMarked);
        Ok(booking)
    }

    /// Close out a confirmed booking after the appointment has elapsed.
    /// The slot stays consumed.
    pub fn complete(&mut self, booking_id: &str, now: DateTime<Utc>) -> Result<Booking> {
        let mut booking = self.load(booking_id)?;
        if booking.status != BookingStatus::Confirmed {
            return Err(invalid_transition(booking.status, BookingStatus::Completed));
        }
        let ends_at = booking.scheduled_at + Duration::minutes(booking.duration_minutes);
        if now < ends_at {
            return Err(EngineError::business(
                codes::COMPLETED_TOO_EARLY,
                format!("booking {} runs until {}", booking.id, ends_at),
            ));
        }
        let expected = booking.status;
        booking.status = BookingStatus::Completed;
        self.persist(&booking, expected)?;

        tracing::debug!(booking = %booking.id, "booking completed");
        self.emit(&booking, NotificationKind::BookingCompleted);
        Ok(booking)
    }

    fn load(&self, booking_id: &str) -> Result<Booking> {
        self.bookings
            .get_booking(booking_id)?
            .ok_or_else(|| EngineError::NotFound(format!("booking {}", booking_id)))
    }

    /// Status-guarded persist; a `false` from the store means a concurrent
    /// transition won the race.
    fn persist(&mut self, booking: &Booking, expected: BookingStatus) -> Result<()> {
        if self.bookings.update_booking(booking, expected)? {
            Ok(())
        } else {
            Err(EngineError::Conflict(format!(
                "booking {} was modified concurrently",
                booking.id
            )))
        }
    }

    /// Return a booked slot to available, clearing the booking reference.
    fn release_slot(&mut self, slot_id: &str) -> Result<()> {
        if self
            .slots
            .compare_and_set_status(slot_id, SlotStatus::Booked, SlotStatus::Available, None)?
        {
            Ok(())
        } else {
            Err(EngineError::Storage(format!(
                "slot {} was not in booked status during release",
                slot_id
            )))
        }
    }

    fn emit(&mut self, booking: &Booking, kind: NotificationKind) {
        if let Err(e) = self.notifier.notify(booking, kind) {
            tracing::warn!(
                booking = %booking.id,
                kind = ?kind,
                error = %e,
                "notification dispatch failed"
            );
        }
    }
}

fn invalid_transition(from: BookingStatus, to: BookingStatus) -> EngineError {
    EngineError::business(
        codes::INVALID_STATUS_TRANSITION,
        format!("cannot move booking from {} to {}", from, to),
    )
}
