use super::dates::StayRange;
use super::money::Money;
use super::room::{RoomId, UserId};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookingId(pub u64);

impl fmt::Display for BookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Paid,
    Cancelled,
    Failed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Paid => "paid",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gateway-side view of the money, tracked apart from [`BookingStatus`].
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CancelReason {
    User,
    Admin,
    Expired,
}

impl CancelReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
            Self::Expired => "expired",
        }
    }
}

/// Everything needed to insert a booking except its identifier, which the store
/// assigns.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBooking {
    pub room: RoomId,
    pub user: UserId,
    pub stay: StayRange,
    pub price_per_night: Money,
    pub total_price: Money,
    pub created_at: DateTime<Utc>,
    pub hold: Duration,
}

/// A reservation of one room for a range of nights.
///
/// Prices are captured when the booking is made; later changes to the room's
/// nightly rate never reach an existing booking.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Booking {
    pub id: BookingId,
    pub room: RoomId,
    pub user: UserId,
    pub stay: StayRange,
    pub price_per_night: Money,
    pub total_price: Money,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    /// End of the hold. Only read while the booking is pending.
    pub expires_at: Option<DateTime<Utc>>,
    pub payment_intent_id: Option<String>,
    pub cancel_reason: Option<CancelReason>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// How an existing booking relates to a requested stay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overlap {
    /// No shared night, or the booking no longer holds the room.
    Clear,
    /// Shares a night, but is a pending hold past its expiry with no payment.
    Stale,
    /// Shares a night with a live hold, a confirmed or a paid booking.
    Conflict,
}

impl Booking {
    pub fn new(id: BookingId, new: NewBooking) -> Self {
        Self {
            id,
            room: new.room,
            user: new.user,
            stay: new.stay,
            price_per_night: new.price_per_night,
            total_price: new.total_price,
            status: BookingStatus::Pending,
            payment_status: PaymentStatus::Pending,
            expires_at: Some(new.created_at + new.hold),
            payment_intent_id: None,
            cancel_reason: None,
            created_at: new.created_at,
            updated_at: new.created_at,
        }
    }

    /// Whether this booking keeps other guests out of its nights at `now`.
    pub fn holds_room_at(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            BookingStatus::Pending => !self.hold_elapsed(now),
            BookingStatus::Confirmed | BookingStatus::Paid => true,
            BookingStatus::Cancelled | BookingStatus::Failed => false,
        }
    }

    /// A pending hold whose window has passed without a recorded payment.
    pub fn is_expired_hold(&self, now: DateTime<Utc>) -> bool {
        self.status == BookingStatus::Pending
            && self.payment_status == PaymentStatus::Pending
            && self.hold_elapsed(now)
    }

    pub fn is_payable(&self, now: DateTime<Utc>) -> bool {
        self.status == BookingStatus::Pending && !self.hold_elapsed(now)
    }

    pub fn classify(&self, stay: &StayRange, now: DateTime<Utc>) -> Overlap {
        if !self.stay.overlaps(stay) {
            Overlap::Clear
        } else if self.holds_room_at(now) {
            Overlap::Conflict
        } else if self.is_expired_hold(now) {
            Overlap::Stale
        } else {
            Overlap::Clear
        }
    }

    fn hold_elapsed(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }
}

/// First booking in `calendar` that keeps `stay` from being booked.
pub fn find_conflict<'a, I>(calendar: I, stay: &StayRange, now: DateTime<Utc>) -> Option<&'a Booking>
where
    I: IntoIterator<Item = &'a Booking>,
{
    calendar
        .into_iter()
        .find(|booking| booking.classify(stay, now) == Overlap::Conflict)
}

/// Condition on the hold window a [`Transition`] requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldCondition {
    Any,
    /// The hold must still be running at the given instant.
    LiveAt(DateTime<Utc>),
    /// The hold must have run out by the given instant.
    ElapsedAt(DateTime<Utc>),
}

/// A conditional update of a single booking row.
///
/// The store applies it only if the row still matches `from`, `payment_from` and
/// `hold` at the moment of writing, the equivalent of
/// `UPDATE bookings SET ... WHERE id = ? AND status IN (...) AND payment_status = ?`.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub from: &'static [BookingStatus],
    pub payment_from: Option<PaymentStatus>,
    /// When set, the row's attached intent must be this one.
    pub intent_from: Option<String>,
    pub hold: HoldCondition,
    pub to: BookingStatus,
    pub payment_to: Option<PaymentStatus>,
    pub reason: Option<CancelReason>,
    pub intent: Option<String>,
    pub at: DateTime<Utc>,
}

pub const CANCELLABLE_BY_GUEST: &[BookingStatus] =
    &[BookingStatus::Pending, BookingStatus::Confirmed];
pub const CANCELLABLE_BY_ADMIN: &[BookingStatus] = &[
    BookingStatus::Pending,
    BookingStatus::Confirmed,
    BookingStatus::Paid,
];
const PENDING: &[BookingStatus] = &[BookingStatus::Pending];

impl Transition {
    fn from_pending(to: BookingStatus, at: DateTime<Utc>) -> Self {
        Self {
            from: PENDING,
            payment_from: Some(PaymentStatus::Pending),
            intent_from: None,
            hold: HoldCondition::Any,
            to,
            payment_to: None,
            reason: None,
            intent: None,
            at,
        }
    }

    /// Payment captured. Applies even after the hold ran out, as long as the
    /// sweep has not flipped the row first.
    pub fn mark_paid(at: DateTime<Utc>) -> Self {
        Self {
            payment_to: Some(PaymentStatus::Paid),
            ..Self::from_pending(BookingStatus::Paid, at)
        }
    }

    pub fn mark_failed(at: DateTime<Utc>) -> Self {
        Self {
            payment_to: Some(PaymentStatus::Failed),
            ..Self::from_pending(BookingStatus::Failed, at)
        }
    }

    /// Payment captured through `intent`, which becomes the booking's intent of
    /// record even if a newer one had been attached since.
    pub fn mark_paid_by(intent: String, at: DateTime<Utc>) -> Self {
        Self {
            intent: Some(intent),
            ..Self::mark_paid(at)
        }
    }

    /// A decline only counts for the intent currently attached to the booking.
    pub fn mark_failed_for(intent: String, at: DateTime<Utc>) -> Self {
        Self {
            intent_from: Some(intent),
            ..Self::mark_failed(at)
        }
    }

    pub fn expire(now: DateTime<Utc>) -> Self {
        Self {
            hold: HoldCondition::ElapsedAt(now),
            reason: Some(CancelReason::Expired),
            ..Self::from_pending(BookingStatus::Cancelled, now)
        }
    }

    pub fn confirm(at: DateTime<Utc>) -> Self {
        Self {
            hold: HoldCondition::LiveAt(at),
            ..Self::from_pending(BookingStatus::Confirmed, at)
        }
    }

    pub fn attach_intent(intent: String, at: DateTime<Utc>) -> Self {
        Self {
            hold: HoldCondition::LiveAt(at),
            intent: Some(intent),
            ..Self::from_pending(BookingStatus::Pending, at)
        }
    }

    pub fn cancel(from: &'static [BookingStatus], reason: CancelReason, at: DateTime<Utc>) -> Self {
        Self {
            from,
            payment_from: None,
            intent_from: None,
            hold: HoldCondition::Any,
            to: BookingStatus::Cancelled,
            payment_to: None,
            reason: Some(reason),
            intent: None,
            at,
        }
    }

    pub fn admits(&self, booking: &Booking) -> bool {
        if !self.from.contains(&booking.status) {
            return false;
        }
        if self
            .payment_from
            .is_some_and(|expected| expected != booking.payment_status)
        {
            return false;
        }
        if self
            .intent_from
            .as_ref()
            .is_some_and(|expected| booking.payment_intent_id.as_ref() != Some(expected))
        {
            return false;
        }
        match self.hold {
            HoldCondition::Any => true,
            HoldCondition::LiveAt(at) => !booking.hold_elapsed(at),
            HoldCondition::ElapsedAt(at) => booking.hold_elapsed(at),
        }
    }

    pub fn apply(&self, booking: &mut Booking) {
        booking.status = self.to;
        if let Some(payment) = self.payment_to {
            booking.payment_status = payment;
        }
        if let Some(reason) = self.reason {
            booking.cancel_reason = Some(reason);
        }
        if let Some(intent) = &self.intent {
            booking.payment_intent_id = Some(intent.clone());
        }
        booking.updated_at = self.at;
    }
}

/// What a conditional update did.
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    /// The row matched and now holds the new state.
    Applied(Booking),
    /// The row had already moved; carries its current state untouched.
    Rejected(Booking),
}

impl TransitionOutcome {
    pub fn booking(&self) -> &Booking {
        match self {
            Self::Applied(booking) | Self::Rejected(booking) => booking,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}
