// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! The narrow contracts the engine consumes.
//!
//! The engine is storage- and transport-agnostic: everything it needs from
//! the outside world arrives through these traits. Implementations live in
//! the persistence crate (and in test helpers).

use hemolink_audit::AuditEvent;
use hemolink_domain::{
    BloodRequest, BloodType, ContactChannel, Donor, MatchRecord, MatchStatus, RequestState,
    Urgency,
};
use time::OffsetDateTime;

/// Errors raised by a store implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store is unreachable or refused the connection.
    Unavailable(String),
    /// A row the operation targeted does not exist.
    RowNotFound(String),
    /// A constraint (uniqueness, foreign key) rejected the write.
    ConstraintViolation(String),
    /// Stored data could not be decoded into domain types.
    Corrupt(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(msg) => write!(f, "Store unavailable: {msg}"),
            Self::RowNotFound(msg) => write!(f, "Row not found: {msg}"),
            Self::ConstraintViolation(msg) => write!(f, "Constraint violation: {msg}"),
            Self::Corrupt(msg) => write!(f, "Corrupt stored data: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Errors raised by a notification dispatcher.
///
/// Delivery is best-effort: the engine logs these and treats the donor as
/// an implicit non-response. They never fail a wave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The channel is not configured or temporarily unavailable.
    ChannelUnavailable {
        /// The channel that failed.
        channel: ContactChannel,
        /// A description of the failure.
        message: String,
    },
    /// The dispatcher rejected the payload.
    Rejected(String),
}

impl std::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ChannelUnavailable { channel, message } => {
                write!(f, "Channel {channel} unavailable: {message}")
            }
            Self::Rejected(msg) => write!(f, "Dispatch rejected: {msg}"),
        }
    }
}

impl std::error::Error for DispatchError {}

/// Confirmation that a notification left the dispatcher.
///
/// A receipt says nothing about delivery to the donor; the contract is
/// at-least-once, best-effort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    /// The donor the notification targeted.
    pub donor_id: i64,
    /// The channel it left on.
    pub channel: ContactChannel,
    /// When the dispatcher accepted it.
    pub dispatched_at: OffsetDateTime,
}

/// The request fields a donor sees in a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSummary {
    /// The request id, for the donor's response.
    pub request_id: i64,
    /// The requesting hospital.
    pub hospital: String,
    /// The blood group needed.
    pub blood_type: BloodType,
    /// The urgency level.
    pub urgency: Urgency,
    /// Units still needed at dispatch time.
    pub units_needed: u32,
    /// The hard deadline.
    pub needed_by: OffsetDateTime,
}

impl RequestSummary {
    /// Builds a summary for a persisted request with `outstanding` units
    /// still needed.
    #[must_use]
    pub fn for_request(request: &BloodRequest, request_id: i64, outstanding: u32) -> Self {
        Self {
            request_id,
            hospital: request.hospital.clone(),
            blood_type: request.blood_type,
            urgency: request.urgency,
            units_needed: outstanding,
            needed_by: request.needed_by,
        }
    }
}

/// Persisted metadata for one notification wave.
///
/// Recorded at dispatch so a restarted engine can rebuild its timers
/// instead of losing escalation progress.
#[derive(Debug, Clone, PartialEq)]
pub struct WaveRecord {
    /// The wave number (0-based).
    pub wave: u32,
    /// The search radius the wave used, in kilometers.
    pub radius_km: f64,
    /// When the wave dispatched.
    pub dispatched_at: OffsetDateTime,
    /// When the wave's response window closes.
    pub deadline: OffsetDateTime,
    /// How many candidates were notified.
    pub candidates: u32,
}

/// A non-terminal request reloaded from the store at engine startup.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenRequest {
    /// The request row.
    pub request: BloodRequest,
    /// All match rows for the request.
    pub matches: Vec<MatchRecord>,
    /// The most recent wave, if any was dispatched.
    pub last_wave: Option<WaveRecord>,
}

/// The donor/request/match store the engine consumes.
///
/// `update_request_status` must be an atomic single-row update; the engine
/// relies on it when a response and a timeout race on the same request.
pub trait DonorStore: Send + Sync {
    /// Returns available donors whose blood group can serve `request`,
    /// within `radius_km` of the request location, excluding the given
    /// donor ids. Implementations may pre-filter conservatively; the
    /// selector re-applies every eligibility rule.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the store cannot be queried.
    fn find_compatible_donors(
        &self,
        request: &BloodRequest,
        radius_km: f64,
        exclude: &[i64],
    ) -> Result<Vec<Donor>, StoreError>;

    /// Fetches a donor by id. `Ok(None)` if no such donor exists.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the store cannot be queried.
    fn get_donor(&self, donor_id: i64) -> Result<Option<Donor>, StoreError>;

    /// Persists a new donor and returns its assigned id.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the write fails.
    fn save_donor(&self, donor: &Donor) -> Result<i64, StoreError>;

    /// Sets a donor's availability flag (self-service update).
    ///
    /// # Errors
    ///
    /// Returns `StoreError::RowNotFound` if no such donor exists.
    fn update_donor_availability(&self, donor_id: i64, available: bool)
    -> Result<(), StoreError>;

    /// Applies the side effects of a confirmed donation: clears the
    /// availability flag and stamps the last-donation timestamp.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::RowNotFound` if no such donor exists.
    fn update_donor_after_donation(
        &self,
        donor_id: i64,
        donated_at: OffsetDateTime,
    ) -> Result<(), StoreError>;

    /// Persists a new request and returns its assigned id.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the write fails.
    fn save_request(&self, request: &BloodRequest) -> Result<i64, StoreError>;

    /// Atomically updates a request's lifecycle state.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::RowNotFound` if no such request exists.
    fn update_request_status(
        &self,
        request_id: i64,
        state: RequestState,
    ) -> Result<(), StoreError>;

    /// Persists a new match row and returns its assigned id.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the write fails.
    fn save_match(&self, record: &MatchRecord) -> Result<i64, StoreError>;

    /// Updates a match row's status and optional reason.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::RowNotFound` if no such match exists.
    fn update_match_status(
        &self,
        match_id: i64,
        status: MatchStatus,
        reason: Option<&str>,
    ) -> Result<(), StoreError>;

    /// Records wave metadata for restart recovery.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the write fails.
    fn record_wave(&self, request_id: i64, wave: &WaveRecord) -> Result<(), StoreError>;

    /// Loads every non-terminal request with its matches and last wave.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the store cannot be queried.
    fn load_open_requests(&self) -> Result<Vec<OpenRequest>, StoreError>;

    /// Appends an audit event.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the write fails.
    fn append_audit(&self, event: &AuditEvent) -> Result<(), StoreError>;
}

/// The notification dispatcher the engine consumes.
///
/// Fire-and-forget: implementations must not block on delivery.
pub trait NotificationDispatcher: Send + Sync {
    /// Sends a request summary to a donor over one channel.
    ///
    /// # Errors
    ///
    /// Returns a `DispatchError` if the channel refuses the notification.
    /// The engine logs the failure and treats the donor as an implicit
    /// non-response.
    fn notify(
        &self,
        donor: &Donor,
        summary: &RequestSummary,
        channel: ContactChannel,
    ) -> Result<DeliveryReceipt, DispatchError>;
}

/// Blood bank stock, consulted only when a request escalates.
pub trait InventoryFeed: Send + Sync {
    /// Returns the units of `blood_type` currently in stock.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the feed cannot be queried.
    fn check_stock(&self, blood_type: BloodType) -> Result<u32, StoreError>;

    /// Attempts to reserve `units` of `blood_type`. Returns `true` and
    /// decrements stock if the full amount was available, `false` (and
    /// reserves nothing) otherwise.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the feed cannot be updated.
    fn reserve_stock(&self, blood_type: BloodType, units: u32) -> Result<bool, StoreError>;
}
