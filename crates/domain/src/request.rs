// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Blood requests and their lifecycle state machine.
//!
//! A request's state is owned by the lifecycle controller in the engine
//! crate; this module defines the states and the single authoritative
//! transition table.

use crate::blood_type::BloodType;
use crate::error::DomainError;
use crate::geo::Location;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use time::OffsetDateTime;

/// Caller-supplied priority of a request.
///
/// Urgency sets the initial search radius and the per-wave response
/// deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    /// Routine restocking or scheduled procedures.
    Low,
    /// Needed within the day.
    Medium,
    /// Needed within hours.
    High,
    /// Life-threatening, needed immediately.
    Critical,
}

impl Urgency {
    /// Returns the string representation of the urgency level.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Parses an urgency level from its string representation.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidUrgency` if the string is not a
    /// recognized level.
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            _ => Err(DomainError::InvalidUrgency(s.to_string())),
        }
    }
}

impl FromStr for Urgency {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for Urgency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle states of a blood request.
///
/// The lifecycle controller is the single writer of this state. All
/// transitions flow through [`RequestState::can_transition_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    /// Accepted at intake, matching not yet started.
    #[default]
    Created,
    /// Notification waves in progress, no units accepted yet.
    Matching,
    /// Some units accepted, need not yet met; waves continue.
    Fulfilling,
    /// Accepted units cover the requested units; waves stopped.
    Matched,
    /// Requested units fully covered and donation side effects applied.
    Completed,
    /// Automated matching exhausted its waves and radius; handed to the
    /// inventory fallback or a human dispatcher.
    Escalated,
    /// The needed-by deadline passed before fulfillment.
    Expired,
    /// Explicitly cancelled by the caller.
    Cancelled,
}

impl RequestState {
    /// Returns the string representation of the state.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Matching => "matching",
            Self::Fulfilling => "fulfilling",
            Self::Matched => "matched",
            Self::Completed => "completed",
            Self::Escalated => "escalated",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parses a state from its string representation.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidLifecycleState` if the string is not a
    /// recognized state.
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s {
            "created" => Ok(Self::Created),
            "matching" => Ok(Self::Matching),
            "fulfilling" => Ok(Self::Fulfilling),
            "matched" => Ok(Self::Matched),
            "completed" => Ok(Self::Completed),
            "escalated" => Ok(Self::Escalated),
            "expired" => Ok(Self::Expired),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(DomainError::InvalidLifecycleState(s.to_string())),
        }
    }

    /// Returns true if this state is terminal.
    ///
    /// `Escalated` is not terminal: a request handed to the fallback path
    /// can still complete from stock, expire, or be cancelled.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Expired | Self::Cancelled)
    }

    /// Checks if a transition from this state to another is valid.
    ///
    /// Cancellation is reachable from every non-terminal state. Expiry is
    /// reachable from every active state; the needed-by deadline is
    /// authoritative over wave scheduling.
    #[must_use]
    pub const fn can_transition_to(&self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Created, Self::Matching | Self::Cancelled)
                | (
                    Self::Matching,
                    Self::Fulfilling
                        | Self::Matched
                        | Self::Escalated
                        | Self::Expired
                        | Self::Cancelled
                )
                | (
                    Self::Fulfilling,
                    Self::Matched | Self::Escalated | Self::Expired | Self::Cancelled
                )
                | (Self::Matched, Self::Completed | Self::Cancelled)
                | (
                    Self::Escalated,
                    Self::Completed | Self::Expired | Self::Cancelled
                )
        )
    }

    /// Validates a transition, returning the target state on success.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidLifecycleTransition` if the transition
    /// is not in the table.
    pub fn transition_to(self, target: Self) -> Result<Self, DomainError> {
        if self.can_transition_to(target) {
            Ok(target)
        } else {
            Err(DomainError::InvalidLifecycleTransition {
                from: self.as_str().to_string(),
                to: target.as_str().to_string(),
            })
        }
    }
}

impl FromStr for RequestState {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for RequestState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A request for blood on behalf of a recipient.
///
/// Created by an external intake call; owned exclusively by the lifecycle
/// controller thereafter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BloodRequest {
    /// Canonical identifier. `None` until persisted.
    pub request_id: Option<i64>,
    /// The requesting hospital.
    pub hospital: String,
    /// The blood group needed.
    pub blood_type: BloodType,
    /// The urgency level.
    pub urgency: Urgency,
    /// Where the blood is needed.
    pub location: Location,
    /// Number of units needed.
    pub units_needed: u32,
    /// When the request was created.
    pub created_at: OffsetDateTime,
    /// Hard deadline after which the request expires unfulfilled.
    pub needed_by: OffsetDateTime,
    /// Current lifecycle state.
    pub state: RequestState,
}

impl BloodRequest {
    /// Creates a new `BloodRequest` in the `Created` state, without a
    /// persisted `request_id`.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub const fn new(
        hospital: String,
        blood_type: BloodType,
        urgency: Urgency,
        location: Location,
        units_needed: u32,
        created_at: OffsetDateTime,
        needed_by: OffsetDateTime,
    ) -> Self {
        Self {
            request_id: None,
            hospital,
            blood_type,
            urgency,
            location,
            units_needed,
            created_at,
            needed_by,
            state: RequestState::Created,
        }
    }

    /// Creates a `BloodRequest` with an existing `request_id` and state
    /// (from the store).
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub const fn with_id(
        request_id: i64,
        hospital: String,
        blood_type: BloodType,
        urgency: Urgency,
        location: Location,
        units_needed: u32,
        created_at: OffsetDateTime,
        needed_by: OffsetDateTime,
        state: RequestState,
    ) -> Self {
        Self {
            request_id: Some(request_id),
            hospital,
            blood_type,
            urgency,
            location,
            units_needed,
            created_at,
            needed_by,
            state,
        }
    }

    /// Returns whether the needed-by deadline has passed at `now`.
    #[must_use]
    pub fn is_past_deadline(&self, now: OffsetDateTime) -> bool {
        now >= self.needed_by
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_string_round_trip() {
        let states = [
            RequestState::Created,
            RequestState::Matching,
            RequestState::Fulfilling,
            RequestState::Matched,
            RequestState::Completed,
            RequestState::Escalated,
            RequestState::Expired,
            RequestState::Cancelled,
        ];
        for state in states {
            let parsed: RequestState =
                RequestState::parse(state.as_str()).unwrap_or_else(|e| panic!("{e}"));
            assert_eq!(state, parsed);
        }
        assert!(RequestState::parse("pending").is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(RequestState::Completed.is_terminal());
        assert!(RequestState::Expired.is_terminal());
        assert!(RequestState::Cancelled.is_terminal());
        assert!(!RequestState::Created.is_terminal());
        assert!(!RequestState::Matching.is_terminal());
        assert!(!RequestState::Fulfilling.is_terminal());
        assert!(!RequestState::Matched.is_terminal());
        assert!(!RequestState::Escalated.is_terminal());
    }

    #[test]
    fn test_cancellation_reachable_from_all_non_terminal_states() {
        for state in [
            RequestState::Created,
            RequestState::Matching,
            RequestState::Fulfilling,
            RequestState::Matched,
            RequestState::Escalated,
        ] {
            assert!(
                state.can_transition_to(RequestState::Cancelled),
                "{state} -> cancelled"
            );
        }
    }

    #[test]
    fn test_no_transitions_out_of_terminal_states() {
        for terminal in [
            RequestState::Completed,
            RequestState::Expired,
            RequestState::Cancelled,
        ] {
            for target in [
                RequestState::Matching,
                RequestState::Fulfilling,
                RequestState::Matched,
                RequestState::Completed,
                RequestState::Escalated,
                RequestState::Expired,
                RequestState::Cancelled,
            ] {
                assert!(!terminal.can_transition_to(target), "{terminal} -> {target}");
            }
        }
    }

    #[test]
    fn test_matched_only_completes_or_cancels() {
        assert!(RequestState::Matched.can_transition_to(RequestState::Completed));
        assert!(RequestState::Matched.can_transition_to(RequestState::Cancelled));
        assert!(!RequestState::Matched.can_transition_to(RequestState::Matching));
        assert!(!RequestState::Matched.can_transition_to(RequestState::Escalated));
        assert!(!RequestState::Matched.can_transition_to(RequestState::Expired));
    }

    #[test]
    fn test_escalated_can_complete_from_stock() {
        assert!(RequestState::Escalated.can_transition_to(RequestState::Completed));
        assert!(RequestState::Escalated.can_transition_to(RequestState::Expired));
        assert!(!RequestState::Escalated.can_transition_to(RequestState::Matching));
    }

    #[test]
    fn test_transition_to_rejects_invalid() {
        let result = RequestState::Completed.transition_to(RequestState::Matching);
        assert_eq!(
            result,
            Err(DomainError::InvalidLifecycleTransition {
                from: String::from("completed"),
                to: String::from("matching"),
            })
        );
    }

    #[test]
    fn test_urgency_round_trip() {
        for urgency in [
            Urgency::Low,
            Urgency::Medium,
            Urgency::High,
            Urgency::Critical,
        ] {
            let parsed: Urgency =
                Urgency::parse(urgency.as_str()).unwrap_or_else(|e| panic!("{e}"));
            assert_eq!(urgency, parsed);
        }
        assert!(Urgency::parse("URGENT").is_err());
    }
}
