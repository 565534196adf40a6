// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Match records and their status transition rules.
//!
//! A match links one request to one donor for one notification wave.
//! Match rows are append-only; only the status and response fields change
//! after creation.

use crate::error::DomainError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use time::OffsetDateTime;

/// Decline reason recorded when an acceptance arrives from a donor who is
/// no longer available or is back inside the cooldown window.
pub const REASON_NO_LONGER_ELIGIBLE: &str = "no_longer_eligible";

/// Decline reason recorded when an acceptance arrives after the request
/// reached a terminal state. The response is kept for the record but does
/// not revive the request.
pub const REASON_REQUEST_RESOLVED: &str = "request_already_resolved";

/// Status of a single donor match within a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    /// Selected as a candidate, notification not yet dispatched.
    Pending,
    /// Notification dispatched; awaiting the donor's response.
    Notified,
    /// Donor accepted; counted against the request's outstanding units.
    Accepted,
    /// Donor declined, or an acceptance was rejected as stale.
    Declined,
    /// The wave deadline (or the request deadline) passed with no usable
    /// response.
    Expired,
    /// The donation was confirmed.
    Completed,
    /// The request was cancelled while this match was outstanding.
    Cancelled,
}

impl MatchStatus {
    /// Returns the string representation of the status.
    ///
    /// This is used for persistence and API serialization.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Notified => "notified",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
            Self::Expired => "expired",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parses a status from its string representation.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidMatchStatus` if the string is not a
    /// valid status.
    fn parse_str(s: &str) -> Result<Self, DomainError> {
        match s {
            "pending" => Ok(Self::Pending),
            "notified" => Ok(Self::Notified),
            "accepted" => Ok(Self::Accepted),
            "declined" => Ok(Self::Declined),
            "expired" => Ok(Self::Expired),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(DomainError::InvalidMatchStatus {
                status: s.to_string(),
            }),
        }
    }

    /// Returns true if this status is terminal (the row will not change
    /// again). A declined donor is re-engaged by appending a new match row,
    /// never by reviving this one.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Declined | Self::Expired | Self::Completed | Self::Cancelled
        )
    }

    /// Validates if a transition from this status to another is permitted.
    ///
    /// # Errors
    ///
    /// Returns an error if the transition is not allowed.
    pub fn validate_transition(&self, new_status: Self) -> Result<(), DomainError> {
        if self.is_terminal() {
            return Err(DomainError::InvalidStatusTransition {
                from: self.as_str().to_string(),
                to: new_status.as_str().to_string(),
                reason: String::from("cannot transition from terminal status"),
            });
        }

        let valid: bool = match self {
            Self::Pending => matches!(new_status, Self::Notified | Self::Cancelled),
            Self::Notified => matches!(
                new_status,
                Self::Accepted | Self::Declined | Self::Expired | Self::Cancelled
            ),
            // An accepted match completes on donation, expires if the
            // request dies first, or is cancelled with the request.
            Self::Accepted => {
                matches!(new_status, Self::Completed | Self::Expired | Self::Cancelled)
            }
            Self::Declined | Self::Expired | Self::Completed | Self::Cancelled => false,
        };

        if valid {
            Ok(())
        } else {
            Err(DomainError::InvalidStatusTransition {
                from: self.as_str().to_string(),
                to: new_status.as_str().to_string(),
                reason: String::from("transition not permitted by match status rules"),
            })
        }
    }
}

impl FromStr for MatchStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_str(s)
    }
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A record linking one request to one donor for one wave.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    /// Canonical identifier. `None` until persisted.
    pub match_id: Option<i64>,
    /// The request this match belongs to.
    pub request_id: i64,
    /// The donor this match targets.
    pub donor_id: i64,
    /// The notification wave (0-based) that produced this match.
    pub wave: u32,
    /// Current status.
    pub status: MatchStatus,
    /// When the candidate was selected.
    pub offered_at: OffsetDateTime,
    /// When the donor responded, if they did.
    pub responded_at: Option<OffsetDateTime>,
    /// Why the match was declined or annotated, if applicable.
    pub reason: Option<String>,
}

impl MatchRecord {
    /// Creates a new `Pending` match for a candidate in a wave.
    #[must_use]
    pub const fn new(
        request_id: i64,
        donor_id: i64,
        wave: u32,
        offered_at: OffsetDateTime,
    ) -> Self {
        Self {
            match_id: None,
            request_id,
            donor_id,
            wave,
            status: MatchStatus::Pending,
            offered_at,
            responded_at: None,
            reason: None,
        }
    }

    /// Applies a validated status transition in place.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidStatusTransition` if the transition is
    /// not permitted; the record is left unchanged.
    pub fn transition(
        &mut self,
        new_status: MatchStatus,
        reason: Option<String>,
    ) -> Result<(), DomainError> {
        self.status.validate_transition(new_status)?;
        self.status = new_status;
        if reason.is_some() {
            self.reason = reason;
        }
        Ok(())
    }
}
