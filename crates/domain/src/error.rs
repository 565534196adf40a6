// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

/// Errors that can occur during domain validation.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainError {
    /// Blood type string is not one of the eight ABO/Rh groups.
    InvalidBloodType(String),
    /// Urgency string is not a recognized level.
    InvalidUrgency(String),
    /// Contact channel string is not recognized.
    InvalidContactChannel(String),
    /// Latitude or longitude is outside the valid range.
    InvalidCoordinates {
        /// The latitude in degrees.
        latitude: f64,
        /// The longitude in degrees.
        longitude: f64,
    },
    /// Requested unit count must be positive.
    InvalidUnits {
        /// The invalid unit count.
        units: u32,
    },
    /// Hospital name is empty or invalid.
    InvalidHospital(String),
    /// Donor name is empty or invalid.
    InvalidDonorName(String),
    /// A donor must carry at least one contact channel.
    NoContactChannels,
    /// The needed-by deadline does not fall after the creation timestamp.
    DeadlineBeforeCreation {
        /// The creation timestamp (ISO 8601).
        created_at: String,
        /// The needed-by deadline (ISO 8601).
        needed_by: String,
    },
    /// Lifecycle state string is not recognized.
    InvalidLifecycleState(String),
    /// A request lifecycle transition is not permitted.
    InvalidLifecycleTransition {
        /// The current state.
        from: String,
        /// The requested state.
        to: String,
    },
    /// Match status string is not recognized.
    InvalidMatchStatus {
        /// The unrecognized status string.
        status: String,
    },
    /// A match status transition is not permitted.
    InvalidStatusTransition {
        /// The current status.
        from: String,
        /// The requested status.
        to: String,
        /// Why the transition is rejected.
        reason: String,
    },
    /// Escalation policy parameters are inconsistent.
    InvalidPolicy(String),
}

impl std::fmt::Display for DomainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidBloodType(value) => write!(f, "Invalid blood type: '{value}'"),
            Self::InvalidUrgency(value) => write!(f, "Invalid urgency level: '{value}'"),
            Self::InvalidContactChannel(value) => {
                write!(f, "Invalid contact channel: '{value}'")
            }
            Self::InvalidCoordinates {
                latitude,
                longitude,
            } => {
                write!(
                    f,
                    "Invalid coordinates: latitude {latitude}, longitude {longitude}"
                )
            }
            Self::InvalidUnits { units } => {
                write!(f, "Invalid unit count: {units}. Must be greater than 0")
            }
            Self::InvalidHospital(msg) => write!(f, "Invalid hospital: {msg}"),
            Self::InvalidDonorName(msg) => write!(f, "Invalid donor name: {msg}"),
            Self::NoContactChannels => {
                write!(f, "Donor must have at least one contact channel")
            }
            Self::DeadlineBeforeCreation {
                created_at,
                needed_by,
            } => {
                write!(
                    f,
                    "Needed-by deadline {needed_by} does not fall after creation time {created_at}"
                )
            }
            Self::InvalidLifecycleState(value) => {
                write!(f, "Invalid lifecycle state: '{value}'")
            }
            Self::InvalidLifecycleTransition { from, to } => {
                write!(f, "Lifecycle transition from {from} to {to} is not permitted")
            }
            Self::InvalidMatchStatus { status } => {
                write!(f, "Invalid match status: '{status}'")
            }
            Self::InvalidStatusTransition { from, to, reason } => {
                write!(
                    f,
                    "Match status transition from {from} to {to} is not permitted: {reason}"
                )
            }
            Self::InvalidPolicy(msg) => write!(f, "Invalid escalation policy: {msg}"),
        }
    }
}

impl std::error::Error for DomainError {}
