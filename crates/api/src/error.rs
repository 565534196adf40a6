// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Error types for the API layer.

use hemolink::EngineError;
use hemolink_domain::DomainError;

/// API-level errors.
///
/// These are distinct from domain/engine errors and represent the API
/// contract; inner errors are translated explicitly and never leaked.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    /// Invalid input was provided.
    InvalidInput {
        /// The field that was invalid.
        field: String,
        /// A human-readable description of the error.
        message: String,
    },
    /// A domain rule was violated.
    DomainRuleViolation {
        /// The rule that was violated.
        rule: String,
        /// A human-readable description of the violation.
        message: String,
    },
    /// A requested resource was not found.
    ResourceNotFound {
        /// The type of resource that was not found.
        resource_type: String,
        /// A human-readable description of what was not found.
        message: String,
    },
    /// The operation does not apply in the target's current state.
    InvalidState {
        /// A human-readable description.
        message: String,
    },
    /// The uploaded CSV could not be parsed at all.
    InvalidCsvFormat {
        /// Why the CSV was rejected.
        reason: String,
    },
    /// An internal error occurred.
    Internal {
        /// A description of the internal error.
        message: String,
    },
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput { field, message } => {
                write!(f, "Invalid input for field '{field}': {message}")
            }
            Self::DomainRuleViolation { rule, message } => {
                write!(f, "Domain rule violation ({rule}): {message}")
            }
            Self::ResourceNotFound {
                resource_type,
                message,
            } => {
                write!(f, "{resource_type} not found: {message}")
            }
            Self::InvalidState { message } => write!(f, "Invalid state: {message}"),
            Self::InvalidCsvFormat { reason } => write!(f, "Invalid CSV: {reason}"),
            Self::Internal { message } => write!(f, "Internal error: {message}"),
        }
    }
}

impl std::error::Error for ApiError {}

/// Translates a domain error into an API error.
///
/// This translation is explicit and ensures domain errors are not leaked
/// directly.
#[must_use]
pub fn translate_domain_error(err: DomainError) -> ApiError {
    match err {
        DomainError::InvalidBloodType(value) => ApiError::InvalidInput {
            field: String::from("blood_type"),
            message: format!("'{value}' is not one of the eight ABO/Rh groups"),
        },
        DomainError::InvalidUrgency(value) => ApiError::InvalidInput {
            field: String::from("urgency"),
            message: format!("'{value}' is not a recognized urgency level"),
        },
        DomainError::InvalidContactChannel(value) => ApiError::InvalidInput {
            field: String::from("channels"),
            message: format!("'{value}' is not a recognized contact channel"),
        },
        DomainError::InvalidCoordinates {
            latitude,
            longitude,
        } => ApiError::InvalidInput {
            field: String::from("location"),
            message: format!("({latitude}, {longitude}) is not a valid coordinate pair"),
        },
        DomainError::InvalidUnits { units } => ApiError::InvalidInput {
            field: String::from("units_needed"),
            message: format!("Invalid unit count: {units}. Must be greater than 0"),
        },
        DomainError::InvalidHospital(msg) => ApiError::InvalidInput {
            field: String::from("hospital"),
            message: msg,
        },
        DomainError::InvalidDonorName(msg) => ApiError::InvalidInput {
            field: String::from("name"),
            message: msg,
        },
        DomainError::NoContactChannels => ApiError::InvalidInput {
            field: String::from("channels"),
            message: String::from("At least one contact channel is required"),
        },
        DomainError::DeadlineBeforeCreation {
            created_at,
            needed_by,
        } => ApiError::InvalidInput {
            field: String::from("needed_by"),
            message: format!("Deadline {needed_by} does not fall after creation time {created_at}"),
        },
        DomainError::InvalidLifecycleState(value) => ApiError::InvalidInput {
            field: String::from("state"),
            message: format!("'{value}' is not a recognized lifecycle state"),
        },
        DomainError::InvalidLifecycleTransition { from, to } => ApiError::DomainRuleViolation {
            rule: String::from("lifecycle_transitions"),
            message: format!("Transition from {from} to {to} is not permitted"),
        },
        DomainError::InvalidMatchStatus { status } => ApiError::InvalidInput {
            field: String::from("status"),
            message: format!("'{status}' is not a recognized match status"),
        },
        DomainError::InvalidStatusTransition { from, to, reason } => {
            ApiError::DomainRuleViolation {
                rule: String::from("match_status_transitions"),
                message: format!("Transition from {from} to {to} is not permitted: {reason}"),
            }
        }
        DomainError::InvalidPolicy(msg) => ApiError::InvalidInput {
            field: String::from("policy"),
            message: msg,
        },
    }
}

/// Translates an engine error into an API error.
///
/// This translation is explicit and ensures engine errors are not leaked
/// directly.
#[must_use]
pub fn translate_engine_error(err: EngineError) -> ApiError {
    match err {
        EngineError::DomainViolation(domain_err) => translate_domain_error(domain_err),
        EngineError::RequestNotFound(id) => ApiError::ResourceNotFound {
            resource_type: String::from("Request"),
            message: format!("Request {id} does not exist"),
        },
        EngineError::DonorNotFound(id) => ApiError::ResourceNotFound {
            resource_type: String::from("Donor"),
            message: format!("Donor {id} does not exist"),
        },
        EngineError::InvalidState { request_id, reason } => ApiError::InvalidState {
            message: format!("Request {request_id}: {reason}"),
        },
        EngineError::AlreadyTerminal { request_id, state } => ApiError::InvalidState {
            message: format!("Request {request_id} is already terminal ({state})"),
        },
        EngineError::Store(store_err) => ApiError::Internal {
            message: format!("Storage failure: {store_err}"),
        },
    }
}
