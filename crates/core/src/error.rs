// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use crate::traits::StoreError;
use hemolink_domain::{DomainError, RequestState};

/// Errors surfaced by the matching engine's operations.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// A domain rule was violated.
    DomainViolation(DomainError),
    /// The backing store failed; fatal to the operation.
    Store(StoreError),
    /// No request exists with the given id.
    RequestNotFound(i64),
    /// No donor exists with the given id.
    DonorNotFound(i64),
    /// The operation does not apply to the request in its current state.
    InvalidState {
        /// The request the operation targeted.
        request_id: i64,
        /// Why the operation was rejected.
        reason: String,
    },
    /// The request already reached a terminal state.
    AlreadyTerminal {
        /// The request the operation targeted.
        request_id: i64,
        /// The terminal state it is in.
        state: RequestState,
    },
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DomainViolation(err) => write!(f, "Domain violation: {err}"),
            Self::Store(err) => write!(f, "Store error: {err}"),
            Self::RequestNotFound(id) => write!(f, "Request {id} not found"),
            Self::DonorNotFound(id) => write!(f, "Donor {id} not found"),
            Self::InvalidState { request_id, reason } => {
                write!(f, "Invalid operation for request {request_id}: {reason}")
            }
            Self::AlreadyTerminal { request_id, state } => {
                write!(f, "Request {request_id} is already terminal ({state})")
            }
        }
    }
}

impl std::error::Error for EngineError {}

impl From<DomainError> for EngineError {
    fn from(err: DomainError) -> Self {
        Self::DomainViolation(err)
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}
