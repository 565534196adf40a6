// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Domain types and rule validation for the Hemolink donor matching
//! system.
//!
//! This crate holds the vocabulary of the system: blood groups and the
//! ABO/Rh compatibility table, donors, blood requests and their lifecycle
//! state machine, match records and their status rules, geographic
//! primitives, and the escalation policy. It performs no I/O and holds no
//! mutable state.

#![deny(
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    clippy::style,
    clippy::correctness,
    clippy::all,
    clippy::suspicious,
    clippy::complexity,
    clippy::perf,
    clippy::unwrap_used,
    clippy::expect_used
)]

mod blood_type;
mod donor;
mod error;
mod escalation;
mod geo;
mod match_record;
mod request;
mod validation;

pub use blood_type::BloodType;
pub use donor::{ContactChannel, Donor};
pub use error::DomainError;
pub use escalation::EscalationPolicy;
pub use geo::Location;
pub use match_record::{
    MatchRecord, MatchStatus, REASON_NO_LONGER_ELIGIBLE, REASON_REQUEST_RESOLVED,
};
pub use request::{BloodRequest, RequestState, Urgency};
pub use validation::{validate_donor_fields, validate_request_fields};
