// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Request and response payloads for the API operations.
//!
//! Payloads carry plain strings for enums and RFC 3339 strings for
//! timestamps; the operations parse and translate them explicitly so
//! transport layers can stay dumb.

use serde::{Deserialize, Serialize};

/// Payload for submitting a blood request.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubmitRequestPayload {
    /// The requesting hospital.
    pub hospital: String,
    /// The blood group needed (e.g., "O-").
    pub blood_type: String,
    /// The urgency level ("low", "medium", "high", "critical").
    pub urgency: String,
    /// Hospital latitude in degrees.
    pub latitude: f64,
    /// Hospital longitude in degrees.
    pub longitude: f64,
    /// Units needed.
    pub units_needed: u32,
    /// Hard deadline, RFC 3339.
    pub needed_by: String,
}

/// Response to a submitted request.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubmitRequestResponse {
    /// The assigned request id.
    pub request_id: i64,
}

/// Payload for a donor's answer to a notification.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DonorResponsePayload {
    /// The responding donor.
    pub donor_id: i64,
    /// "accepted" or "declined".
    pub response: String,
}

/// Acknowledgement of a donor response.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DonorResponseAck {
    /// "recorded" when applied, "already_resolved" when the request had
    /// already been resolved and the response changed nothing.
    pub outcome: String,
}

/// Externally visible request status.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RequestStatusResponse {
    /// The request id.
    pub request_id: i64,
    /// Current lifecycle state.
    pub state: String,
    /// Units accepted so far.
    pub accepted_units: u32,
    /// Units requested.
    pub units_needed: u32,
    /// Waves dispatched so far.
    pub wave_number: u32,
    /// Next deadline (wave or needed-by), RFC 3339, absent once terminal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_deadline: Option<String>,
}

/// Payload for cancelling a request.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CancelRequestPayload {
    /// Who is cancelling (operator id, hospital id).
    pub cancelled_by: String,
}

/// Payload for registering a donor.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegisterDonorPayload {
    /// The donor's name.
    pub name: String,
    /// The donor's blood group (e.g., "AB+").
    pub blood_type: String,
    /// Donor latitude in degrees.
    pub latitude: f64,
    /// Donor longitude in degrees.
    pub longitude: f64,
    /// Contact channels in preference order ("sms", "email", "push").
    pub channels: Vec<String>,
}

/// Response to a donor registration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegisterDonorResponse {
    /// The assigned donor id.
    pub donor_id: i64,
}

/// Payload for a donor self-service availability update.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SetAvailabilityPayload {
    /// Whether the donor is currently willing and able to donate.
    pub available: bool,
}

/// Stock level for one blood type.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StockResponse {
    /// The blood group queried.
    pub blood_type: String,
    /// Units in stock; absent when no inventory feed is configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub units: Option<u32>,
}
