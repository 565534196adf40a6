// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! API boundary layer for the Hemolink donor matching system.
//!
//! Thin, transport-agnostic operations over the matching engine: payloads
//! in, payloads or [`ApiError`] out. All enum and timestamp parsing
//! happens here, and every inner error is translated explicitly before it
//! crosses the boundary.

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
#![allow(clippy::multiple_crate_versions)]

mod csv_import;
mod error;
mod request_response;

#[cfg(test)]
mod tests;

pub use csv_import::{ImportReport, ImportRowResult, ImportRowStatus, import_donor_roster};
pub use error::{ApiError, translate_domain_error, translate_engine_error};
pub use request_response::{
    CancelRequestPayload, DonorResponseAck, DonorResponsePayload, RegisterDonorPayload,
    RegisterDonorResponse, RequestStatusResponse, SetAvailabilityPayload, StockResponse,
    SubmitRequestPayload, SubmitRequestResponse,
};

use hemolink::{DonorResponse, MatchingEngine, RequestStatusView, ResponseAck};
use hemolink_audit::Actor;
use hemolink_domain::{BloodRequest, BloodType, ContactChannel, Donor, Location, Urgency};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::debug;

fn parse_needed_by(value: &str) -> Result<OffsetDateTime, ApiError> {
    OffsetDateTime::parse(value, &Rfc3339).map_err(|e| ApiError::InvalidInput {
        field: String::from("needed_by"),
        message: format!("'{value}' is not an RFC 3339 timestamp: {e}"),
    })
}

fn status_response(view: RequestStatusView) -> RequestStatusResponse {
    RequestStatusResponse {
        request_id: view.request_id,
        state: view.state.as_str().to_string(),
        accepted_units: view.accepted_units,
        units_needed: view.units_needed,
        wave_number: view.wave_number,
        next_deadline: view
            .next_deadline
            .and_then(|deadline| deadline.format(&Rfc3339).ok()),
    }
}

/// Submits a blood request and starts matching.
///
/// # Errors
///
/// Returns `ApiError::InvalidInput` for malformed fields; the request
/// never enters the state machine in that case.
pub async fn submit_request(
    engine: &MatchingEngine,
    payload: SubmitRequestPayload,
) -> Result<SubmitRequestResponse, ApiError> {
    let blood_type: BloodType =
        BloodType::parse(&payload.blood_type).map_err(translate_domain_error)?;
    let urgency: Urgency = Urgency::parse(&payload.urgency).map_err(translate_domain_error)?;
    let location: Location =
        Location::new(payload.latitude, payload.longitude).map_err(translate_domain_error)?;
    let needed_by: OffsetDateTime = parse_needed_by(&payload.needed_by)?;

    let request: BloodRequest = BloodRequest::new(
        payload.hospital,
        blood_type,
        urgency,
        location,
        payload.units_needed,
        OffsetDateTime::now_utc(),
        needed_by,
    );
    let request_id: i64 = engine
        .submit_request(request)
        .await
        .map_err(translate_engine_error)?;
    Ok(SubmitRequestResponse { request_id })
}

/// Records a donor's response to a notification.
///
/// # Errors
///
/// Returns `ApiError::ResourceNotFound` for unknown ids and
/// `ApiError::InvalidState` if the donor was never notified. A response
/// that loses a race with resolution is not an error; the ack reports
/// `already_resolved`.
pub async fn record_donor_response(
    engine: &MatchingEngine,
    request_id: i64,
    payload: DonorResponsePayload,
) -> Result<DonorResponseAck, ApiError> {
    let response: DonorResponse = match payload.response.as_str() {
        "accepted" => DonorResponse::Accepted,
        "declined" => DonorResponse::Declined,
        other => {
            return Err(ApiError::InvalidInput {
                field: String::from("response"),
                message: format!("'{other}' is neither 'accepted' nor 'declined'"),
            });
        }
    };

    let ack: ResponseAck = engine
        .record_donor_response(request_id, payload.donor_id, response)
        .await
        .map_err(translate_engine_error)?;
    debug!(request_id, donor_id = payload.donor_id, ?ack, "Donor response handled");
    Ok(DonorResponseAck {
        outcome: match ack {
            ResponseAck::Recorded => String::from("recorded"),
            ResponseAck::AlreadyResolved => String::from("already_resolved"),
        },
    })
}

/// Returns the externally visible status of a request.
///
/// # Errors
///
/// Returns `ApiError::ResourceNotFound` for an unknown id.
pub async fn get_request_status(
    engine: &MatchingEngine,
    request_id: i64,
) -> Result<RequestStatusResponse, ApiError> {
    let view: RequestStatusView = engine
        .get_request_status(request_id)
        .await
        .map_err(translate_engine_error)?;
    Ok(status_response(view))
}

/// Cancels a request from any non-terminal state.
///
/// # Errors
///
/// Returns `ApiError::ResourceNotFound` for an unknown id or
/// `ApiError::InvalidState` if the request already finished.
pub async fn cancel_request(
    engine: &MatchingEngine,
    request_id: i64,
    payload: CancelRequestPayload,
) -> Result<(), ApiError> {
    engine
        .cancel_request(
            request_id,
            Actor::new(payload.cancelled_by, String::from("operator")),
        )
        .await
        .map_err(translate_engine_error)
}

/// Registers a new donor.
///
/// # Errors
///
/// Returns `ApiError::InvalidInput` for malformed fields.
pub fn register_donor(
    engine: &MatchingEngine,
    payload: RegisterDonorPayload,
) -> Result<RegisterDonorResponse, ApiError> {
    let blood_type: BloodType =
        BloodType::parse(&payload.blood_type).map_err(translate_domain_error)?;
    let location: Location =
        Location::new(payload.latitude, payload.longitude).map_err(translate_domain_error)?;
    let mut channels: Vec<ContactChannel> = Vec::with_capacity(payload.channels.len());
    for channel in &payload.channels {
        channels.push(ContactChannel::parse(channel).map_err(translate_domain_error)?);
    }

    let donor: Donor = Donor::new(payload.name, blood_type, location, channels);
    let donor_id: i64 = engine
        .register_donor(&donor)
        .map_err(translate_engine_error)?;
    Ok(RegisterDonorResponse { donor_id })
}

/// Sets a donor's availability flag (self-service update).
///
/// # Errors
///
/// Returns `ApiError::ResourceNotFound` for an unknown id.
pub fn set_donor_availability(
    engine: &MatchingEngine,
    donor_id: i64,
    payload: &SetAvailabilityPayload,
) -> Result<(), ApiError> {
    engine
        .set_donor_availability(donor_id, payload.available)
        .map_err(translate_engine_error)
}

/// Returns the blood bank stock level for a blood type.
///
/// # Errors
///
/// Returns `ApiError::InvalidInput` for an unrecognized blood type.
pub fn check_stock(engine: &MatchingEngine, blood_type: &str) -> Result<StockResponse, ApiError> {
    let parsed: BloodType = BloodType::parse(blood_type).map_err(translate_domain_error)?;
    let units: Option<u32> = engine.check_stock(parsed).map_err(translate_engine_error)?;
    Ok(StockResponse {
        blood_type: parsed.as_str().to_string(),
        units,
    })
}
