// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use crate::{
    ApiError, CancelRequestPayload, DonorResponsePayload, ImportRowStatus, RegisterDonorPayload,
    SetAvailabilityPayload, SubmitRequestPayload, cancel_request, check_stock,
    get_request_status, import_donor_roster, record_donor_response, register_donor,
    set_donor_availability, submit_request,
};
use hemolink::{
    DeliveryReceipt, DispatchError, DonorStore, InventoryFeed, MatchingEngine,
    NotificationDispatcher, RequestSummary,
};
use hemolink_domain::{BloodType, ContactChannel, Donor, EscalationPolicy};
use hemolink_persistence::SqliteStore;
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime};

/// A dispatcher that accepts everything and tells no one.
struct NullDispatcher;

impl NotificationDispatcher for NullDispatcher {
    fn notify(
        &self,
        donor: &Donor,
        _summary: &RequestSummary,
        channel: ContactChannel,
    ) -> Result<DeliveryReceipt, DispatchError> {
        Ok(DeliveryReceipt {
            donor_id: donor.donor_id.unwrap_or(-1),
            channel,
            dispatched_at: OffsetDateTime::now_utc(),
        })
    }
}

fn engine() -> MatchingEngine {
    engine_with_inventory(false).0
}

fn engine_with_inventory(with_feed: bool) -> (MatchingEngine, Arc<SqliteStore>) {
    let store: Arc<SqliteStore> = Arc::new(SqliteStore::new_in_memory().expect("store"));
    let inventory = with_feed.then(|| Arc::clone(&store) as Arc<dyn InventoryFeed>);
    let engine = MatchingEngine::new(
        Arc::clone(&store) as Arc<dyn DonorStore>,
        Arc::new(NullDispatcher),
        inventory,
        EscalationPolicy::default(),
    );
    (engine, store)
}

fn donor_payload(name: &str, blood_type: &str) -> RegisterDonorPayload {
    RegisterDonorPayload {
        name: String::from(name),
        blood_type: String::from(blood_type),
        latitude: 35.09,
        longitude: -106.65,
        channels: vec![String::from("sms")],
    }
}

fn request_payload(blood_type: &str, units: u32) -> SubmitRequestPayload {
    SubmitRequestPayload {
        hospital: String::from("Presbyterian"),
        blood_type: String::from(blood_type),
        urgency: String::from("high"),
        latitude: 35.0844,
        longitude: -106.6504,
        units_needed: units,
        needed_by: (OffsetDateTime::now_utc() + Duration::hours(6))
            .format(&Rfc3339)
            .unwrap(),
    }
}

#[tokio::test(start_paused = true)]
async fn test_submit_respond_and_complete_through_the_boundary() {
    let engine = engine();
    let donor_a = register_donor(&engine, donor_payload("Avery", "O+")).unwrap();
    let donor_b = register_donor(&engine, donor_payload("Blake", "O-")).unwrap();

    let submitted = submit_request(&engine, request_payload("O+", 2)).await.unwrap();

    let status = get_request_status(&engine, submitted.request_id).await.unwrap();
    assert_eq!(status.state, "matching");
    assert_eq!(status.wave_number, 1);
    assert!(status.next_deadline.is_some());

    let ack = record_donor_response(
        &engine,
        submitted.request_id,
        DonorResponsePayload {
            donor_id: donor_a.donor_id,
            response: String::from("accepted"),
        },
    )
    .await
    .unwrap();
    assert_eq!(ack.outcome, "recorded");

    let ack = record_donor_response(
        &engine,
        submitted.request_id,
        DonorResponsePayload {
            donor_id: donor_b.donor_id,
            response: String::from("accepted"),
        },
    )
    .await
    .unwrap();
    assert_eq!(ack.outcome, "recorded");

    let status = get_request_status(&engine, submitted.request_id).await.unwrap();
    assert_eq!(status.state, "completed");
    assert_eq!(status.accepted_units, 2);
    assert_eq!(status.next_deadline, None);
}

#[tokio::test(start_paused = true)]
async fn test_submit_rejects_unknown_blood_type() {
    let engine = engine();
    let result = submit_request(&engine, request_payload("Q+", 1)).await;
    assert!(matches!(result, Err(ApiError::InvalidInput { field, .. }) if field == "blood_type"));
}

#[tokio::test(start_paused = true)]
async fn test_submit_rejects_malformed_deadline() {
    let engine = engine();
    let mut payload = request_payload("O+", 1);
    payload.needed_by = String::from("next tuesday");
    let result = submit_request(&engine, payload).await;
    assert!(matches!(result, Err(ApiError::InvalidInput { field, .. }) if field == "needed_by"));
}

#[tokio::test(start_paused = true)]
async fn test_response_payload_must_be_accepted_or_declined() {
    let engine = engine();
    register_donor(&engine, donor_payload("Avery", "O+")).unwrap();
    let submitted = submit_request(&engine, request_payload("O+", 1)).await.unwrap();

    let result = record_donor_response(
        &engine,
        submitted.request_id,
        DonorResponsePayload {
            donor_id: 1,
            response: String::from("maybe"),
        },
    )
    .await;
    assert!(matches!(result, Err(ApiError::InvalidInput { field, .. }) if field == "response"));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_then_late_response_reports_already_resolved() {
    let engine = engine();
    let donor = register_donor(&engine, donor_payload("Avery", "O+")).unwrap();
    let submitted = submit_request(&engine, request_payload("O+", 1)).await.unwrap();

    cancel_request(
        &engine,
        submitted.request_id,
        CancelRequestPayload {
            cancelled_by: String::from("ops-1"),
        },
    )
    .await
    .unwrap();

    let ack = record_donor_response(
        &engine,
        submitted.request_id,
        DonorResponsePayload {
            donor_id: donor.donor_id,
            response: String::from("accepted"),
        },
    )
    .await
    .unwrap();
    assert_eq!(ack.outcome, "already_resolved");

    let again = cancel_request(
        &engine,
        submitted.request_id,
        CancelRequestPayload {
            cancelled_by: String::from("ops-1"),
        },
    )
    .await;
    assert!(matches!(again, Err(ApiError::InvalidState { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_unknown_request_is_resource_not_found() {
    let engine = engine();
    let result = get_request_status(&engine, 404).await;
    assert!(matches!(result, Err(ApiError::ResourceNotFound { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_donor_self_service_availability() {
    let engine = engine();
    let donor = register_donor(&engine, donor_payload("Avery", "A-")).unwrap();

    set_donor_availability(&engine, donor.donor_id, &SetAvailabilityPayload { available: false })
        .unwrap();

    let missing = set_donor_availability(
        &engine,
        donor.donor_id + 50,
        &SetAvailabilityPayload { available: true },
    );
    assert!(matches!(missing, Err(ApiError::ResourceNotFound { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_stock_reports_feed_presence() {
    let (engine, store) = engine_with_inventory(true);
    store.set_stock(BloodType::AbNeg, 4).unwrap();

    let stocked = check_stock(&engine, "AB-").unwrap();
    assert_eq!(stocked.units, Some(4));
    let empty = check_stock(&engine, "O+").unwrap();
    assert_eq!(empty.units, Some(0));

    let (feedless, _store) = engine_with_inventory(false);
    let absent = check_stock(&feedless, "AB-").unwrap();
    assert_eq!(absent.units, None);

    let bad = check_stock(&feedless, "AB±");
    assert!(matches!(bad, Err(ApiError::InvalidInput { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_roster_import_reports_per_row_results() {
    let engine = engine();
    let csv_text = "\
name,blood_type,latitude,longitude,channels
Avery Quinn,O+,35.09,-106.65,sms|email
Blake Moss,Z+,35.10,-106.66,sms
Casey Hart,B-,95.00,-106.67,push
Drew Lane,AB+,35.11,-106.68,
Elliot Fox,O-,35.12,-106.69,email
";

    let report = import_donor_roster(&engine, csv_text).unwrap();
    assert_eq!(report.total_rows, 5);
    assert_eq!(report.imported_count, 2);
    assert_eq!(report.rejected_count, 3);

    assert_eq!(report.rows[0].status, ImportRowStatus::Imported);
    assert!(report.rows[0].donor_id.is_some());

    assert_eq!(report.rows[1].status, ImportRowStatus::Rejected);
    assert!(report.rows[1].errors[0].contains("blood_type"));

    assert_eq!(report.rows[2].status, ImportRowStatus::Rejected);
    assert!(report.rows[2].errors[0].contains("location"));

    assert_eq!(report.rows[3].status, ImportRowStatus::Rejected);
    assert!(report.rows[3].errors[0].contains("channels"));

    assert_eq!(report.rows[4].status, ImportRowStatus::Imported);
}

#[tokio::test(start_paused = true)]
async fn test_roster_import_rejects_missing_headers() {
    let engine = engine();
    let csv_text = "name,blood_type\nAvery,O+\n";
    let result = import_donor_roster(&engine, csv_text);
    assert!(matches!(result, Err(ApiError::InvalidCsvFormat { .. })));
}
