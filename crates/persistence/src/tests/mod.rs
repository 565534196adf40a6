// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use crate::SqliteStore;
use hemolink::{DonorStore, InventoryFeed, StoreError, WaveRecord};
use hemolink_audit::{Action, Actor, AuditEvent, Cause, StateSnapshot};
use hemolink_domain::{
    BloodRequest, BloodType, ContactChannel, Donor, Location, MatchRecord, MatchStatus,
    RequestState, Urgency,
};
use time::{Duration, OffsetDateTime};

fn store() -> SqliteStore {
    SqliteStore::new_in_memory().expect("in-memory store")
}

fn test_location() -> Location {
    Location::new(35.0844, -106.6504).unwrap()
}

fn test_donor(name: &str, blood_type: BloodType) -> Donor {
    Donor::new(
        String::from(name),
        blood_type,
        test_location(),
        vec![ContactChannel::Sms, ContactChannel::Email],
    )
}

fn test_request(blood_type: BloodType) -> BloodRequest {
    let now: OffsetDateTime = OffsetDateTime::now_utc();
    BloodRequest::new(
        String::from("Presbyterian"),
        blood_type,
        Urgency::High,
        test_location(),
        2,
        now,
        now + Duration::hours(6),
    )
}

#[test]
fn test_donor_round_trip_preserves_channels_and_history() {
    let store = store();
    let mut donor = test_donor("Alex Rivera", BloodType::ONeg);
    donor.last_donation = Some(OffsetDateTime::now_utc() - Duration::days(80));

    let donor_id = store.save_donor(&donor).unwrap();
    let loaded = store.get_donor(donor_id).unwrap().expect("donor exists");

    assert_eq!(loaded.donor_id, Some(donor_id));
    assert_eq!(loaded.name, "Alex Rivera");
    assert_eq!(loaded.blood_type, BloodType::ONeg);
    assert!(loaded.available);
    assert_eq!(
        loaded.channels,
        vec![ContactChannel::Sms, ContactChannel::Email]
    );
    let stored = loaded.last_donation.expect("history kept");
    let original = donor.last_donation.unwrap();
    assert!((stored - original).abs() < Duration::seconds(1));
}

#[test]
fn test_unknown_donor_reads_as_none() {
    let store = store();
    assert!(store.get_donor(12345).unwrap().is_none());
}

#[test]
fn test_donation_side_effects_update_the_row() {
    let store = store();
    let donor_id = store.save_donor(&test_donor("Sam", BloodType::APos)).unwrap();
    let donated_at = OffsetDateTime::now_utc();

    store
        .update_donor_after_donation(donor_id, donated_at)
        .unwrap();
    let loaded = store.get_donor(donor_id).unwrap().unwrap();
    assert!(!loaded.available);
    assert!(loaded.last_donation.is_some());
}

#[test]
fn test_update_missing_donor_is_row_not_found() {
    let store = store();
    let result = store.update_donor_availability(999, false);
    assert!(matches!(result, Err(StoreError::RowNotFound(_))));
}

#[test]
fn test_find_compatible_donors_prefilters_type_and_availability() {
    let store = store();
    // For a B- recipient only B- and O- serve.
    let keep = store.save_donor(&test_donor("BNeg", BloodType::BNeg)).unwrap();
    store.save_donor(&test_donor("BPos", BloodType::BPos)).unwrap();
    store.save_donor(&test_donor("APos", BloodType::APos)).unwrap();
    let unavailable = store.save_donor(&test_donor("ONegOff", BloodType::ONeg)).unwrap();
    store.update_donor_availability(unavailable, false).unwrap();

    let request = test_request(BloodType::BNeg);
    let found = store.find_compatible_donors(&request, 50.0, &[]).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].donor_id, Some(keep));

    // The exclusion list drops the survivor too.
    let found = store
        .find_compatible_donors(&request, 50.0, &[keep])
        .unwrap();
    assert!(found.is_empty());
}

#[test]
fn test_request_status_update_is_single_row() {
    let store = store();
    let request = test_request(BloodType::OPos);
    let first = store.save_request(&request).unwrap();
    let second = store.save_request(&request).unwrap();

    store
        .update_request_status(first, RequestState::Matching)
        .unwrap();

    let open = store.load_open_requests().unwrap();
    let states: Vec<(Option<i64>, RequestState)> = open
        .iter()
        .map(|o| (o.request.request_id, o.request.state))
        .collect();
    assert!(states.contains(&(Some(first), RequestState::Matching)));
    assert!(states.contains(&(Some(second), RequestState::Created)));

    let missing = store.update_request_status(9999, RequestState::Matching);
    assert!(matches!(missing, Err(StoreError::RowNotFound(_))));
}

#[test]
fn test_load_open_requests_excludes_terminal_states() {
    let store = store();
    let open_id = store.save_request(&test_request(BloodType::OPos)).unwrap();
    let done_id = store.save_request(&test_request(BloodType::OPos)).unwrap();
    store
        .update_request_status(done_id, RequestState::Matching)
        .unwrap();
    store
        .update_request_status(done_id, RequestState::Cancelled)
        .unwrap();

    let open = store.load_open_requests().unwrap();
    let ids: Vec<Option<i64>> = open.iter().map(|o| o.request.request_id).collect();
    assert!(ids.contains(&Some(open_id)));
    assert!(!ids.contains(&Some(done_id)));
}

#[test]
fn test_open_request_carries_matches_and_last_wave() {
    let store = store();
    let donor_id = store.save_donor(&test_donor("Dana", BloodType::OPos)).unwrap();
    let request_id = store.save_request(&test_request(BloodType::OPos)).unwrap();
    store
        .update_request_status(request_id, RequestState::Matching)
        .unwrap();

    let now = OffsetDateTime::now_utc();
    let mut record = MatchRecord::new(request_id, donor_id, 0, now);
    let match_id = store.save_match(&record).unwrap();
    record.match_id = Some(match_id);
    store
        .update_match_status(match_id, MatchStatus::Notified, None)
        .unwrap();

    for wave in 0..2 {
        store
            .record_wave(
                request_id,
                &WaveRecord {
                    wave,
                    radius_km: 50.0 * f64::from(wave + 1),
                    dispatched_at: now,
                    deadline: now + Duration::minutes(30),
                    candidates: 1,
                },
            )
            .unwrap();
    }

    let open = store.load_open_requests().unwrap();
    let entry = open
        .iter()
        .find(|o| o.request.request_id == Some(request_id))
        .expect("open request present");
    assert_eq!(entry.matches.len(), 1);
    assert_eq!(entry.matches[0].status, MatchStatus::Notified);
    assert_eq!(entry.matches[0].donor_id, donor_id);
    let last_wave = entry.last_wave.as_ref().expect("wave recorded");
    assert_eq!(last_wave.wave, 1);
    assert!((last_wave.radius_km - 100.0).abs() < f64::EPSILON);
}

#[test]
fn test_match_status_update_stamps_response_and_reason() {
    let store = store();
    let donor_id = store.save_donor(&test_donor("Riley", BloodType::OPos)).unwrap();
    let request_id = store.save_request(&test_request(BloodType::OPos)).unwrap();
    let match_id = store
        .save_match(&MatchRecord::new(
            request_id,
            donor_id,
            0,
            OffsetDateTime::now_utc(),
        ))
        .unwrap();

    store
        .update_match_status(match_id, MatchStatus::Notified, None)
        .unwrap();
    store
        .update_match_status(
            match_id,
            MatchStatus::Declined,
            Some(hemolink_domain::REASON_NO_LONGER_ELIGIBLE),
        )
        .unwrap();

    let open = store.load_open_requests().unwrap();
    let record = &open
        .iter()
        .find(|o| o.request.request_id == Some(request_id))
        .unwrap()
        .matches[0];
    assert_eq!(record.status, MatchStatus::Declined);
    assert!(record.responded_at.is_some());
    assert_eq!(
        record.reason.as_deref(),
        Some(hemolink_domain::REASON_NO_LONGER_ELIGIBLE)
    );
}

#[test]
fn test_inventory_reserve_only_succeeds_with_full_cover() {
    let store = store();
    store.set_stock(BloodType::AbNeg, 3).unwrap();

    assert_eq!(store.check_stock(BloodType::AbNeg).unwrap(), 3);
    assert_eq!(store.check_stock(BloodType::OPos).unwrap(), 0);

    assert!(!store.reserve_stock(BloodType::AbNeg, 5).unwrap());
    assert_eq!(store.check_stock(BloodType::AbNeg).unwrap(), 3);

    assert!(store.reserve_stock(BloodType::AbNeg, 2).unwrap());
    assert_eq!(store.check_stock(BloodType::AbNeg).unwrap(), 1);

    assert!(!store.reserve_stock(BloodType::OPos, 1).unwrap());
}

#[test]
fn test_audit_events_append_per_request() {
    let store = store();
    let request_id = store.save_request(&test_request(BloodType::OPos)).unwrap();

    for action in ["SubmitRequest", "BeginMatching", "DispatchWave"] {
        store
            .append_audit(&AuditEvent::new(
                Actor::scheduler(),
                Cause::new(format!("request-{request_id}"), String::from("test")),
                Action::new(String::from(action), None),
                StateSnapshot::new(String::from("before")),
                StateSnapshot::new(String::from("after")),
                request_id,
            ))
            .unwrap();
    }

    assert_eq!(store.count_audit_events(request_id).unwrap(), 3);
    assert_eq!(store.count_audit_events(request_id + 1).unwrap(), 0);
}
