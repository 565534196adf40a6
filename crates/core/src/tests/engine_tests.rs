// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! End-to-end engine tests on a paused clock: wave deadlines and request
//! expiry fire deterministically without real waiting.

use crate::context::{DonorResponse, ResponseAck};
use crate::engine::MatchingEngine;
use crate::error::EngineError;
use crate::tests::helpers::{MemoryStore, RecordingDispatcher, donor_km_north, request};
use crate::traits::{DonorStore, NotificationDispatcher, WaveRecord};
use hemolink_audit::Actor;
use hemolink_domain::{
    BloodRequest, BloodType, EscalationPolicy, MatchRecord, MatchStatus, RequestState, Urgency,
};
use std::sync::Arc;
use std::time::Duration;
use time::{Duration as TimeDuration, OffsetDateTime};

struct EngineHarness {
    store: Arc<MemoryStore>,
    dispatcher: Arc<RecordingDispatcher>,
    engine: MatchingEngine,
}

fn engine_harness(policy: EscalationPolicy) -> EngineHarness {
    let store = Arc::new(MemoryStore::new());
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let engine = MatchingEngine::new(
        Arc::clone(&store) as Arc<dyn DonorStore>,
        Arc::clone(&dispatcher) as Arc<dyn NotificationDispatcher>,
        None,
        policy,
    );
    EngineHarness {
        store,
        dispatcher,
        engine,
    }
}

fn cancel_actor() -> Actor {
    Actor::new(String::from("ops-7"), String::from("operator"))
}

#[tokio::test(start_paused = true)]
async fn test_submit_accept_and_complete() {
    let h = engine_harness(EscalationPolicy::default());
    let donors: Vec<i64> = (0..5)
        .map(|i| {
            h.store
                .save_donor(&donor_km_north(
                    &format!("Donor{i}"),
                    BloodType::OPos,
                    5.0 + f64::from(i) * 3.0,
                ))
                .unwrap()
        })
        .collect();

    let request_id = h
        .engine
        .submit_request(request(BloodType::OPos, Urgency::High, 2))
        .await
        .unwrap();
    assert_eq!(h.dispatcher.count(), 5);

    let ack = h
        .engine
        .record_donor_response(request_id, donors[0], DonorResponse::Accepted)
        .await
        .unwrap();
    assert_eq!(ack, ResponseAck::Recorded);

    let view = h.engine.get_request_status(request_id).await.unwrap();
    assert_eq!(view.state, RequestState::Fulfilling);
    assert_eq!(view.accepted_units, 1);

    h.engine
        .record_donor_response(request_id, donors[1], DonorResponse::Accepted)
        .await
        .unwrap();

    let view = h.engine.get_request_status(request_id).await.unwrap();
    assert_eq!(view.state, RequestState::Completed);
    assert_eq!(view.accepted_units, 2);
    assert_eq!(view.next_deadline, None);
}

#[tokio::test(start_paused = true)]
async fn test_wave_deadline_fires_and_widens_automatically() {
    let h = engine_harness(EscalationPolicy::default());
    for i in 0..5 {
        h.store
            .save_donor(&donor_km_north(
                &format!("Near{i}"),
                BloodType::OPos,
                5.0 + f64::from(i) * 5.0,
            ))
            .unwrap();
    }
    for i in 0..3 {
        h.store
            .save_donor(&donor_km_north(
                &format!("Far{i}"),
                BloodType::OPos,
                60.0 + f64::from(i) * 5.0,
            ))
            .unwrap();
    }

    let request_id = h
        .engine
        .submit_request(request(BloodType::OPos, Urgency::Medium, 2))
        .await
        .unwrap();
    assert_eq!(h.dispatcher.count(), 5);

    // Past the 45-minute medium-urgency wave deadline.
    tokio::time::sleep(Duration::from_secs(46 * 60)).await;

    assert_eq!(h.dispatcher.count(), 8);
    let view = h.engine.get_request_status(request_id).await.unwrap();
    assert_eq!(view.state, RequestState::Matching);
    assert_eq!(view.wave_number, 2);
}

#[tokio::test(start_paused = true)]
async fn test_needed_by_deadline_expires_request_mid_wave() {
    let h = engine_harness(EscalationPolicy::default());
    for i in 0..3 {
        h.store
            .save_donor(&donor_km_north(
                &format!("Donor{i}"),
                BloodType::OPos,
                5.0 + f64::from(i),
            ))
            .unwrap();
    }

    // Needed in 10 minutes; the 30-minute high-urgency wave deadline
    // never gets a chance.
    let now = OffsetDateTime::now_utc();
    let req = BloodRequest::new(
        String::from("University Hospital"),
        BloodType::OPos,
        Urgency::High,
        crate::tests::helpers::hospital_location(),
        1,
        now,
        now + TimeDuration::minutes(10),
    );
    let request_id = h.engine.submit_request(req).await.unwrap();

    tokio::time::sleep(Duration::from_secs(11 * 60)).await;

    let view = h.engine.get_request_status(request_id).await.unwrap();
    assert_eq!(view.state, RequestState::Expired);
    assert_eq!(h.store.request_state(request_id), RequestState::Expired);
    let rows = h.store.matches_for(request_id);
    assert!(rows.iter().all(|m| m.status == MatchStatus::Expired));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_then_response_resolves_as_noop() {
    let h = engine_harness(EscalationPolicy::default());
    let donor = h
        .store
        .save_donor(&donor_km_north("Donor", BloodType::OPos, 5.0))
        .unwrap();

    let request_id = h
        .engine
        .submit_request(request(BloodType::OPos, Urgency::High, 1))
        .await
        .unwrap();

    h.engine
        .cancel_request(request_id, cancel_actor())
        .await
        .unwrap();
    let view = h.engine.get_request_status(request_id).await.unwrap();
    assert_eq!(view.state, RequestState::Cancelled);

    let ack = h
        .engine
        .record_donor_response(request_id, donor, DonorResponse::Accepted)
        .await
        .unwrap();
    assert_eq!(ack, ResponseAck::AlreadyResolved);

    let again = h.engine.cancel_request(request_id, cancel_actor()).await;
    assert!(matches!(again, Err(EngineError::AlreadyTerminal { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_unknown_request_id_is_not_found() {
    let h = engine_harness(EscalationPolicy::default());
    let result = h.engine.get_request_status(42).await;
    assert!(matches!(result, Err(EngineError::RequestNotFound(42))));

    let result = h
        .engine
        .record_donor_response(42, 1, DonorResponse::Accepted)
        .await;
    assert!(matches!(result, Err(EngineError::RequestNotFound(42))));
}

#[tokio::test(start_paused = true)]
async fn test_submit_rejects_malformed_request_at_intake() {
    let h = engine_harness(EscalationPolicy::default());
    let now = OffsetDateTime::now_utc();
    let req = BloodRequest::new(
        String::from("University Hospital"),
        BloodType::OPos,
        Urgency::High,
        crate::tests::helpers::hospital_location(),
        0,
        now,
        now + TimeDuration::hours(6),
    );
    let result = h.engine.submit_request(req).await;
    assert!(matches!(result, Err(EngineError::DomainViolation(_))));
    // Nothing entered the state machine.
    assert!(h.store.load_open_requests().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_donor_registration_and_self_service_availability() {
    let h = engine_harness(EscalationPolicy::default());
    let donor_id = h
        .engine
        .register_donor(&donor_km_north("Jordan", BloodType::ANeg, 12.0))
        .unwrap();

    h.engine.set_donor_availability(donor_id, false).unwrap();
    assert!(!h.engine.get_donor(donor_id).unwrap().available);

    let missing = h.engine.set_donor_availability(donor_id + 100, true);
    assert!(matches!(missing, Err(EngineError::DonorNotFound(_))));
}

#[tokio::test(start_paused = true)]
async fn test_recovery_resumes_pending_wave_deadline() {
    let store = Arc::new(MemoryStore::new());
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let now = OffsetDateTime::now_utc();

    // State left behind by a previous engine run: one open wave with two
    // notified donors, deadline five minutes out, and two fresh donors
    // the next wave can reach.
    let donor_ids: Vec<i64> = (0..4)
        .map(|i| {
            store
                .save_donor(&donor_km_north(
                    &format!("Donor{i}"),
                    BloodType::OPos,
                    5.0 + f64::from(i) * 4.0,
                ))
                .unwrap()
        })
        .collect();
    let mut req = request(BloodType::OPos, Urgency::Medium, 1);
    req.state = RequestState::Matching;
    let request_id = store.seed_request(&req);
    for donor_id in &donor_ids[..2] {
        let mut record = MatchRecord::new(request_id, *donor_id, 0, now);
        record.status = MatchStatus::Notified;
        store.seed_match(&record);
    }
    store
        .record_wave(
            request_id,
            &WaveRecord {
                wave: 0,
                radius_km: 50.0,
                dispatched_at: now - TimeDuration::minutes(40),
                deadline: now + TimeDuration::minutes(5),
                candidates: 2,
            },
        )
        .unwrap();

    let engine = MatchingEngine::new(
        Arc::clone(&store) as Arc<dyn DonorStore>,
        Arc::clone(&dispatcher) as Arc<dyn NotificationDispatcher>,
        None,
        EscalationPolicy::default(),
    );
    let resumed = engine.recover().await.unwrap();
    assert_eq!(resumed, 1);

    let view = engine.get_request_status(request_id).await.unwrap();
    assert_eq!(view.state, RequestState::Matching);
    assert_eq!(view.wave_number, 1);

    // The inherited deadline fires and the next wave reaches the two
    // donors the first wave missed.
    tokio::time::sleep(Duration::from_secs(6 * 60)).await;

    let view = engine.get_request_status(request_id).await.unwrap();
    assert_eq!(view.wave_number, 2);
    let notified = dispatcher.notified_donors();
    assert_eq!(notified.len(), 2);
    assert!(notified.contains(&donor_ids[2]));
    assert!(notified.contains(&donor_ids[3]));

    let rows = store.matches_for(request_id);
    assert_eq!(
        rows.iter()
            .filter(|m| m.wave == 0 && m.status == MatchStatus::Expired)
            .count(),
        2
    );
}

#[tokio::test(start_paused = true)]
async fn test_recovery_dispatches_wave_lost_between_rounds() {
    let store = Arc::new(MemoryStore::new());
    let dispatcher = Arc::new(RecordingDispatcher::new());

    store
        .save_donor(&donor_km_north("Donor", BloodType::OPos, 5.0))
        .unwrap();
    let mut req = request(BloodType::OPos, Urgency::Medium, 1);
    req.state = RequestState::Matching;
    let request_id = store.seed_request(&req);

    let engine = MatchingEngine::new(
        Arc::clone(&store) as Arc<dyn DonorStore>,
        Arc::clone(&dispatcher) as Arc<dyn NotificationDispatcher>,
        None,
        EscalationPolicy::default(),
    );
    engine.recover().await.unwrap();

    // No open wave survived, so recovery dispatched one immediately.
    assert_eq!(dispatcher.count(), 1);
    let view = engine.get_request_status(request_id).await.unwrap();
    assert_eq!(view.wave_number, 1);
}
