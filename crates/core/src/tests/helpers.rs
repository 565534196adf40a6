// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Canned entities and in-memory collaborator implementations for engine
//! tests.

use crate::engine::EngineDeps;
use crate::traits::{
    DeliveryReceipt, DispatchError, DonorStore, InventoryFeed, NotificationDispatcher,
    OpenRequest, RequestSummary, StoreError, WaveRecord,
};
use hemolink_audit::AuditEvent;
use hemolink_domain::{
    BloodRequest, BloodType, ContactChannel, Donor, EscalationPolicy, Location, MatchRecord,
    MatchStatus, RequestState, Urgency,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use time::{Duration, OffsetDateTime};

/// The hospital location all test requests use.
pub fn hospital_location() -> Location {
    Location::new(35.0844, -106.6504).unwrap()
}

/// A donor location roughly `km` kilometers north of the hospital.
/// One degree of latitude is about 111 km.
pub fn location_km_north(km: f64) -> Location {
    Location::new(35.0844 + km / 111.0, -106.6504).unwrap()
}

/// A donor at the given distance with sensible defaults.
pub fn donor_km_north(name: &str, blood_type: BloodType, km: f64) -> Donor {
    Donor::new(
        String::from(name),
        blood_type,
        location_km_north(km),
        vec![ContactChannel::Sms],
    )
}

/// A request for the given blood type and urgency, needed six hours out.
pub fn request(blood_type: BloodType, urgency: Urgency, units: u32) -> BloodRequest {
    let now: OffsetDateTime = OffsetDateTime::now_utc();
    BloodRequest::new(
        String::from("University Hospital"),
        blood_type,
        urgency,
        hospital_location(),
        units,
        now,
        now + Duration::hours(6),
    )
}

struct MemoryInner {
    donors: HashMap<i64, Donor>,
    requests: HashMap<i64, BloodRequest>,
    matches: HashMap<i64, MatchRecord>,
    waves: HashMap<i64, Vec<WaveRecord>>,
    audits: Vec<AuditEvent>,
    next_id: i64,
}

/// An in-memory store. Deliberately does no pre-filtering in
/// `find_compatible_donors` beyond the exclusion list, so the selector's
/// own pipeline is what the tests exercise.
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MemoryInner {
                donors: HashMap::new(),
                requests: HashMap::new(),
                matches: HashMap::new(),
                waves: HashMap::new(),
                audits: Vec::new(),
                next_id: 0,
            }),
        }
    }

    pub fn donor(&self, donor_id: i64) -> Donor {
        self.inner.lock().unwrap().donors[&donor_id].clone()
    }

    pub fn request_state(&self, request_id: i64) -> RequestState {
        self.inner.lock().unwrap().requests[&request_id].state
    }

    pub fn matches_for(&self, request_id: i64) -> Vec<MatchRecord> {
        let inner = self.inner.lock().unwrap();
        let mut rows: Vec<MatchRecord> = inner
            .matches
            .values()
            .filter(|m| m.request_id == request_id)
            .cloned()
            .collect();
        rows.sort_by_key(|m| m.match_id);
        rows
    }

    pub fn waves_for(&self, request_id: i64) -> Vec<WaveRecord> {
        self.inner
            .lock()
            .unwrap()
            .waves
            .get(&request_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn audit_actions(&self, request_id: i64) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .audits
            .iter()
            .filter(|e| e.request_id == request_id)
            .map(|e| e.action.name.clone())
            .collect()
    }

    /// Seeds a request row directly, for recovery tests.
    pub fn seed_request(&self, request: &BloodRequest) -> i64 {
        self.save_request(request).unwrap()
    }

    /// Seeds a match row directly, for recovery tests.
    pub fn seed_match(&self, record: &MatchRecord) -> i64 {
        let id = self.save_match(record).unwrap();
        self.update_match_status(id, record.status, record.reason.as_deref())
            .ok();
        id
    }
}

impl DonorStore for MemoryStore {
    fn find_compatible_donors(
        &self,
        _request: &BloodRequest,
        _radius_km: f64,
        exclude: &[i64],
    ) -> Result<Vec<Donor>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .donors
            .iter()
            .filter(|(id, _)| !exclude.contains(id))
            .map(|(_, d)| d.clone())
            .collect())
    }

    fn get_donor(&self, donor_id: i64) -> Result<Option<Donor>, StoreError> {
        Ok(self.inner.lock().unwrap().donors.get(&donor_id).cloned())
    }

    fn save_donor(&self, donor: &Donor) -> Result<i64, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        let id = inner.next_id;
        let mut donor = donor.clone();
        donor.donor_id = Some(id);
        inner.donors.insert(id, donor);
        Ok(id)
    }

    fn update_donor_availability(
        &self,
        donor_id: i64,
        available: bool,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let donor = inner
            .donors
            .get_mut(&donor_id)
            .ok_or_else(|| StoreError::RowNotFound(format!("donor {donor_id}")))?;
        donor.available = available;
        Ok(())
    }

    fn update_donor_after_donation(
        &self,
        donor_id: i64,
        donated_at: OffsetDateTime,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let donor = inner
            .donors
            .get_mut(&donor_id)
            .ok_or_else(|| StoreError::RowNotFound(format!("donor {donor_id}")))?;
        donor.available = false;
        donor.last_donation = Some(donated_at);
        Ok(())
    }

    fn save_request(&self, request: &BloodRequest) -> Result<i64, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        let id = inner.next_id;
        let mut request = request.clone();
        request.request_id = Some(id);
        inner.requests.insert(id, request);
        Ok(id)
    }

    fn update_request_status(
        &self,
        request_id: i64,
        state: RequestState,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let request = inner
            .requests
            .get_mut(&request_id)
            .ok_or_else(|| StoreError::RowNotFound(format!("request {request_id}")))?;
        request.state = state;
        Ok(())
    }

    fn save_match(&self, record: &MatchRecord) -> Result<i64, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        let id = inner.next_id;
        let mut record = record.clone();
        record.match_id = Some(id);
        inner.matches.insert(id, record);
        Ok(id)
    }

    fn update_match_status(
        &self,
        match_id: i64,
        status: MatchStatus,
        reason: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let record = inner
            .matches
            .get_mut(&match_id)
            .ok_or_else(|| StoreError::RowNotFound(format!("match {match_id}")))?;
        record.status = status;
        if let Some(reason) = reason {
            record.reason = Some(String::from(reason));
        }
        Ok(())
    }

    fn record_wave(&self, request_id: i64, wave: &WaveRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.waves.entry(request_id).or_default().push(wave.clone());
        Ok(())
    }

    fn load_open_requests(&self) -> Result<Vec<OpenRequest>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut open: Vec<OpenRequest> = Vec::new();
        for request in inner.requests.values() {
            if request.state.is_terminal() {
                continue;
            }
            let Some(request_id) = request.request_id else {
                continue;
            };
            let mut matches: Vec<MatchRecord> = inner
                .matches
                .values()
                .filter(|m| m.request_id == request_id)
                .cloned()
                .collect();
            matches.sort_by_key(|m| m.match_id);
            let last_wave: Option<WaveRecord> = inner
                .waves
                .get(&request_id)
                .and_then(|waves| waves.last().cloned());
            open.push(OpenRequest {
                request: request.clone(),
                matches,
                last_wave,
            });
        }
        open.sort_by_key(|o| o.request.request_id);
        Ok(open)
    }

    fn append_audit(&self, event: &AuditEvent) -> Result<(), StoreError> {
        self.inner.lock().unwrap().audits.push(event.clone());
        Ok(())
    }
}

/// A dispatcher that records every notification and can be made to fail.
pub struct RecordingDispatcher {
    notifications: Mutex<Vec<(i64, i64)>>,
    failing: AtomicBool,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self {
            notifications: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Donor ids notified, in dispatch order.
    pub fn notified_donors(&self) -> Vec<i64> {
        self.notifications
            .lock()
            .unwrap()
            .iter()
            .map(|(donor_id, _)| *donor_id)
            .collect()
    }

    pub fn count(&self) -> usize {
        self.notifications.lock().unwrap().len()
    }
}

impl NotificationDispatcher for RecordingDispatcher {
    fn notify(
        &self,
        donor: &Donor,
        summary: &RequestSummary,
        channel: ContactChannel,
    ) -> Result<DeliveryReceipt, DispatchError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DispatchError::ChannelUnavailable {
                channel,
                message: String::from("test channel down"),
            });
        }
        let donor_id = donor.donor_id.unwrap_or(-1);
        self.notifications
            .lock()
            .unwrap()
            .push((donor_id, summary.request_id));
        Ok(DeliveryReceipt {
            donor_id,
            channel,
            dispatched_at: OffsetDateTime::now_utc(),
        })
    }
}

/// An in-memory blood bank stock feed.
pub struct MemoryInventory {
    stock: Mutex<HashMap<BloodType, u32>>,
}

impl MemoryInventory {
    pub fn new() -> Self {
        Self {
            stock: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_stock(blood_type: BloodType, units: u32) -> Self {
        let feed = Self::new();
        feed.stock.lock().unwrap().insert(blood_type, units);
        feed
    }

    pub fn stock_of(&self, blood_type: BloodType) -> u32 {
        *self.stock.lock().unwrap().get(&blood_type).unwrap_or(&0)
    }
}

impl InventoryFeed for MemoryInventory {
    fn check_stock(&self, blood_type: BloodType) -> Result<u32, StoreError> {
        Ok(*self.stock.lock().unwrap().get(&blood_type).unwrap_or(&0))
    }

    fn reserve_stock(&self, blood_type: BloodType, units: u32) -> Result<bool, StoreError> {
        let mut stock = self.stock.lock().unwrap();
        let available = stock.entry(blood_type).or_insert(0);
        if *available >= units {
            *available -= units;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

/// Engine dependencies over fresh in-memory collaborators.
pub struct TestHarness {
    pub store: Arc<MemoryStore>,
    pub dispatcher: Arc<RecordingDispatcher>,
    pub deps: EngineDeps,
}

pub fn harness(policy: EscalationPolicy) -> TestHarness {
    harness_with_inventory(policy, None)
}

pub fn harness_with_inventory(
    policy: EscalationPolicy,
    inventory: Option<Arc<MemoryInventory>>,
) -> TestHarness {
    let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
    let dispatcher: Arc<RecordingDispatcher> = Arc::new(RecordingDispatcher::new());
    let deps: EngineDeps = EngineDeps {
        store: Arc::clone(&store) as Arc<dyn DonorStore>,
        dispatcher: Arc::clone(&dispatcher) as Arc<dyn NotificationDispatcher>,
        inventory: inventory.map(|feed| feed as Arc<dyn InventoryFeed>),
        policy,
    };
    TestHarness {
        store,
        dispatcher,
        deps,
    }
}
