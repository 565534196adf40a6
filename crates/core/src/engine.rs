// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! The engine facade: request registry, public operations, and the
//! per-request driver tasks.
//!
//! Requests are independent; there is no cross-request lock. Each live
//! request gets a slot holding its context behind its own mutex plus a
//! wake signal for its driver task. The driver sleeps until the next
//! pending deadline and re-checks whenever an external operation touches
//! the context.

use crate::context::{DonorResponse, RequestContext, RequestStatusView, ResponseAck};
use crate::error::EngineError;
use crate::traits::{DonorStore, InventoryFeed, NotificationDispatcher, StoreError};
use hemolink_audit::{Action, Actor, AuditEvent, Cause, StateSnapshot};
use hemolink_domain::{
    BloodRequest, BloodType, Donor, EscalationPolicy, RequestState, validate_donor_fields,
    validate_request_fields,
};
use std::collections::HashMap;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::{error, info};

/// The collaborators and policy the engine runs against.
pub struct EngineDeps {
    /// The donor/request/match store.
    pub store: Arc<dyn DonorStore>,
    /// The notification dispatcher.
    pub dispatcher: Arc<dyn NotificationDispatcher>,
    /// Blood bank stock, if a feed is configured.
    pub inventory: Option<Arc<dyn InventoryFeed>>,
    /// The escalation policy.
    pub policy: EscalationPolicy,
}

/// One live request: its context and its driver's wake signal.
struct RequestSlot {
    ctx: Mutex<RequestContext>,
    wake: Notify,
}

/// The Matching & Escalation Engine.
///
/// Holds no durable state of its own: everything needed to resume after a
/// restart lives in the store, and [`MatchingEngine::recover`] rebuilds
/// the in-flight wave timers from it.
pub struct MatchingEngine {
    deps: Arc<EngineDeps>,
    slots: Mutex<HashMap<i64, Arc<RequestSlot>>>,
}

impl MatchingEngine {
    /// Creates an engine over the given collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn DonorStore>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        inventory: Option<Arc<dyn InventoryFeed>>,
        policy: EscalationPolicy,
    ) -> Self {
        Self {
            deps: Arc::new(EngineDeps {
                store,
                dispatcher,
                inventory,
                policy,
            }),
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Submits a new request: validates, persists, starts matching, and
    /// dispatches wave 0.
    ///
    /// # Errors
    ///
    /// Returns a `DomainViolation` for malformed intake data (it never
    /// enters the state machine), or a `Store` error.
    pub async fn submit_request(&self, request: BloodRequest) -> Result<i64, EngineError> {
        validate_request_fields(&request)?;

        let now: OffsetDateTime = OffsetDateTime::now_utc();
        let hospital: String = request.hospital.clone();
        let request_id: i64 = self.deps.store.save_request(&request)?;

        let mut request: BloodRequest = request;
        request.request_id = Some(request_id);

        self.deps.store.append_audit(&AuditEvent::new(
            Actor::new(hospital.clone(), String::from("hospital")),
            Cause::new(
                format!("request-{request_id}"),
                String::from("Intake submission"),
            ),
            Action::new(
                String::from("SubmitRequest"),
                Some(format!(
                    "{} units of {} for {}",
                    request.units_needed, request.blood_type, hospital
                )),
            ),
            StateSnapshot::new(String::from("state=none")),
            StateSnapshot::of_request(&request, 0, 0),
            request_id,
        ))?;

        let mut ctx: RequestContext = RequestContext::new(request, request_id, now);
        ctx.begin_matching(
            &self.deps,
            Actor::new(hospital, String::from("hospital")),
            now,
        )?;

        let slot: Arc<RequestSlot> = Arc::new(RequestSlot {
            ctx: Mutex::new(ctx),
            wake: Notify::new(),
        });
        self.slots.lock().await.insert(request_id, Arc::clone(&slot));
        spawn_driver(Arc::clone(&self.deps), slot);

        info!(request_id, "Request submitted and matching started");
        Ok(request_id)
    }

    /// Records a donor's response to a notification.
    ///
    /// # Errors
    ///
    /// Returns `RequestNotFound` or `DonorNotFound` for unknown ids,
    /// `InvalidState` if the donor was never notified for the request, or
    /// a `Store` error. A response losing a race with resolution is not an
    /// error; it acknowledges as [`ResponseAck::AlreadyResolved`].
    pub async fn record_donor_response(
        &self,
        request_id: i64,
        donor_id: i64,
        response: DonorResponse,
    ) -> Result<ResponseAck, EngineError> {
        let slot: Arc<RequestSlot> = self
            .slot(request_id)
            .await
            .ok_or(EngineError::RequestNotFound(request_id))?;
        let ack: ResponseAck = {
            let mut ctx = slot.ctx.lock().await;
            ctx.record_response(&self.deps, donor_id, response, OffsetDateTime::now_utc())?
        };
        slot.wake.notify_one();
        Ok(ack)
    }

    /// Returns the externally visible status of a request.
    ///
    /// # Errors
    ///
    /// Returns `RequestNotFound` for an unknown id.
    pub async fn get_request_status(
        &self,
        request_id: i64,
    ) -> Result<RequestStatusView, EngineError> {
        let slot: Arc<RequestSlot> = self
            .slot(request_id)
            .await
            .ok_or(EngineError::RequestNotFound(request_id))?;
        let ctx = slot.ctx.lock().await;
        Ok(ctx.status_view())
    }

    /// Cancels a request from any non-terminal state. Safe to apply at any
    /// pending step; in-flight waves can no longer transition the request
    /// afterwards.
    ///
    /// # Errors
    ///
    /// Returns `RequestNotFound` for an unknown id, `AlreadyTerminal` if
    /// the request already finished, or a `Store` error.
    pub async fn cancel_request(&self, request_id: i64, actor: Actor) -> Result<(), EngineError> {
        let slot: Arc<RequestSlot> = self
            .slot(request_id)
            .await
            .ok_or(EngineError::RequestNotFound(request_id))?;
        {
            let mut ctx = slot.ctx.lock().await;
            ctx.cancel(&self.deps, actor, OffsetDateTime::now_utc())?;
        }
        slot.wake.notify_one();
        Ok(())
    }

    /// Registers a new donor.
    ///
    /// # Errors
    ///
    /// Returns a `DomainViolation` for malformed donor data, or a `Store`
    /// error.
    pub fn register_donor(&self, donor: &Donor) -> Result<i64, EngineError> {
        validate_donor_fields(donor)?;
        let donor_id: i64 = self.deps.store.save_donor(donor)?;
        info!(donor_id, blood_type = %donor.blood_type, "Donor registered");
        Ok(donor_id)
    }

    /// Sets a donor's availability flag (self-service update).
    ///
    /// # Errors
    ///
    /// Returns `DonorNotFound` for an unknown id, or a `Store` error.
    pub fn set_donor_availability(
        &self,
        donor_id: i64,
        available: bool,
    ) -> Result<(), EngineError> {
        match self.deps.store.update_donor_availability(donor_id, available) {
            Ok(()) => Ok(()),
            Err(StoreError::RowNotFound(_)) => Err(EngineError::DonorNotFound(donor_id)),
            Err(e) => Err(EngineError::Store(e)),
        }
    }

    /// Fetches a donor by id.
    ///
    /// # Errors
    ///
    /// Returns `DonorNotFound` for an unknown id, or a `Store` error.
    pub fn get_donor(&self, donor_id: i64) -> Result<Donor, EngineError> {
        self.deps
            .store
            .get_donor(donor_id)?
            .ok_or(EngineError::DonorNotFound(donor_id))
    }

    /// Returns the stock level for a blood type, or `None` when no
    /// inventory feed is configured.
    ///
    /// # Errors
    ///
    /// Returns a `Store` error if the feed cannot be queried.
    pub fn check_stock(&self, blood_type: BloodType) -> Result<Option<u32>, EngineError> {
        match self.deps.inventory.as_ref() {
            Some(feed) => Ok(Some(feed.check_stock(blood_type)?)),
            None => Ok(None),
        }
    }

    /// Rebuilds contexts and driver tasks for every non-terminal request
    /// in the store. Requests caught between waves dispatch their next
    /// wave immediately; pending wave deadlines resume where they left
    /// off. Returns the number of requests resumed.
    ///
    /// # Errors
    ///
    /// Returns a `Store` error if the open requests cannot be loaded;
    /// individual resume failures are logged and skipped.
    pub async fn recover(&self) -> Result<usize, EngineError> {
        let open = self.deps.store.load_open_requests()?;
        let now: OffsetDateTime = OffsetDateTime::now_utc();
        let mut resumed: usize = 0;

        for entry in open {
            let Some(request_id) = entry.request.request_id else {
                continue;
            };
            let state: RequestState = entry.request.state;
            let mut ctx: RequestContext = RequestContext::recover(
                entry.request,
                request_id,
                entry.matches,
                entry.last_wave.as_ref(),
                now,
            );

            let result: Result<(), EngineError> = match state {
                RequestState::Created => {
                    ctx.begin_matching(&self.deps, Actor::scheduler(), now)
                }
                RequestState::Matching | RequestState::Fulfilling if !ctx.wave_open() => {
                    ctx.dispatch_next_wave(&self.deps, now)
                }
                _ => Ok(()),
            };
            if let Err(e) = result {
                error!(request_id, error = %e, "Failed to resume request; skipping");
                continue;
            }

            let slot: Arc<RequestSlot> = Arc::new(RequestSlot {
                ctx: Mutex::new(ctx),
                wake: Notify::new(),
            });
            self.slots.lock().await.insert(request_id, Arc::clone(&slot));
            spawn_driver(Arc::clone(&self.deps), slot);
            resumed += 1;
        }

        info!(resumed, "Recovered in-flight requests");
        Ok(resumed)
    }

    async fn slot(&self, request_id: i64) -> Option<Arc<RequestSlot>> {
        self.slots.lock().await.get(&request_id).cloned()
    }
}

/// Spawns the driver task for one request.
fn spawn_driver(deps: Arc<EngineDeps>, slot: Arc<RequestSlot>) {
    tokio::spawn(async move {
        drive(deps, slot).await;
    });
}

/// The per-request timer loop.
///
/// Sleeps until the next pending deadline (wave or needed-by), waking
/// early whenever an external operation changes the context. Exits once
/// the request reaches a terminal state; the slot stays registered so
/// late responses still resolve against it.
async fn drive(deps: Arc<EngineDeps>, slot: Arc<RequestSlot>) {
    loop {
        let wake_at: Option<Instant> = {
            let ctx = slot.ctx.lock().await;
            ctx.next_wake()
        };
        let Some(wake_at) = wake_at else {
            break;
        };

        let notified = slot.wake.notified();
        tokio::pin!(notified);
        tokio::select! {
            () = &mut notified => {}
            () = tokio::time::sleep_until(wake_at) => {
                let mut ctx = slot.ctx.lock().await;
                if let Err(e) = ctx.on_timer(&deps, Instant::now()) {
                    error!(
                        request_id = ctx.request_id,
                        error = %e,
                        "Timer handling failed; driver exiting (recoverable on restart)"
                    );
                    break;
                }
            }
        }
    }
}
