// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Per-request execution context: the lifecycle controller and the wave
//! state it owns.
//!
//! One `RequestContext` exists per live request. Every transition (donor
//! response, wave deadline, expiry, cancellation) flows through the
//! methods here while the caller holds the context's lock, so concurrent
//! signals on the same request resolve deterministically: the first valid
//! transition wins and later ones collapse to no-ops. The context is the
//! single writer of the request's state.

use crate::engine::EngineDeps;
use crate::error::EngineError;
use crate::selector::{RankedCandidate, select_candidates};
use crate::traits::{DeliveryReceipt, RequestSummary, WaveRecord};
use hemolink_audit::{Action, Actor, AuditEvent, Cause, StateSnapshot};
use hemolink_domain::{
    BloodRequest, MatchRecord, MatchStatus, REASON_NO_LONGER_ELIGIBLE, REASON_REQUEST_RESOLVED,
    RequestState,
};
use std::collections::HashSet;
use time::OffsetDateTime;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// A donor's answer to a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DonorResponse {
    /// The donor will donate.
    Accepted,
    /// The donor declines.
    Declined,
}

/// Acknowledgement returned to the donor-facing caller.
///
/// A response that loses a race (request already satisfied, expired, or
/// cancelled) is acknowledged as `AlreadyResolved` rather than erroring:
/// the donor did nothing wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseAck {
    /// The response was applied (or collapsed with an identical duplicate).
    Recorded,
    /// The request was already resolved; the response was kept for the
    /// record but changed nothing.
    AlreadyResolved,
}

/// Externally visible status of a request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestStatusView {
    /// The request id.
    pub request_id: i64,
    /// Current lifecycle state.
    pub state: RequestState,
    /// Units accepted so far.
    pub accepted_units: u32,
    /// Units requested.
    pub units_needed: u32,
    /// Waves dispatched so far.
    pub wave_number: u32,
    /// When the next deadline (wave or needed-by) falls, if any.
    pub next_deadline: Option<OffsetDateTime>,
}

/// The per-request state owned by the lifecycle controller.
#[derive(Debug)]
pub struct RequestContext {
    /// The request, including its authoritative state.
    pub request: BloodRequest,
    /// The persisted request id.
    pub request_id: i64,
    /// Waves dispatched so far; also the next 0-based wave number.
    pub wave: u32,
    /// Search radius of the most recent selection, in kilometers.
    pub radius_km: f64,
    /// All match rows created for this request.
    pub matches: Vec<MatchRecord>,
    /// Donors notified in this escalation episode; never re-notified.
    notified: HashSet<i64>,
    /// Units accepted so far.
    pub accepted_units: u32,
    /// Monotonic instant of the current wave deadline, if a wave is open.
    wave_deadline: Option<Instant>,
    /// Wall-clock form of the wave deadline, for status and recovery.
    wave_deadline_utc: Option<OffsetDateTime>,
    /// Monotonic instant of the needed-by deadline.
    expires_at: Instant,
    /// Set when selection came up empty with the radius already capped.
    pool_exhausted: bool,
}

/// Maps a wall-clock target to a monotonic instant, relative to `now`.
/// Targets already in the past map to "immediately".
fn instant_at(now: OffsetDateTime, target: OffsetDateTime) -> Instant {
    let delta: time::Duration = target - now;
    if delta.is_positive() {
        Instant::now() + delta.unsigned_abs()
    } else {
        Instant::now()
    }
}

impl RequestContext {
    /// Creates a context for a freshly persisted request.
    ///
    /// # Panics
    ///
    /// Does not panic: callers guarantee `request.request_id` is set; a
    /// missing id is replaced by `request_id`.
    #[must_use]
    pub fn new(request: BloodRequest, request_id: i64, now: OffsetDateTime) -> Self {
        let expires_at: Instant = instant_at(now, request.needed_by);
        Self {
            request,
            request_id,
            wave: 0,
            radius_km: 0.0,
            matches: Vec::new(),
            notified: HashSet::new(),
            accepted_units: 0,
            wave_deadline: None,
            wave_deadline_utc: None,
            expires_at,
            pool_exhausted: false,
        }
    }

    /// Rebuilds a context from persisted state after an engine restart.
    ///
    /// Wave numbering, the notified set, accepted units, and the pending
    /// wave deadline are reconstructed from the match rows and the last
    /// recorded wave, so escalation progress survives the restart.
    #[must_use]
    pub fn recover(
        request: BloodRequest,
        request_id: i64,
        matches: Vec<MatchRecord>,
        last_wave: Option<&WaveRecord>,
        now: OffsetDateTime,
    ) -> Self {
        let notified: HashSet<i64> = matches.iter().map(|m| m.donor_id).collect();
        let accepted_units: u32 = matches
            .iter()
            .filter(|m| m.status == MatchStatus::Accepted)
            .count()
            .try_into()
            .unwrap_or(u32::MAX);
        let wave: u32 = last_wave.map_or(0, |w| w.wave + 1);
        let radius_km: f64 = last_wave.map_or(0.0, |w| w.radius_km);
        let open_wave: bool = !request.state.is_terminal()
            && matches.iter().any(|m| m.status == MatchStatus::Notified);
        let (wave_deadline, wave_deadline_utc) = match last_wave {
            Some(w) if open_wave => (Some(instant_at(now, w.deadline)), Some(w.deadline)),
            _ => (None, None),
        };
        let expires_at: Instant = instant_at(now, request.needed_by);
        Self {
            request,
            request_id,
            wave,
            radius_km,
            matches,
            notified,
            accepted_units,
            wave_deadline,
            wave_deadline_utc,
            expires_at,
            pool_exhausted: false,
        }
    }

    /// Returns the externally visible status of the request.
    #[must_use]
    pub fn status_view(&self) -> RequestStatusView {
        let next_deadline: Option<OffsetDateTime> = if self.request.state.is_terminal() {
            None
        } else {
            Some(
                self.wave_deadline_utc
                    .map_or(self.request.needed_by, |wave_deadline| {
                        wave_deadline.min(self.request.needed_by)
                    }),
            )
        };
        RequestStatusView {
            request_id: self.request_id,
            state: self.request.state,
            accepted_units: self.accepted_units,
            units_needed: self.request.units_needed,
            wave_number: self.wave,
            next_deadline,
        }
    }

    /// Returns whether a wave is currently awaiting responses.
    #[must_use]
    pub const fn wave_open(&self) -> bool {
        self.wave_deadline.is_some()
    }

    /// Returns when the driver should next wake, or `None` when the
    /// request no longer needs one.
    #[must_use]
    pub fn next_wake(&self) -> Option<Instant> {
        if self.request.state.is_terminal() {
            return None;
        }
        Some(
            self.wave_deadline
                .map_or(self.expires_at, |deadline| deadline.min(self.expires_at)),
        )
    }

    /// Handles a timer wake-up: expiry takes precedence over the wave
    /// deadline; a wake that precedes both is a no-op.
    ///
    /// # Errors
    ///
    /// Propagates store errors; the request is recoverable on restart.
    pub fn on_timer(&mut self, deps: &EngineDeps, timer_now: Instant) -> Result<(), EngineError> {
        if self.request.state.is_terminal() {
            return Ok(());
        }
        let now: OffsetDateTime = OffsetDateTime::now_utc();
        if timer_now >= self.expires_at {
            return self.handle_expiry(deps, now);
        }
        if self.wave_deadline.is_some_and(|deadline| timer_now >= deadline) {
            return self.handle_wave_deadline(deps, now);
        }
        Ok(())
    }

    /// Starts matching for a `Created` request and dispatches wave 0.
    ///
    /// # Errors
    ///
    /// Returns an error if the request is not in `Created` or a store
    /// operation fails.
    pub fn begin_matching(
        &mut self,
        deps: &EngineDeps,
        actor: Actor,
        now: OffsetDateTime,
    ) -> Result<(), EngineError> {
        self.apply_transition(
            deps,
            RequestState::Matching,
            actor,
            Cause::new(
                format!("request-{}", self.request_id),
                String::from("Intake accepted"),
            ),
            Action::new(String::from("BeginMatching"), None),
        )?;
        self.dispatch_next_wave(deps, now)
    }

    /// Dispatches the next notification wave.
    ///
    /// Selection widens the radius before dispatching when the pool is
    /// thinner than the policy minimum; a pool that is empty with the
    /// radius capped escalates instead of dispatching an empty wave.
    ///
    /// # Errors
    ///
    /// Propagates store errors. Dispatch failures are absorbed: the wave
    /// deadline alone governs progression.
    pub fn dispatch_next_wave(
        &mut self,
        deps: &EngineDeps,
        now: OffsetDateTime,
    ) -> Result<(), EngineError> {
        if self.wave >= deps.policy.max_waves {
            return self.escalate(deps, now);
        }

        let urgency = self.request.urgency;
        let exclude: Vec<i64> = self.notified.iter().copied().collect();
        // Geometric growth per wave; a thin-pool widening from an earlier
        // round is never undone.
        let mut radius_km: f64 = deps
            .policy
            .radius_for_wave(urgency, self.wave)
            .max(self.radius_km);
        let mut candidates: Vec<RankedCandidate> = select_candidates(
            deps.store.as_ref(),
            &self.request,
            &deps.policy,
            radius_km,
            &exclude,
            deps.policy.wave_size,
            now,
        )?;

        // Thin pool: widen before dispatching rather than sending a short
        // wave. The selector itself never retries.
        while candidates.len() < deps.policy.min_candidates
            && radius_km < deps.policy.max_radius_km
        {
            radius_km = (radius_km * deps.policy.radius_growth).min(deps.policy.max_radius_km);
            debug!(
                request_id = self.request_id,
                radius_km, "Widening search radius for thin candidate pool"
            );
            candidates = select_candidates(
                deps.store.as_ref(),
                &self.request,
                &deps.policy,
                radius_km,
                &exclude,
                deps.policy.wave_size,
                now,
            )?;
        }
        self.radius_km = radius_km;

        if candidates.is_empty() {
            if radius_km >= deps.policy.max_radius_km {
                info!(
                    request_id = self.request_id,
                    "No candidates within capped radius; escalating"
                );
                self.pool_exhausted = true;
                return self.escalate(deps, now);
            }
            // No one new in range this round; keep the wave clock running
            // so the next deadline widens again.
        }

        let wave_index: u32 = self.wave;
        let summary: RequestSummary = RequestSummary::for_request(
            &self.request,
            self.request_id,
            self.request.units_needed.saturating_sub(self.accepted_units),
        );
        let notified_count: u32 = candidates
            .len()
            .try_into()
            .unwrap_or(u32::MAX);

        for candidate in candidates {
            let donor_id: i64 = match candidate.donor.donor_id {
                Some(id) => id,
                None => continue,
            };
            let mut record: MatchRecord =
                MatchRecord::new(self.request_id, donor_id, wave_index, now);
            let match_id: i64 = deps.store.save_match(&record)?;
            record.match_id = Some(match_id);

            let channel = candidate.donor.preferred_channel();
            match channel {
                Some(channel) => {
                    match deps.dispatcher.notify(&candidate.donor, &summary, channel) {
                        Ok(DeliveryReceipt { .. }) => {
                            debug!(
                                request_id = self.request_id,
                                donor_id,
                                %channel,
                                "Notified candidate"
                            );
                        }
                        Err(e) => {
                            // Implicit non-response; the deadline governs.
                            warn!(
                                request_id = self.request_id,
                                donor_id, error = %e, "Notification dispatch failed"
                            );
                        }
                    }
                }
                None => {
                    warn!(
                        request_id = self.request_id,
                        donor_id, "Candidate has no contact channel"
                    );
                }
            }

            record
                .transition(MatchStatus::Notified, None)
                .map_err(EngineError::from)?;
            deps.store
                .update_match_status(match_id, MatchStatus::Notified, None)?;
            self.notified.insert(donor_id);
            self.matches.push(record);
        }

        let deadline_utc: OffsetDateTime = now + deps.policy.wave_deadline(urgency);
        self.wave_deadline = Some(instant_at(now, deadline_utc));
        self.wave_deadline_utc = Some(deadline_utc);
        self.wave = wave_index + 1;

        let wave_record: WaveRecord = WaveRecord {
            wave: wave_index,
            radius_km,
            dispatched_at: now,
            deadline: deadline_utc,
            candidates: notified_count,
        };
        deps.store.record_wave(self.request_id, &wave_record)?;
        self.audit(
            deps,
            Actor::scheduler(),
            Cause::new(
                format!("wave-{wave_index}"),
                String::from("Wave dispatch"),
            ),
            Action::new(
                String::from("DispatchWave"),
                Some(format!(
                    "Wave {wave_index}: notified {notified_count} candidates within {radius_km:.0} km"
                )),
            ),
        )?;
        info!(
            request_id = self.request_id,
            wave = wave_index,
            radius_km,
            candidates = notified_count,
            "Dispatched notification wave"
        );
        Ok(())
    }

    /// Handles the current wave's deadline: expires silent matches, then
    /// either dispatches the next wave or escalates at the ceiling.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn handle_wave_deadline(
        &mut self,
        deps: &EngineDeps,
        now: OffsetDateTime,
    ) -> Result<(), EngineError> {
        if self.request.state.is_terminal() {
            return Ok(());
        }
        self.wave_deadline = None;
        self.wave_deadline_utc = None;
        self.expire_outstanding(deps, &[MatchStatus::Notified])?;

        if self.wave >= deps.policy.max_waves || self.pool_exhausted {
            self.escalate(deps, now)
        } else {
            self.dispatch_next_wave(deps, now)
        }
    }

    /// Expires the request: the needed-by deadline is authoritative over
    /// any wave in progress.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn handle_expiry(
        &mut self,
        deps: &EngineDeps,
        now: OffsetDateTime,
    ) -> Result<(), EngineError> {
        if self.request.state.is_terminal() {
            return Ok(());
        }
        self.wave_deadline = None;
        self.wave_deadline_utc = None;
        self.apply_transition(
            deps,
            RequestState::Expired,
            Actor::scheduler(),
            Cause::new(
                format!("request-{}", self.request_id),
                String::from("Needed-by deadline passed"),
            ),
            Action::new(String::from("ExpireRequest"), None),
        )?;
        self.expire_outstanding(
            deps,
            &[
                MatchStatus::Pending,
                MatchStatus::Notified,
                MatchStatus::Accepted,
            ],
        )?;
        warn!(
            request_id = self.request_id,
            accepted_units = self.accepted_units,
            units_needed = self.request.units_needed,
            "Request expired unfulfilled"
        );
        Ok(())
    }

    /// Records a donor's response.
    ///
    /// Duplicate signals collapse: a second identical response changes
    /// nothing and still acknowledges. An acceptance from a donor who is
    /// no longer eligible converts to a decline with reason
    /// `no_longer_eligible`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if the donor was never notified for this
    /// request, `DonorNotFound` for an unknown donor, or a store error.
    pub fn record_response(
        &mut self,
        deps: &EngineDeps,
        donor_id: i64,
        response: DonorResponse,
        now: OffsetDateTime,
    ) -> Result<ResponseAck, EngineError> {
        if self.request.state.is_terminal() || self.request.state == RequestState::Matched {
            self.annotate_resolved_response(deps, donor_id, response);
            info!(
                request_id = self.request_id,
                donor_id,
                state = %self.request.state,
                "Response after resolution; acknowledged as no-op"
            );
            return Ok(ResponseAck::AlreadyResolved);
        }

        let Some(index) = self
            .matches
            .iter()
            .rposition(|m| m.donor_id == donor_id && m.status == MatchStatus::Notified)
        else {
            return self.handle_unmatched_response(deps, donor_id, response);
        };

        match response {
            DonorResponse::Declined => {
                self.set_match_status(deps, index, MatchStatus::Declined, None, Some(now))?;
                self.audit(
                    deps,
                    Actor::donor(donor_id),
                    Cause::new(
                        format!("donor-{donor_id}"),
                        String::from("Donor declined"),
                    ),
                    Action::new(String::from("RecordResponse"), Some(String::from("declined"))),
                )?;
                Ok(ResponseAck::Recorded)
            }
            DonorResponse::Accepted => {
                let donor = deps
                    .store
                    .get_donor(donor_id)?
                    .ok_or(EngineError::DonorNotFound(donor_id))?;
                if !donor.is_selectable(now, deps.policy.cooldown) {
                    warn!(
                        request_id = self.request_id,
                        donor_id, "Stale acceptance from ineligible donor; declining"
                    );
                    self.set_match_status(
                        deps,
                        index,
                        MatchStatus::Declined,
                        Some(String::from(REASON_NO_LONGER_ELIGIBLE)),
                        Some(now),
                    )?;
                    return Ok(ResponseAck::Recorded);
                }

                self.set_match_status(deps, index, MatchStatus::Accepted, None, Some(now))?;
                self.accepted_units = self.accepted_units.saturating_add(1);
                self.audit(
                    deps,
                    Actor::donor(donor_id),
                    Cause::new(
                        format!("donor-{donor_id}"),
                        String::from("Donor accepted"),
                    ),
                    Action::new(String::from("RecordResponse"), Some(String::from("accepted"))),
                )?;

                if self.accepted_units >= self.request.units_needed {
                    self.complete_from_donors(deps, now)?;
                } else if self.request.state == RequestState::Matching {
                    self.apply_transition(
                        deps,
                        RequestState::Fulfilling,
                        Actor::donor(donor_id),
                        Cause::new(
                            format!("donor-{donor_id}"),
                            String::from("First unit accepted"),
                        ),
                        Action::new(String::from("BeginFulfilling"), None),
                    )?;
                }
                Ok(ResponseAck::Recorded)
            }
        }
    }

    /// Cancels the request from any non-terminal state.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyTerminal` if the request already finished, or a
    /// store error.
    pub fn cancel(
        &mut self,
        deps: &EngineDeps,
        actor: Actor,
        now: OffsetDateTime,
    ) -> Result<(), EngineError> {
        if self.request.state.is_terminal() {
            return Err(EngineError::AlreadyTerminal {
                request_id: self.request_id,
                state: self.request.state,
            });
        }
        self.wave_deadline = None;
        self.wave_deadline_utc = None;
        self.apply_transition(
            deps,
            RequestState::Cancelled,
            actor,
            Cause::new(
                format!("request-{}", self.request_id),
                String::from("External cancellation"),
            ),
            Action::new(String::from("CancelRequest"), None),
        )?;
        self.cancel_outstanding(deps)?;
        info!(request_id = self.request_id, "Request cancelled");
        Ok(())
    }

    /// Escalates the request and consults the inventory fallback.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    fn escalate(&mut self, deps: &EngineDeps, now: OffsetDateTime) -> Result<(), EngineError> {
        self.wave_deadline = None;
        self.wave_deadline_utc = None;
        self.expire_outstanding(deps, &[MatchStatus::Notified])?;
        self.apply_transition(
            deps,
            RequestState::Escalated,
            Actor::scheduler(),
            Cause::new(
                format!("request-{}", self.request_id),
                String::from("Wave ceiling reached with unmet need"),
            ),
            Action::new(
                String::from("EscalateRequest"),
                Some(format!(
                    "{} of {} units accepted after {} waves",
                    self.accepted_units, self.request.units_needed, self.wave
                )),
            ),
        )?;

        let outstanding: u32 = self.request.units_needed.saturating_sub(self.accepted_units);
        let Some(inventory) = deps.inventory.as_ref() else {
            warn!(
                request_id = self.request_id,
                outstanding, "Escalated with no inventory feed configured"
            );
            return Ok(());
        };

        let stock: u32 = inventory.check_stock(self.request.blood_type)?;
        if stock >= outstanding && inventory.reserve_stock(self.request.blood_type, outstanding)? {
            info!(
                request_id = self.request_id,
                outstanding, stock, "Covering outstanding units from blood bank stock"
            );
            self.finalize_accepted_donations(deps, now)?;
            self.apply_transition(
                deps,
                RequestState::Completed,
                Actor::scheduler(),
                Cause::new(
                    format!("request-{}", self.request_id),
                    String::from("Inventory reservation"),
                ),
                Action::new(
                    String::from("CompleteFromStock"),
                    Some(format!("{outstanding} units reserved from stock")),
                ),
            )?;
        } else {
            warn!(
                request_id = self.request_id,
                outstanding, stock, "Escalated; stock cannot cover outstanding units"
            );
        }
        Ok(())
    }

    /// Completes a request whose accepted units cover the need: enters
    /// `Matched`, applies donation side effects, and finishes `Completed`.
    fn complete_from_donors(
        &mut self,
        deps: &EngineDeps,
        now: OffsetDateTime,
    ) -> Result<(), EngineError> {
        self.wave_deadline = None;
        self.wave_deadline_utc = None;
        self.apply_transition(
            deps,
            RequestState::Matched,
            Actor::scheduler(),
            Cause::new(
                format!("request-{}", self.request_id),
                String::from("Accepted units cover the request"),
            ),
            Action::new(String::from("RequestMatched"), None),
        )?;
        self.finalize_accepted_donations(deps, now)?;
        self.expire_outstanding(deps, &[MatchStatus::Pending, MatchStatus::Notified])?;
        self.apply_transition(
            deps,
            RequestState::Completed,
            Actor::scheduler(),
            Cause::new(
                format!("request-{}", self.request_id),
                String::from("Donation side effects applied"),
            ),
            Action::new(
                String::from("CompleteRequest"),
                Some(format!("{} units accepted", self.accepted_units)),
            ),
        )?;
        info!(
            request_id = self.request_id,
            accepted_units = self.accepted_units,
            "Request completed"
        );
        Ok(())
    }

    /// Marks accepted matches completed and applies donor side effects.
    fn finalize_accepted_donations(
        &mut self,
        deps: &EngineDeps,
        now: OffsetDateTime,
    ) -> Result<(), EngineError> {
        let accepted: Vec<usize> = self
            .matches
            .iter()
            .enumerate()
            .filter(|(_, m)| m.status == MatchStatus::Accepted)
            .map(|(i, _)| i)
            .collect();
        for index in accepted {
            let donor_id: i64 = self.matches[index].donor_id;
            deps.store.update_donor_after_donation(donor_id, now)?;
            self.set_match_status(deps, index, MatchStatus::Completed, None, None)?;
        }
        Ok(())
    }

    /// Expires every outstanding match in one of `from` statuses.
    fn expire_outstanding(
        &mut self,
        deps: &EngineDeps,
        from: &[MatchStatus],
    ) -> Result<(), EngineError> {
        let outstanding: Vec<usize> = self
            .matches
            .iter()
            .enumerate()
            .filter(|(_, m)| from.contains(&m.status))
            .map(|(i, _)| i)
            .collect();
        for index in outstanding {
            self.set_match_status(deps, index, MatchStatus::Expired, None, None)?;
        }
        Ok(())
    }

    /// Cancels every outstanding match alongside a cancelled request.
    fn cancel_outstanding(&mut self, deps: &EngineDeps) -> Result<(), EngineError> {
        let outstanding: Vec<usize> = self
            .matches
            .iter()
            .enumerate()
            .filter(|(_, m)| !m.status.is_terminal())
            .map(|(i, _)| i)
            .collect();
        for index in outstanding {
            self.set_match_status(deps, index, MatchStatus::Cancelled, None, None)?;
        }
        Ok(())
    }

    /// A response for which no `Notified` match exists: collapse
    /// duplicates, reject strangers.
    fn handle_unmatched_response(
        &mut self,
        deps: &EngineDeps,
        donor_id: i64,
        response: DonorResponse,
    ) -> Result<ResponseAck, EngineError> {
        if let Some(existing) = self
            .matches
            .iter()
            .rev()
            .find(|m| m.donor_id == donor_id)
        {
            // The donor already responded (or their window closed);
            // duplicate signals collapse to one state change.
            debug!(
                request_id = self.request_id,
                donor_id,
                status = %existing.status,
                response = ?response,
                "Duplicate or late response collapsed to no-op"
            );
            return Ok(ResponseAck::Recorded);
        }
        if deps.store.get_donor(donor_id)?.is_none() {
            return Err(EngineError::DonorNotFound(donor_id));
        }
        Err(EngineError::InvalidState {
            request_id: self.request_id,
            reason: format!("donor {donor_id} was not notified for this request"),
        })
    }

    /// Annotates the donor's match row when a response arrives after the
    /// request resolved; the row's terminal status does not change.
    fn annotate_resolved_response(
        &mut self,
        deps: &EngineDeps,
        donor_id: i64,
        response: DonorResponse,
    ) {
        if response != DonorResponse::Accepted {
            return;
        }
        if let Some(record) = self
            .matches
            .iter_mut()
            .rev()
            .find(|m| m.donor_id == donor_id && m.reason.is_none())
        {
            record.reason = Some(String::from(REASON_REQUEST_RESOLVED));
            if let Some(match_id) = record.match_id {
                if let Err(e) = deps.store.update_match_status(
                    match_id,
                    record.status,
                    Some(REASON_REQUEST_RESOLVED),
                ) {
                    warn!(
                        request_id = self.request_id,
                        donor_id, error = %e, "Failed to annotate late response"
                    );
                }
            }
        }
    }

    /// Applies a validated match status change, persisting before the
    /// in-memory record mutates.
    fn set_match_status(
        &mut self,
        deps: &EngineDeps,
        index: usize,
        status: MatchStatus,
        reason: Option<String>,
        responded_at: Option<OffsetDateTime>,
    ) -> Result<(), EngineError> {
        let record: &MatchRecord = &self.matches[index];
        record
            .status
            .validate_transition(status)
            .map_err(EngineError::from)?;
        if let Some(match_id) = record.match_id {
            deps.store
                .update_match_status(match_id, status, reason.as_deref())?;
        }
        let record: &mut MatchRecord = &mut self.matches[index];
        record.status = status;
        if reason.is_some() {
            record.reason = reason;
        }
        if responded_at.is_some() {
            record.responded_at = responded_at;
        }
        Ok(())
    }

    /// Appends an audit event for an action that did not change the
    /// request's lifecycle state (wave dispatch, a partial response).
    fn audit(
        &self,
        deps: &EngineDeps,
        actor: Actor,
        cause: Cause,
        action: Action,
    ) -> Result<(), EngineError> {
        let snapshot: StateSnapshot =
            StateSnapshot::of_request(&self.request, self.accepted_units, self.wave);
        deps.store.append_audit(&AuditEvent::new(
            actor,
            cause,
            action,
            snapshot.clone(),
            snapshot,
            self.request_id,
        ))?;
        Ok(())
    }

    /// Applies a validated lifecycle transition, persisting the new state
    /// and appending the audit event.
    fn apply_transition(
        &mut self,
        deps: &EngineDeps,
        target: RequestState,
        actor: Actor,
        cause: Cause,
        action: Action,
    ) -> Result<(), EngineError> {
        let before: StateSnapshot =
            StateSnapshot::of_request(&self.request, self.accepted_units, self.wave);
        let next: RequestState = self.request.state.transition_to(target)?;
        deps.store.update_request_status(self.request_id, next)?;
        self.request.state = next;
        let after: StateSnapshot =
            StateSnapshot::of_request(&self.request, self.accepted_units, self.wave);
        deps.store.append_audit(&AuditEvent::new(
            actor,
            cause,
            action,
            before,
            after,
            self.request_id,
        ))?;
        Ok(())
    }
}
