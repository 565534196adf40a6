// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Escalation policy: the knobs that govern wave progression.
//!
//! The policy is plain validated data. The engine reads it; nothing here
//! schedules anything.

use crate::error::DomainError;
use crate::request::Urgency;
use serde::{Deserialize, Serialize};
use time::Duration;

/// Configuration for candidate search and wave escalation.
///
/// Radii are in kilometers. Wave deadlines are tied to urgency: the more
/// urgent the request, the shorter the window donors get to respond before
/// the pool widens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationPolicy {
    /// Candidates notified per wave.
    pub wave_size: usize,
    /// Number of waves before the request escalates.
    pub max_waves: u32,
    /// Minimum candidates sought in a wave; a thinner pool widens the
    /// radius immediately rather than dispatching a short wave.
    pub min_candidates: usize,
    /// Search radius growth factor applied on each widening.
    pub radius_growth: f64,
    /// Hard cap on the search radius in kilometers.
    pub max_radius_km: f64,
    /// Medical cooldown a donor must observe between donations.
    pub cooldown: Duration,
    /// Per-wave response deadline for critical requests.
    pub critical_wave_deadline: Duration,
    /// Per-wave response deadline for high-urgency requests.
    pub high_wave_deadline: Duration,
    /// Per-wave response deadline for medium-urgency requests.
    pub medium_wave_deadline: Duration,
    /// Per-wave response deadline for low-urgency requests.
    pub low_wave_deadline: Duration,
}

impl EscalationPolicy {
    /// Creates a policy after validating its parameters.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidPolicy` if any count is zero, the
    /// growth factor shrinks the radius, the radius cap is not positive,
    /// or any duration is not positive.
    pub fn new(policy: Self) -> Result<Self, DomainError> {
        if policy.wave_size == 0 {
            return Err(DomainError::InvalidPolicy(String::from(
                "wave_size must be greater than 0",
            )));
        }
        if policy.max_waves == 0 {
            return Err(DomainError::InvalidPolicy(String::from(
                "max_waves must be greater than 0",
            )));
        }
        if policy.radius_growth < 1.0 || !policy.radius_growth.is_finite() {
            return Err(DomainError::InvalidPolicy(String::from(
                "radius_growth must be at least 1.0",
            )));
        }
        if policy.max_radius_km <= 0.0 || !policy.max_radius_km.is_finite() {
            return Err(DomainError::InvalidPolicy(String::from(
                "max_radius_km must be positive",
            )));
        }
        for (name, duration) in [
            ("cooldown", policy.cooldown),
            ("critical_wave_deadline", policy.critical_wave_deadline),
            ("high_wave_deadline", policy.high_wave_deadline),
            ("medium_wave_deadline", policy.medium_wave_deadline),
            ("low_wave_deadline", policy.low_wave_deadline),
        ] {
            if !duration.is_positive() {
                return Err(DomainError::InvalidPolicy(format!(
                    "{name} must be positive"
                )));
            }
        }
        Ok(policy)
    }

    /// Returns the initial search radius in kilometers for an urgency
    /// level, capped at the policy maximum.
    #[must_use]
    pub fn base_radius_km(&self, urgency: Urgency) -> f64 {
        let base: f64 = match urgency {
            Urgency::Low | Urgency::Medium => 50.0,
            Urgency::High => 100.0,
            Urgency::Critical => 200.0,
        };
        base.min(self.max_radius_km)
    }

    /// Returns the search radius for wave `wave` (0-based), growing from
    /// the urgency base radius and capped at the policy maximum.
    #[must_use]
    pub fn radius_for_wave(&self, urgency: Urgency, wave: u32) -> f64 {
        let exponent: i32 = i32::try_from(wave.min(64)).unwrap_or(64);
        let grown: f64 = self.base_radius_km(urgency) * self.radius_growth.powi(exponent);
        grown.min(self.max_radius_km)
    }

    /// Returns the per-wave response deadline for an urgency level.
    #[must_use]
    pub const fn wave_deadline(&self, urgency: Urgency) -> Duration {
        match urgency {
            Urgency::Critical => self.critical_wave_deadline,
            Urgency::High => self.high_wave_deadline,
            Urgency::Medium => self.medium_wave_deadline,
            Urgency::Low => self.low_wave_deadline,
        }
    }

    /// Returns whether the radius for `wave` has already hit the cap.
    #[must_use]
    pub fn radius_capped(&self, urgency: Urgency, wave: u32) -> bool {
        self.radius_for_wave(urgency, wave) >= self.max_radius_km
    }
}

impl Default for EscalationPolicy {
    /// The shipped defaults: five donors per wave, four waves, radius
    /// growth of 1.5 capped at 250 km, a 56-day cooldown, and per-wave
    /// deadlines of 15/30/45/60 minutes from critical down to low.
    fn default() -> Self {
        Self {
            wave_size: 5,
            max_waves: 4,
            min_candidates: 3,
            radius_growth: 1.5,
            max_radius_km: 250.0,
            cooldown: Duration::days(56),
            critical_wave_deadline: Duration::minutes(15),
            high_wave_deadline: Duration::minutes(30),
            medium_wave_deadline: Duration::minutes(45),
            low_wave_deadline: Duration::minutes(60),
        }
    }
}
