// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Candidate selection: filtering and ranking donors for one wave.
//!
//! The selector applies the eligibility pipeline in a fixed order and
//! ranks survivors by proximity, rewarding donors who have been eligible
//! but idle the longest. It never retries; widening the radius is the
//! escalation driver's decision.

use crate::traits::{DonorStore, StoreError};
use hemolink_domain::{BloodRequest, Donor, EscalationPolicy};
use std::cmp::Ordering;
use time::OffsetDateTime;

/// A donor that survived the filter pipeline, with the distance used for
/// ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedCandidate {
    /// The donor.
    pub donor: Donor,
    /// Distance from the request location in kilometers.
    pub distance_km: f64,
}

/// Selects and ranks candidates for a request.
///
/// The filter pipeline, applied in order: availability flag, medical
/// cooldown, blood group compatibility, radius. Survivors are sorted by
/// ascending distance; ties break toward the donor whose last donation is
/// older (never-donated ranks earliest). At most `max_candidates` are
/// returned.
///
/// An empty result is a valid, expected outcome that drives escalation;
/// it is not an error.
///
/// # Errors
///
/// Returns a `StoreError` only if the donor store cannot be queried.
pub fn select_candidates(
    store: &dyn DonorStore,
    request: &BloodRequest,
    policy: &EscalationPolicy,
    radius_km: f64,
    exclude: &[i64],
    max_candidates: usize,
    now: OffsetDateTime,
) -> Result<Vec<RankedCandidate>, StoreError> {
    let pool: Vec<Donor> = store.find_compatible_donors(request, radius_km, exclude)?;

    let mut candidates: Vec<RankedCandidate> = pool
        .into_iter()
        .filter(|donor| donor.available)
        .filter(|donor| donor.cooldown_elapsed(now, policy.cooldown))
        .filter(|donor| donor.blood_type.can_donate_to(request.blood_type))
        .filter_map(|donor| {
            let distance_km: f64 = donor.location.distance_km(&request.location);
            (distance_km <= radius_km).then_some(RankedCandidate { donor, distance_km })
        })
        .collect();

    candidates.sort_by(compare_candidates);
    candidates.truncate(max_candidates);
    Ok(candidates)
}

/// Ascending distance, then longest-idle-first.
fn compare_candidates(a: &RankedCandidate, b: &RankedCandidate) -> Ordering {
    a.distance_km
        .total_cmp(&b.distance_km)
        .then_with(|| match (a.donor.last_donation, b.donor.last_donation) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(a_last), Some(b_last)) => a_last.cmp(&b_last),
        })
        .then_with(|| a.donor.donor_id.cmp(&b.donor.donor_id))
}
