// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Read-side operations against the SQLite schema.

use crate::data_models::{DonorRow, MatchRow, RequestRow, WaveRow};
use crate::diesel_schema::{audit_events, donors, inventory, matches, requests, waves};
use crate::error::store_error;
use diesel::SqliteConnection;
use diesel::prelude::*;
use hemolink::{OpenRequest, StoreError, WaveRecord};
use hemolink_domain::{BloodRequest, BloodType, Donor, MatchRecord, RequestState};

/// States that keep a request out of `load_open_requests`.
fn terminal_states() -> Vec<String> {
    [
        RequestState::Completed,
        RequestState::Expired,
        RequestState::Cancelled,
    ]
    .iter()
    .map(|state| state.as_str().to_string())
    .collect()
}

/// Available donors whose blood group can serve the request, within the
/// radius. Availability and compatibility are pre-filtered in SQL; the
/// radius is applied here after decoding, and the engine's selector
/// re-applies the full eligibility pipeline regardless.
pub fn find_compatible_donors(
    conn: &mut SqliteConnection,
    request: &BloodRequest,
    radius_km: f64,
    exclude: &[i64],
) -> Result<Vec<Donor>, StoreError> {
    let donor_types: Vec<String> = BloodType::ALL
        .iter()
        .filter(|donor_type| donor_type.can_donate_to(request.blood_type))
        .map(|donor_type| donor_type.as_str().to_string())
        .collect();

    let rows: Vec<DonorRow> = donors::table
        .filter(donors::available.eq(1))
        .filter(donors::blood_type.eq_any(donor_types))
        .filter(diesel::dsl::not(donors::donor_id.eq_any(exclude.to_vec())))
        .order(donors::donor_id.asc())
        .load(conn)
        .map_err(store_error)?;

    let mut found: Vec<Donor> = Vec::with_capacity(rows.len());
    for row in rows {
        let donor: Donor = row.into_domain()?;
        if donor.location.distance_km(&request.location) <= radius_km {
            found.push(donor);
        }
    }
    Ok(found)
}

/// Fetches a donor by id.
pub fn get_donor(
    conn: &mut SqliteConnection,
    donor_id: i64,
) -> Result<Option<Donor>, StoreError> {
    let row: Option<DonorRow> = donors::table
        .filter(donors::donor_id.eq(donor_id))
        .first(conn)
        .optional()
        .map_err(store_error)?;
    row.map(DonorRow::into_domain).transpose()
}

/// Every non-terminal request with its matches and most recent wave.
pub fn load_open_requests(conn: &mut SqliteConnection) -> Result<Vec<OpenRequest>, StoreError> {
    let request_rows: Vec<RequestRow> = requests::table
        .filter(requests::state.ne_all(terminal_states()))
        .order(requests::request_id.asc())
        .load(conn)
        .map_err(store_error)?;

    let mut open: Vec<OpenRequest> = Vec::with_capacity(request_rows.len());
    for request_row in request_rows {
        let request_id: i64 = request_row.request_id;
        let request: BloodRequest = request_row.into_domain()?;

        let match_rows: Vec<MatchRow> = matches::table
            .filter(matches::request_id.eq(request_id))
            .order(matches::match_id.asc())
            .load(conn)
            .map_err(store_error)?;
        let mut match_records: Vec<MatchRecord> = Vec::with_capacity(match_rows.len());
        for match_row in match_rows {
            match_records.push(match_row.into_domain()?);
        }

        let last_wave: Option<WaveRecord> = waves::table
            .filter(waves::request_id.eq(request_id))
            .order(waves::wave.desc())
            .select((
                waves::wave,
                waves::radius_km,
                waves::dispatched_at,
                waves::deadline,
                waves::candidates,
            ))
            .first::<WaveRow>(conn)
            .optional()
            .map_err(store_error)?
            .map(WaveRow::into_domain)
            .transpose()?;

        open.push(OpenRequest {
            request,
            matches: match_records,
            last_wave,
        });
    }
    Ok(open)
}

/// Units of a blood type currently in stock. Absent rows read as zero.
pub fn check_stock(
    conn: &mut SqliteConnection,
    blood_type: BloodType,
) -> Result<u32, StoreError> {
    let units: Option<i32> = inventory::table
        .filter(inventory::blood_type.eq(blood_type.as_str()))
        .select(inventory::units)
        .first(conn)
        .optional()
        .map_err(store_error)?;
    Ok(units.map_or(0, |u| u32::try_from(u).unwrap_or(0)))
}

/// Number of audit events recorded for a request.
pub fn count_audit_events(
    conn: &mut SqliteConnection,
    request_id: i64,
) -> Result<i64, StoreError> {
    audit_events::table
        .filter(audit_events::request_id.eq(request_id))
        .count()
        .get_result(conn)
        .map_err(store_error)
}
