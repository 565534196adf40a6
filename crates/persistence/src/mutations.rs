// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Write-side operations against the SQLite schema.

use crate::data_models::{
    ActionData, ActorData, CauseData, NewAuditEventRow, NewDonorRow, NewMatchRow, NewRequestRow,
    NewWaveRow, format_timestamp,
};
use crate::diesel_schema::{audit_events, donors, inventory, matches, requests};
use crate::diesel_schema::waves as waves_table;
use crate::error::store_error;
use diesel::SqliteConnection;
use diesel::prelude::*;
use hemolink::{StoreError, WaveRecord};
use hemolink_audit::AuditEvent;
use hemolink_domain::{BloodRequest, BloodType, Donor, MatchRecord, MatchStatus, RequestState};
use time::OffsetDateTime;

/// Inserts a donor and returns the assigned id.
pub fn save_donor(conn: &mut SqliteConnection, donor: &Donor) -> Result<i64, StoreError> {
    let row: NewDonorRow = NewDonorRow::from_domain(donor)?;
    diesel::insert_into(donors::table)
        .values(&row)
        .returning(donors::donor_id)
        .get_result(conn)
        .map_err(store_error)
}

/// Sets a donor's availability flag.
pub fn update_donor_availability(
    conn: &mut SqliteConnection,
    donor_id: i64,
    available: bool,
) -> Result<(), StoreError> {
    let affected: usize = diesel::update(donors::table.filter(donors::donor_id.eq(donor_id)))
        .set(donors::available.eq(i32::from(available)))
        .execute(conn)
        .map_err(store_error)?;
    if affected == 0 {
        return Err(StoreError::RowNotFound(format!("donor {donor_id}")));
    }
    Ok(())
}

/// Applies confirmed-donation side effects to a donor row.
pub fn update_donor_after_donation(
    conn: &mut SqliteConnection,
    donor_id: i64,
    donated_at: OffsetDateTime,
) -> Result<(), StoreError> {
    let stamp: String = format_timestamp(donated_at)?;
    let affected: usize = diesel::update(donors::table.filter(donors::donor_id.eq(donor_id)))
        .set((
            donors::available.eq(0),
            donors::last_donation.eq(Some(stamp)),
        ))
        .execute(conn)
        .map_err(store_error)?;
    if affected == 0 {
        return Err(StoreError::RowNotFound(format!("donor {donor_id}")));
    }
    Ok(())
}

/// Inserts a request and returns the assigned id.
pub fn save_request(
    conn: &mut SqliteConnection,
    request: &BloodRequest,
) -> Result<i64, StoreError> {
    let row: NewRequestRow = NewRequestRow::from_domain(request)?;
    diesel::insert_into(requests::table)
        .values(&row)
        .returning(requests::request_id)
        .get_result(conn)
        .map_err(store_error)
}

/// Atomically updates a request's lifecycle state (single-row UPDATE).
pub fn update_request_status(
    conn: &mut SqliteConnection,
    request_id: i64,
    state: RequestState,
) -> Result<(), StoreError> {
    let affected: usize =
        diesel::update(requests::table.filter(requests::request_id.eq(request_id)))
            .set(requests::state.eq(state.as_str()))
            .execute(conn)
            .map_err(store_error)?;
    if affected == 0 {
        return Err(StoreError::RowNotFound(format!("request {request_id}")));
    }
    Ok(())
}

/// Inserts a match row and returns the assigned id.
pub fn save_match(
    conn: &mut SqliteConnection,
    record: &MatchRecord,
) -> Result<i64, StoreError> {
    let row: NewMatchRow = NewMatchRow::from_domain(record)?;
    diesel::insert_into(matches::table)
        .values(&row)
        .returning(matches::match_id)
        .get_result(conn)
        .map_err(store_error)
}

/// Updates a match row's status, stamping the response time for donor
/// answers and keeping any reason annotation.
pub fn update_match_status(
    conn: &mut SqliteConnection,
    match_id: i64,
    status: MatchStatus,
    reason: Option<&str>,
) -> Result<(), StoreError> {
    let responded_at: Option<String> =
        if matches!(status, MatchStatus::Accepted | MatchStatus::Declined) {
            Some(format_timestamp(OffsetDateTime::now_utc())?)
        } else {
            None
        };
    // Response stamp and reason are only ever written, never cleared:
    // a later transition (Accepted -> Completed) must not erase them.
    let target = matches::table.filter(matches::match_id.eq(match_id));
    let affected: usize = match (responded_at, reason) {
        (Some(stamp), Some(reason)) => diesel::update(target)
            .set((
                matches::status.eq(status.as_str()),
                matches::responded_at.eq(stamp),
                matches::reason.eq(reason),
            ))
            .execute(conn),
        (Some(stamp), None) => diesel::update(target)
            .set((
                matches::status.eq(status.as_str()),
                matches::responded_at.eq(stamp),
            ))
            .execute(conn),
        (None, Some(reason)) => diesel::update(target)
            .set((
                matches::status.eq(status.as_str()),
                matches::reason.eq(reason),
            ))
            .execute(conn),
        (None, None) => diesel::update(target)
            .set(matches::status.eq(status.as_str()))
            .execute(conn),
    }
    .map_err(store_error)?;
    if affected == 0 {
        return Err(StoreError::RowNotFound(format!("match {match_id}")));
    }
    Ok(())
}

/// Records wave metadata for restart recovery.
pub fn record_wave(
    conn: &mut SqliteConnection,
    request_id: i64,
    wave: &WaveRecord,
) -> Result<(), StoreError> {
    let row: NewWaveRow = NewWaveRow::from_domain(request_id, wave)?;
    diesel::insert_into(waves_table::table)
        .values(&row)
        .execute(conn)
        .map_err(store_error)?;
    Ok(())
}

/// Appends an immutable audit event.
pub fn append_audit(conn: &mut SqliteConnection, event: &AuditEvent) -> Result<(), StoreError> {
    let actor_json: String = serde_json::to_string(&ActorData {
        id: event.actor.id.clone(),
        actor_type: event.actor.actor_type.clone(),
    })
    .map_err(|e| StoreError::Corrupt(format!("Unencodable actor: {e}")))?;
    let cause_json: String = serde_json::to_string(&CauseData {
        id: event.cause.id.clone(),
        description: event.cause.description.clone(),
    })
    .map_err(|e| StoreError::Corrupt(format!("Unencodable cause: {e}")))?;
    let action_json: String = serde_json::to_string(&ActionData {
        name: event.action.name.clone(),
        details: event.action.details.clone(),
    })
    .map_err(|e| StoreError::Corrupt(format!("Unencodable action: {e}")))?;

    let row: NewAuditEventRow = NewAuditEventRow {
        request_id: event.request_id,
        actor_json,
        cause_json,
        action_json,
        before_snapshot: event.before.data.clone(),
        after_snapshot: event.after.data.clone(),
        created_at: format_timestamp(OffsetDateTime::now_utc())?,
    };
    diesel::insert_into(audit_events::table)
        .values(&row)
        .execute(conn)
        .map_err(store_error)?;
    Ok(())
}

/// Attempts to reserve stock, decrementing only when the full amount is
/// available. The read and the decrement share one transaction.
pub fn reserve_stock(
    conn: &mut SqliteConnection,
    blood_type: BloodType,
    units: u32,
) -> Result<bool, StoreError> {
    let needed: i32 = i32::try_from(units)
        .map_err(|_| StoreError::Corrupt(String::from("Unit count out of range")))?;
    conn.transaction::<bool, diesel::result::Error, _>(|conn| {
        let available: i32 = inventory::table
            .filter(inventory::blood_type.eq(blood_type.as_str()))
            .select(inventory::units)
            .first(conn)
            .optional()?
            .unwrap_or(0);
        if available < needed {
            return Ok(false);
        }
        diesel::update(
            inventory::table.filter(inventory::blood_type.eq(blood_type.as_str())),
        )
        .set(inventory::units.eq(available - needed))
        .execute(conn)?;
        Ok(true)
    })
    .map_err(store_error)
}

/// Sets the stock level for a blood type, creating the row if needed.
pub fn set_stock(
    conn: &mut SqliteConnection,
    blood_type: BloodType,
    units: u32,
) -> Result<(), StoreError> {
    let level: i32 = i32::try_from(units)
        .map_err(|_| StoreError::Corrupt(String::from("Unit count out of range")))?;
    diesel::replace_into(inventory::table)
        .values((
            inventory::blood_type.eq(blood_type.as_str()),
            inventory::units.eq(level),
        ))
        .execute(conn)
        .map_err(store_error)?;
    Ok(())
}
