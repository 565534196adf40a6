// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Row structs and their conversions to and from domain types.
//!
//! Timestamps are stored as RFC 3339 strings; contact channels as a JSON
//! array. Decoding failures surface as `StoreError::Corrupt` rather than
//! panicking.

use crate::diesel_schema::{audit_events, donors, matches, requests, waves};
use diesel::prelude::*;
use hemolink::{StoreError, WaveRecord};
use hemolink_domain::{
    BloodRequest, BloodType, ContactChannel, Donor, Location, MatchRecord, MatchStatus,
    RequestState, Urgency,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Serializable representation of an audit actor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorData {
    pub id: String,
    pub actor_type: String,
}

/// Serializable representation of an audit cause.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CauseData {
    pub id: String,
    pub description: String,
}

/// Serializable representation of an audit action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionData {
    pub name: String,
    pub details: Option<String>,
}

/// Formats a timestamp for storage.
pub fn format_timestamp(value: OffsetDateTime) -> Result<String, StoreError> {
    value
        .format(&Rfc3339)
        .map_err(|e| StoreError::Corrupt(format!("Unformattable timestamp: {e}")))
}

/// Parses a stored timestamp.
pub fn parse_timestamp(value: &str) -> Result<OffsetDateTime, StoreError> {
    OffsetDateTime::parse(value, &Rfc3339)
        .map_err(|e| StoreError::Corrupt(format!("Bad stored timestamp '{value}': {e}")))
}

#[derive(Debug, Clone, Queryable)]
pub struct DonorRow {
    pub donor_id: i64,
    pub name: String,
    pub blood_type: String,
    pub latitude: f64,
    pub longitude: f64,
    pub available: i32,
    pub last_donation: Option<String>,
    pub channels: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = donors)]
pub struct NewDonorRow {
    pub name: String,
    pub blood_type: String,
    pub latitude: f64,
    pub longitude: f64,
    pub available: i32,
    pub last_donation: Option<String>,
    pub channels: String,
}

impl DonorRow {
    /// Decodes the row into a domain donor.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Corrupt` if any column fails to decode.
    pub fn into_domain(self) -> Result<Donor, StoreError> {
        let blood_type: BloodType = BloodType::parse(&self.blood_type)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let location: Location = Location::new(self.latitude, self.longitude)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let last_donation: Option<OffsetDateTime> = self
            .last_donation
            .as_deref()
            .map(parse_timestamp)
            .transpose()?;
        let channels: Vec<ContactChannel> = serde_json::from_str(&self.channels)
            .map_err(|e| StoreError::Corrupt(format!("Bad channel list: {e}")))?;
        Ok(Donor::with_id(
            self.donor_id,
            self.name,
            blood_type,
            location,
            self.available != 0,
            last_donation,
            channels,
        ))
    }
}

impl NewDonorRow {
    /// Encodes a domain donor for insertion.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Corrupt` if a field fails to encode.
    pub fn from_domain(donor: &Donor) -> Result<Self, StoreError> {
        Ok(Self {
            name: donor.name.clone(),
            blood_type: donor.blood_type.as_str().to_string(),
            latitude: donor.location.latitude(),
            longitude: donor.location.longitude(),
            available: i32::from(donor.available),
            last_donation: donor.last_donation.map(format_timestamp).transpose()?,
            channels: serde_json::to_string(&donor.channels)
                .map_err(|e| StoreError::Corrupt(format!("Unencodable channel list: {e}")))?,
        })
    }
}

#[derive(Debug, Clone, Queryable)]
pub struct RequestRow {
    pub request_id: i64,
    pub hospital: String,
    pub blood_type: String,
    pub urgency: String,
    pub latitude: f64,
    pub longitude: f64,
    pub units_needed: i32,
    pub created_at: String,
    pub needed_by: String,
    pub state: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = requests)]
pub struct NewRequestRow {
    pub hospital: String,
    pub blood_type: String,
    pub urgency: String,
    pub latitude: f64,
    pub longitude: f64,
    pub units_needed: i32,
    pub created_at: String,
    pub needed_by: String,
    pub state: String,
}

impl RequestRow {
    /// Decodes the row into a domain request.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Corrupt` if any column fails to decode.
    pub fn into_domain(self) -> Result<BloodRequest, StoreError> {
        let blood_type: BloodType = BloodType::parse(&self.blood_type)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let urgency: Urgency =
            Urgency::parse(&self.urgency).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let location: Location = Location::new(self.latitude, self.longitude)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let state: RequestState =
            RequestState::parse(&self.state).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let units_needed: u32 = u32::try_from(self.units_needed)
            .map_err(|_| StoreError::Corrupt(format!("Bad unit count {}", self.units_needed)))?;
        Ok(BloodRequest::with_id(
            self.request_id,
            self.hospital,
            blood_type,
            urgency,
            location,
            units_needed,
            parse_timestamp(&self.created_at)?,
            parse_timestamp(&self.needed_by)?,
            state,
        ))
    }
}

impl NewRequestRow {
    /// Encodes a domain request for insertion.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Corrupt` if a timestamp fails to encode.
    pub fn from_domain(request: &BloodRequest) -> Result<Self, StoreError> {
        Ok(Self {
            hospital: request.hospital.clone(),
            blood_type: request.blood_type.as_str().to_string(),
            urgency: request.urgency.as_str().to_string(),
            latitude: request.location.latitude(),
            longitude: request.location.longitude(),
            units_needed: i32::try_from(request.units_needed)
                .map_err(|_| StoreError::Corrupt(String::from("Unit count out of range")))?,
            created_at: format_timestamp(request.created_at)?,
            needed_by: format_timestamp(request.needed_by)?,
            state: request.state.as_str().to_string(),
        })
    }
}

#[derive(Debug, Clone, Queryable)]
pub struct MatchRow {
    pub match_id: i64,
    pub request_id: i64,
    pub donor_id: i64,
    pub wave: i32,
    pub status: String,
    pub offered_at: String,
    pub responded_at: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = matches)]
pub struct NewMatchRow {
    pub request_id: i64,
    pub donor_id: i64,
    pub wave: i32,
    pub status: String,
    pub offered_at: String,
    pub responded_at: Option<String>,
    pub reason: Option<String>,
}

impl MatchRow {
    /// Decodes the row into a domain match record.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Corrupt` if any column fails to decode.
    pub fn into_domain(self) -> Result<MatchRecord, StoreError> {
        let status: MatchStatus = self
            .status
            .parse()
            .map_err(|e: hemolink_domain::DomainError| StoreError::Corrupt(e.to_string()))?;
        let wave: u32 = u32::try_from(self.wave)
            .map_err(|_| StoreError::Corrupt(format!("Bad wave number {}", self.wave)))?;
        Ok(MatchRecord {
            match_id: Some(self.match_id),
            request_id: self.request_id,
            donor_id: self.donor_id,
            wave,
            status,
            offered_at: parse_timestamp(&self.offered_at)?,
            responded_at: self
                .responded_at
                .as_deref()
                .map(parse_timestamp)
                .transpose()?,
            reason: self.reason,
        })
    }
}

impl NewMatchRow {
    /// Encodes a domain match record for insertion.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Corrupt` if a field fails to encode.
    pub fn from_domain(record: &MatchRecord) -> Result<Self, StoreError> {
        Ok(Self {
            request_id: record.request_id,
            donor_id: record.donor_id,
            wave: i32::try_from(record.wave)
                .map_err(|_| StoreError::Corrupt(String::from("Wave number out of range")))?,
            status: record.status.as_str().to_string(),
            offered_at: format_timestamp(record.offered_at)?,
            responded_at: record.responded_at.map(format_timestamp).transpose()?,
            reason: record.reason.clone(),
        })
    }
}

#[derive(Debug, Clone, Queryable)]
pub struct WaveRow {
    pub wave: i32,
    pub radius_km: f64,
    pub dispatched_at: String,
    pub deadline: String,
    pub candidates: i32,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = waves)]
pub struct NewWaveRow {
    pub request_id: i64,
    pub wave: i32,
    pub radius_km: f64,
    pub dispatched_at: String,
    pub deadline: String,
    pub candidates: i32,
}

impl WaveRow {
    /// Decodes the row into engine wave metadata.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Corrupt` if any column fails to decode.
    pub fn into_domain(self) -> Result<WaveRecord, StoreError> {
        Ok(WaveRecord {
            wave: u32::try_from(self.wave)
                .map_err(|_| StoreError::Corrupt(format!("Bad wave number {}", self.wave)))?,
            radius_km: self.radius_km,
            dispatched_at: parse_timestamp(&self.dispatched_at)?,
            deadline: parse_timestamp(&self.deadline)?,
            candidates: u32::try_from(self.candidates).unwrap_or(0),
        })
    }
}

impl NewWaveRow {
    /// Encodes wave metadata for insertion.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Corrupt` if a field fails to encode.
    pub fn from_domain(request_id: i64, record: &WaveRecord) -> Result<Self, StoreError> {
        Ok(Self {
            request_id,
            wave: i32::try_from(record.wave)
                .map_err(|_| StoreError::Corrupt(String::from("Wave number out of range")))?,
            radius_km: record.radius_km,
            dispatched_at: format_timestamp(record.dispatched_at)?,
            deadline: format_timestamp(record.deadline)?,
            candidates: i32::try_from(record.candidates).unwrap_or(i32::MAX),
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = audit_events)]
pub struct NewAuditEventRow {
    pub request_id: i64,
    pub actor_json: String,
    pub cause_json: String,
    pub action_json: String,
    pub before_snapshot: String,
    pub after_snapshot: String,
    pub created_at: String,
}
