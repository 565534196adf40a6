// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! CSV import for bulk donor registration.
//!
//! Each row is validated independently: a bad row is reported with its
//! errors and the rest of the batch still imports. Only a CSV that cannot
//! be parsed at all (missing headers, unreadable structure) rejects the
//! whole upload.

use csv::StringRecord;
use hemolink::MatchingEngine;
use hemolink_domain::{BloodType, ContactChannel, Donor, Location};
use std::collections::HashMap;
use tracing::info;

use crate::error::ApiError;

/// A single row result from a donor roster import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRowResult {
    /// The row number (1-based, excluding header).
    pub row_number: usize,
    /// The donor's name, if parsed.
    pub name: Option<String>,
    /// The assigned donor id when the row imported.
    pub donor_id: Option<i64>,
    /// The row status.
    pub status: ImportRowStatus,
    /// Zero or more validation errors.
    pub errors: Vec<String>,
}

/// Status of an imported CSV row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportRowStatus {
    /// Row was valid and the donor registered.
    Imported,
    /// Row had validation errors and was skipped.
    Rejected,
}

/// Result of a donor roster import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    /// Per-row results.
    pub rows: Vec<ImportRowResult>,
    /// Total number of data rows.
    pub total_rows: usize,
    /// Number of rows imported.
    pub imported_count: usize,
    /// Number of rows rejected.
    pub rejected_count: usize,
}

/// Required CSV column headers (case-insensitive, normalized).
const REQUIRED_HEADERS: &[&str] = &["name", "blood_type", "latitude", "longitude", "channels"];

/// Normalizes a CSV header string for case-insensitive, whitespace-tolerant
/// matching.
fn normalize_header(header: &str) -> String {
    header.trim().to_lowercase().replace(' ', "_")
}

/// Validates that all required headers are present in the CSV.
fn validate_headers(headers: &StringRecord) -> Result<HashMap<String, usize>, ApiError> {
    let mut header_map: HashMap<String, usize> = HashMap::new();
    for (idx, header) in headers.iter().enumerate() {
        header_map.insert(normalize_header(header), idx);
    }

    let missing: Vec<String> = REQUIRED_HEADERS
        .iter()
        .filter(|required| !header_map.contains_key(**required))
        .map(|required| String::from(*required))
        .collect();

    if missing.is_empty() {
        Ok(header_map)
    } else {
        Err(ApiError::InvalidCsvFormat {
            reason: format!("Missing required headers: {}", missing.join(", ")),
        })
    }
}

/// Parses a CSV row into a `Donor` if possible.
fn parse_csv_row(
    record: &StringRecord,
    header_map: &HashMap<String, usize>,
) -> Result<Donor, Vec<String>> {
    let mut errors: Vec<String> = Vec::new();

    let get_field = |name: &str| -> Option<String> {
        header_map
            .get(name)
            .and_then(|&idx| record.get(idx))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };

    let name: String = get_field("name").unwrap_or_else(|| {
        errors.push(String::from("name: required field is missing or empty"));
        String::new()
    });

    let blood_type: Option<BloodType> = match get_field("blood_type") {
        Some(value) => match BloodType::parse(&value) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                errors.push(format!("blood_type: {e}"));
                None
            }
        },
        None => {
            errors.push(String::from("blood_type: required field is missing or empty"));
            None
        }
    };

    let parse_coordinate = |field: &str, errors: &mut Vec<String>| -> Option<f64> {
        match get_field(field) {
            Some(value) => match value.parse::<f64>() {
                Ok(parsed) => Some(parsed),
                Err(_) => {
                    errors.push(format!("{field}: '{value}' is not a number"));
                    None
                }
            },
            None => {
                errors.push(format!("{field}: required field is missing or empty"));
                None
            }
        }
    };
    let latitude: Option<f64> = parse_coordinate("latitude", &mut errors);
    let longitude: Option<f64> = parse_coordinate("longitude", &mut errors);

    let location: Option<Location> = match (latitude, longitude) {
        (Some(lat), Some(lng)) => match Location::new(lat, lng) {
            Ok(location) => Some(location),
            Err(e) => {
                errors.push(format!("location: {e}"));
                None
            }
        },
        _ => None,
    };

    // Channels are pipe-separated within the single CSV column, in
    // preference order: "sms|email".
    let mut channels: Vec<ContactChannel> = Vec::new();
    match get_field("channels") {
        Some(value) => {
            for part in value.split('|').map(str::trim).filter(|p| !p.is_empty()) {
                match ContactChannel::parse(part) {
                    Ok(channel) => channels.push(channel),
                    Err(e) => errors.push(format!("channels: {e}")),
                }
            }
            if channels.is_empty() && errors.is_empty() {
                errors.push(String::from("channels: at least one channel is required"));
            }
        }
        None => {
            errors.push(String::from("channels: required field is missing or empty"));
        }
    }

    match (blood_type, location) {
        (Some(blood_type), Some(location)) if errors.is_empty() => {
            Ok(Donor::new(name, blood_type, location, channels))
        }
        _ => Err(errors),
    }
}

/// Imports a donor roster from CSV text.
///
/// # Errors
///
/// Returns `ApiError::InvalidCsvFormat` if the CSV structure itself is
/// unreadable or required headers are missing. Row-level problems never
/// fail the batch; they are reported per row.
pub fn import_donor_roster(
    engine: &MatchingEngine,
    csv_text: &str,
) -> Result<ImportReport, ApiError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(csv_text.as_bytes());

    let headers: StringRecord = reader
        .headers()
        .map_err(|e| ApiError::InvalidCsvFormat {
            reason: format!("Unreadable header row: {e}"),
        })?
        .clone();
    let header_map: HashMap<String, usize> = validate_headers(&headers)?;

    let mut rows: Vec<ImportRowResult> = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let row_number: usize = index + 1;
        let record: StringRecord = match record {
            Ok(record) => record,
            Err(e) => {
                rows.push(ImportRowResult {
                    row_number,
                    name: None,
                    donor_id: None,
                    status: ImportRowStatus::Rejected,
                    errors: vec![format!("unreadable row: {e}")],
                });
                continue;
            }
        };

        match parse_csv_row(&record, &header_map) {
            Ok(donor) => match engine.register_donor(&donor) {
                Ok(donor_id) => rows.push(ImportRowResult {
                    row_number,
                    name: Some(donor.name),
                    donor_id: Some(donor_id),
                    status: ImportRowStatus::Imported,
                    errors: Vec::new(),
                }),
                Err(e) => rows.push(ImportRowResult {
                    row_number,
                    name: Some(donor.name),
                    donor_id: None,
                    status: ImportRowStatus::Rejected,
                    errors: vec![e.to_string()],
                }),
            },
            Err(errors) => rows.push(ImportRowResult {
                row_number,
                name: None,
                donor_id: None,
                status: ImportRowStatus::Rejected,
                errors,
            }),
        }
    }

    let total_rows: usize = rows.len();
    let imported_count: usize = rows
        .iter()
        .filter(|r| r.status == ImportRowStatus::Imported)
        .count();
    let rejected_count: usize = total_rows - imported_count;

    info!(total_rows, imported_count, rejected_count, "Donor roster import finished");
    Ok(ImportReport {
        rows,
        total_rows,
        imported_count,
        rejected_count,
    })
}
