// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Field validation applied at intake, before anything enters the state
//! machine.

use crate::donor::Donor;
use crate::error::DomainError;
use crate::request::BloodRequest;
use time::format_description::well_known::Iso8601;

/// Validates request field constraints.
///
/// # Errors
///
/// Returns an error if the hospital name is empty, the unit count is zero,
/// or the needed-by deadline does not fall after the creation timestamp.
/// Blood type and coordinates are enforced by their own constructors.
pub fn validate_request_fields(request: &BloodRequest) -> Result<(), DomainError> {
    if request.hospital.trim().is_empty() {
        return Err(DomainError::InvalidHospital(String::from(
            "Hospital name must not be empty",
        )));
    }
    if request.units_needed == 0 {
        return Err(DomainError::InvalidUnits {
            units: request.units_needed,
        });
    }
    if request.needed_by <= request.created_at {
        return Err(DomainError::DeadlineBeforeCreation {
            created_at: request
                .created_at
                .format(&Iso8601::DEFAULT)
                .unwrap_or_else(|_| String::from("unknown")),
            needed_by: request
                .needed_by
                .format(&Iso8601::DEFAULT)
                .unwrap_or_else(|_| String::from("unknown")),
        });
    }
    Ok(())
}

/// Validates donor field constraints.
///
/// # Errors
///
/// Returns an error if the name is empty or no contact channel is
/// registered. Location ranges are enforced by `Location::new`.
pub fn validate_donor_fields(donor: &Donor) -> Result<(), DomainError> {
    if donor.name.trim().is_empty() {
        return Err(DomainError::InvalidDonorName(String::from(
            "Donor name must not be empty",
        )));
    }
    if donor.channels.is_empty() {
        return Err(DomainError::NoContactChannels);
    }
    Ok(())
}
