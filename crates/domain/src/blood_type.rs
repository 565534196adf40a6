// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Blood group typing and the donor-to-recipient compatibility table.
//!
//! Compatibility is a total function over the eight ABO/Rh groups. There is
//! no error path once a `BloodType` exists; unrecognized strings fail at
//! parse time.

use crate::error::DomainError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The eight ABO/Rh blood groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BloodType {
    /// A positive
    #[serde(rename = "A+")]
    APos,
    /// A negative
    #[serde(rename = "A-")]
    ANeg,
    /// B positive
    #[serde(rename = "B+")]
    BPos,
    /// B negative
    #[serde(rename = "B-")]
    BNeg,
    /// AB positive
    #[serde(rename = "AB+")]
    AbPos,
    /// AB negative
    #[serde(rename = "AB-")]
    AbNeg,
    /// O positive
    #[serde(rename = "O+")]
    OPos,
    /// O negative
    #[serde(rename = "O-")]
    ONeg,
}

/// The ABO component of a blood group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AboGroup {
    A,
    B,
    Ab,
    O,
}

impl BloodType {
    /// All eight blood groups, in display order.
    pub const ALL: [Self; 8] = [
        Self::APos,
        Self::ANeg,
        Self::BPos,
        Self::BNeg,
        Self::AbPos,
        Self::AbNeg,
        Self::OPos,
        Self::ONeg,
    ];

    /// Returns the display representation of the blood group.
    ///
    /// This is used for persistence and API serialization.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::APos => "A+",
            Self::ANeg => "A-",
            Self::BPos => "B+",
            Self::BNeg => "B-",
            Self::AbPos => "AB+",
            Self::AbNeg => "AB-",
            Self::OPos => "O+",
            Self::ONeg => "O-",
        }
    }

    /// Parses a blood group from its display representation.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidBloodType` if the string is not one of
    /// the eight ABO/Rh groups.
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s {
            "A+" => Ok(Self::APos),
            "A-" => Ok(Self::ANeg),
            "B+" => Ok(Self::BPos),
            "B-" => Ok(Self::BNeg),
            "AB+" => Ok(Self::AbPos),
            "AB-" => Ok(Self::AbNeg),
            "O+" => Ok(Self::OPos),
            "O-" => Ok(Self::ONeg),
            _ => Err(DomainError::InvalidBloodType(s.to_string())),
        }
    }

    const fn abo(self) -> AboGroup {
        match self {
            Self::APos | Self::ANeg => AboGroup::A,
            Self::BPos | Self::BNeg => AboGroup::B,
            Self::AbPos | Self::AbNeg => AboGroup::Ab,
            Self::OPos | Self::ONeg => AboGroup::O,
        }
    }

    /// Returns whether the group carries the Rh antigen.
    #[must_use]
    pub const fn is_rh_positive(&self) -> bool {
        matches!(self, Self::APos | Self::BPos | Self::AbPos | Self::OPos)
    }

    /// Returns whether blood of this group can be given to a recipient of
    /// `recipient` group.
    ///
    /// Standard ABO/Rh rules: the donor's ABO antigens must be a subset of
    /// the recipient's (O donates to every group, AB only to AB), and an
    /// Rh-positive donor may only donate to an Rh-positive recipient.
    /// O- is the universal donor; AB+ the universal recipient.
    #[must_use]
    pub const fn can_donate_to(&self, recipient: Self) -> bool {
        let abo_ok: bool = matches!(
            (self.abo(), recipient.abo()),
            (AboGroup::O, _)
                | (AboGroup::A, AboGroup::A | AboGroup::Ab)
                | (AboGroup::B, AboGroup::B | AboGroup::Ab)
                | (AboGroup::Ab, AboGroup::Ab)
        );
        let rh_ok: bool = recipient.is_rh_positive() || !self.is_rh_positive();
        abo_ok && rh_ok
    }
}

impl FromStr for BloodType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for BloodType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
