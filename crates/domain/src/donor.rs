// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Donor records and selection eligibility.

use crate::blood_type::BloodType;
use crate::error::DomainError;
use crate::geo::Location;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use time::{Duration, OffsetDateTime};

/// A channel over which a donor can be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactChannel {
    /// Text message to the donor's phone.
    Sms,
    /// Email to the donor's registered address.
    Email,
    /// Push notification to the donor's mobile app.
    Push,
}

impl ContactChannel {
    /// Returns the string representation of the channel.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Sms => "sms",
            Self::Email => "email",
            Self::Push => "push",
        }
    }

    /// Parses a channel from its string representation.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidContactChannel` if the string is not a
    /// recognized channel.
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s {
            "sms" => Ok(Self::Sms),
            "email" => Ok(Self::Email),
            "push" => Ok(Self::Push),
            _ => Err(DomainError::InvalidContactChannel(s.to_string())),
        }
    }
}

impl FromStr for ContactChannel {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for ContactChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A registered blood donor.
///
/// `donor_id` is the canonical identifier, assigned by the store on first
/// save. Donor rows persist indefinitely; the availability flag and
/// last-donation timestamp change through self-service updates and as a
/// side effect of confirmed donations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Donor {
    /// Canonical identifier. `None` until persisted.
    pub donor_id: Option<i64>,
    /// The donor's name (informational, not unique).
    pub name: String,
    /// The donor's blood group.
    pub blood_type: BloodType,
    /// The donor's home location.
    pub location: Location,
    /// Whether the donor is currently willing and able to donate.
    pub available: bool,
    /// When the donor last gave blood. `None` for first-time donors.
    pub last_donation: Option<OffsetDateTime>,
    /// Channels to try when notifying the donor, in preference order.
    pub channels: Vec<ContactChannel>,
}

impl Donor {
    /// Creates a new `Donor` without a persisted `donor_id`.
    ///
    /// # Arguments
    ///
    /// * `name` - The donor's name
    /// * `blood_type` - The donor's blood group
    /// * `location` - The donor's home location
    /// * `channels` - Contact channels in preference order
    #[must_use]
    pub const fn new(
        name: String,
        blood_type: BloodType,
        location: Location,
        channels: Vec<ContactChannel>,
    ) -> Self {
        Self {
            donor_id: None,
            name,
            blood_type,
            location,
            available: true,
            last_donation: None,
            channels,
        }
    }

    /// Creates a `Donor` with an existing `donor_id` (from the store).
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub const fn with_id(
        donor_id: i64,
        name: String,
        blood_type: BloodType,
        location: Location,
        available: bool,
        last_donation: Option<OffsetDateTime>,
        channels: Vec<ContactChannel>,
    ) -> Self {
        Self {
            donor_id: Some(donor_id),
            name,
            blood_type,
            location,
            available,
            last_donation,
            channels,
        }
    }

    /// Returns whether the medical cooldown window has elapsed at `now`.
    ///
    /// A donor who has never given blood is always past cooldown.
    #[must_use]
    pub fn cooldown_elapsed(&self, now: OffsetDateTime, cooldown: Duration) -> bool {
        match self.last_donation {
            Some(last) => now - last >= cooldown,
            None => true,
        }
    }

    /// Returns whether the donor may be selected for a request at `now`.
    ///
    /// A donor is selectable only when marked available and past the
    /// medical cooldown window.
    #[must_use]
    pub fn is_selectable(&self, now: OffsetDateTime, cooldown: Duration) -> bool {
        self.available && self.cooldown_elapsed(now, cooldown)
    }

    /// Returns the preferred contact channel, if any are registered.
    #[must_use]
    pub fn preferred_channel(&self) -> Option<ContactChannel> {
        self.channels.first().copied()
    }
}
