// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

diesel::table! {
    donors (donor_id) {
        donor_id -> BigInt,
        name -> Text,
        blood_type -> Text,
        latitude -> Double,
        longitude -> Double,
        available -> Integer,
        last_donation -> Nullable<Text>,
        channels -> Text,
    }
}

diesel::table! {
    requests (request_id) {
        request_id -> BigInt,
        hospital -> Text,
        blood_type -> Text,
        urgency -> Text,
        latitude -> Double,
        longitude -> Double,
        units_needed -> Integer,
        created_at -> Text,
        needed_by -> Text,
        state -> Text,
    }
}

diesel::table! {
    matches (match_id) {
        match_id -> BigInt,
        request_id -> BigInt,
        donor_id -> BigInt,
        wave -> Integer,
        status -> Text,
        offered_at -> Text,
        responded_at -> Nullable<Text>,
        reason -> Nullable<Text>,
    }
}

diesel::table! {
    waves (wave_id) {
        wave_id -> BigInt,
        request_id -> BigInt,
        wave -> Integer,
        radius_km -> Double,
        dispatched_at -> Text,
        deadline -> Text,
        candidates -> Integer,
    }
}

diesel::table! {
    inventory (blood_type) {
        blood_type -> Text,
        units -> Integer,
    }
}

diesel::table! {
    audit_events (event_id) {
        event_id -> BigInt,
        request_id -> BigInt,
        actor_json -> Text,
        cause_json -> Text,
        action_json -> Text,
        before_snapshot -> Text,
        after_snapshot -> Text,
        created_at -> Text,
    }
}
