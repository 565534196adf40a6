// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! The Matching & Escalation Engine for the Hemolink donor matching
//! system.
//!
//! Given a blood request, the engine selects an ordered candidate set of
//! donors, drives a multi-round notification/response protocol with
//! timeouts, and transitions the request through its lifecycle until
//! fulfillment, expiry, or cancellation. It consumes a donor/request
//! store, a notification dispatcher, and an optional inventory feed
//! through the traits in [`traits`], and is storage- and
//! transport-agnostic.

#![deny(
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    clippy::style,
    clippy::correctness,
    clippy::all,
    clippy::suspicious,
    clippy::complexity,
    clippy::perf,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(clippy::multiple_crate_versions)]

mod context;
mod engine;
mod error;
mod selector;
mod traits;

#[cfg(test)]
mod tests;

pub use context::{DonorResponse, RequestContext, RequestStatusView, ResponseAck};
pub use engine::{EngineDeps, MatchingEngine};
pub use error::EngineError;
pub use selector::{RankedCandidate, select_candidates};
pub use traits::{
    DeliveryReceipt, DispatchError, DonorStore, InventoryFeed, NotificationDispatcher,
    OpenRequest, RequestSummary, StoreError, WaveRecord,
};
