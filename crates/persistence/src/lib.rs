// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Persistence layer for the Hemolink donor matching system.
//!
//! This crate implements the engine's store and inventory traits over
//! Diesel and `SQLite`. Embedded migrations build the schema on first
//! open, so a server can point at a fresh file (or an in-memory database)
//! and start.
//!
//! ## Testing
//!
//! Tests run against uniquely named in-memory databases. A shared atomic
//! counter keeps the names deterministic and collision-free, so tests
//! never depend on timing or on each other.

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

mod data_models;
mod diesel_schema;
mod error;
mod mutations;
mod queries;

#[cfg(test)]
mod tests;

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use hemolink::{
    DonorStore, InventoryFeed, OpenRequest, StoreError, WaveRecord,
};
use hemolink_audit::AuditEvent;
use hemolink_domain::{
    BloodRequest, BloodType, Donor, MatchRecord, MatchStatus, RequestState,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use time::OffsetDateTime;
use tracing::info;

pub use error::PersistenceError;

/// Embedded schema migrations, applied on open.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Atomic counter for generating unique in-memory database names.
///
/// Each call to `new_in_memory()` receives a sequential id, eliminating
/// time-based collisions between test databases.
static DB_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A Diesel/`SQLite` implementation of the engine's store traits.
pub struct SqliteStore {
    conn: Mutex<SqliteConnection>,
}

impl SqliteStore {
    /// Opens (or creates) a database file and applies migrations.
    ///
    /// # Errors
    ///
    /// Returns a `PersistenceError` if the database cannot be opened,
    /// migrated, or configured.
    pub fn open(database_path: &str) -> Result<Self, PersistenceError> {
        info!(database_path, "Opening SQLite database");
        Self::establish(database_path)
    }

    /// Opens a uniquely named in-memory database and applies migrations.
    ///
    /// # Errors
    ///
    /// Returns a `PersistenceError` if the database cannot be opened,
    /// migrated, or configured.
    pub fn new_in_memory() -> Result<Self, PersistenceError> {
        let id: u64 = DB_COUNTER.fetch_add(1, Ordering::SeqCst);
        let url: String = format!("file:hemolink-mem-{id}?mode=memory&cache=shared");
        Self::establish(&url)
    }

    fn establish(database_url: &str) -> Result<Self, PersistenceError> {
        let mut conn: SqliteConnection = SqliteConnection::establish(database_url)
            .map_err(|e| PersistenceError::ConnectionFailed(e.to_string()))?;
        conn.batch_execute("PRAGMA foreign_keys = ON;")
            .map_err(|e| PersistenceError::InitializationFailed(e.to_string()))?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|e| PersistenceError::MigrationFailed(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, SqliteConnection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable(String::from("connection mutex poisoned")))
    }

    /// Sets the stock level for a blood type (operator/seed path).
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the write fails.
    pub fn set_stock(&self, blood_type: BloodType, units: u32) -> Result<(), StoreError> {
        mutations::set_stock(&mut *self.conn()?, blood_type, units)
    }

    /// Number of audit events recorded for a request.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the store cannot be queried.
    pub fn count_audit_events(&self, request_id: i64) -> Result<i64, StoreError> {
        queries::count_audit_events(&mut *self.conn()?, request_id)
    }
}

impl DonorStore for SqliteStore {
    fn find_compatible_donors(
        &self,
        request: &BloodRequest,
        radius_km: f64,
        exclude: &[i64],
    ) -> Result<Vec<Donor>, StoreError> {
        queries::find_compatible_donors(&mut *self.conn()?, request, radius_km, exclude)
    }

    fn get_donor(&self, donor_id: i64) -> Result<Option<Donor>, StoreError> {
        queries::get_donor(&mut *self.conn()?, donor_id)
    }

    fn save_donor(&self, donor: &Donor) -> Result<i64, StoreError> {
        mutations::save_donor(&mut *self.conn()?, donor)
    }

    fn update_donor_availability(
        &self,
        donor_id: i64,
        available: bool,
    ) -> Result<(), StoreError> {
        mutations::update_donor_availability(&mut *self.conn()?, donor_id, available)
    }

    fn update_donor_after_donation(
        &self,
        donor_id: i64,
        donated_at: OffsetDateTime,
    ) -> Result<(), StoreError> {
        mutations::update_donor_after_donation(&mut *self.conn()?, donor_id, donated_at)
    }

    fn save_request(&self, request: &BloodRequest) -> Result<i64, StoreError> {
        mutations::save_request(&mut *self.conn()?, request)
    }

    fn update_request_status(
        &self,
        request_id: i64,
        state: RequestState,
    ) -> Result<(), StoreError> {
        mutations::update_request_status(&mut *self.conn()?, request_id, state)
    }

    fn save_match(&self, record: &MatchRecord) -> Result<i64, StoreError> {
        mutations::save_match(&mut *self.conn()?, record)
    }

    fn update_match_status(
        &self,
        match_id: i64,
        status: MatchStatus,
        reason: Option<&str>,
    ) -> Result<(), StoreError> {
        mutations::update_match_status(&mut *self.conn()?, match_id, status, reason)
    }

    fn record_wave(&self, request_id: i64, wave: &WaveRecord) -> Result<(), StoreError> {
        mutations::record_wave(&mut *self.conn()?, request_id, wave)
    }

    fn load_open_requests(&self) -> Result<Vec<OpenRequest>, StoreError> {
        queries::load_open_requests(&mut *self.conn()?)
    }

    fn append_audit(&self, event: &AuditEvent) -> Result<(), StoreError> {
        mutations::append_audit(&mut *self.conn()?, event)
    }
}

impl InventoryFeed for SqliteStore {
    fn check_stock(&self, blood_type: BloodType) -> Result<u32, StoreError> {
        queries::check_stock(&mut *self.conn()?, blood_type)
    }

    fn reserve_stock(&self, blood_type: BloodType, units: u32) -> Result<bool, StoreError> {
        mutations::reserve_stock(&mut *self.conn()?, blood_type, units)
    }
}
