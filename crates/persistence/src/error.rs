// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use hemolink::StoreError;
use thiserror::Error;

/// Errors raised while opening or preparing a database.
///
/// Once a store exists, its operations speak the engine's `StoreError`
/// vocabulary instead; these cover construction only.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// The database could not be opened.
    #[error("Database connection failed: {0}")]
    ConnectionFailed(String),
    /// Migrations could not be applied.
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),
    /// The database violated a startup requirement.
    #[error("Database initialization failed: {0}")]
    InitializationFailed(String),
}

/// Maps a Diesel error onto the engine's store error vocabulary.
pub(crate) fn store_error(err: diesel::result::Error) -> StoreError {
    match err {
        diesel::result::Error::NotFound => StoreError::RowNotFound(String::from("no such row")),
        diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation
            | diesel::result::DatabaseErrorKind::ForeignKeyViolation
            | diesel::result::DatabaseErrorKind::NotNullViolation
            | diesel::result::DatabaseErrorKind::CheckViolation,
            info,
        ) => StoreError::ConstraintViolation(info.message().to_string()),
        other => StoreError::Unavailable(other.to_string()),
    }
}
