// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Lineage store error taxonomy

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LineageError {
    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate `(pattern_id, version)` or a write that would close a cycle
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Dangling reference: {0}")]
    DanglingReference(String),

    #[error("Storage write failed: {0}")]
    StorageWrite(String),

    #[error("Storage read failed: {0}")]
    StorageRead(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl LineageError {
    /// Transient write failures may succeed on a second attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, LineageError::StorageWrite(_))
    }
}

impl From<serde_json::Error> for LineageError {
    fn from(err: serde_json::Error) -> Self {
        LineageError::Serialization(err.to_string())
    }
}

impl From<sqlx::Error> for LineageError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => LineageError::NotFound("Row not found".to_string()),
            sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                // unique_violation
                Some("23505") => LineageError::Conflict(db_err.message().to_string()),
                // foreign_key_violation
                Some("23503") => LineageError::DanglingReference(db_err.message().to_string()),
                _ => LineageError::StorageWrite(err.to_string()),
            },
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                LineageError::StorageWrite(err.to_string())
            }
            _ => LineageError::StorageRead(err.to_string()),
        }
    }
}
