use std::time::Duration;

use thiserror::Error;

/// Returned when a lookup asks for a row that doesn't exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[error("no matching record")]
pub struct NoMatch;

pub const ERR_NO_MATCH: NoMatch = NoMatch;

/// Errors surfaced by the connection bootstrap and by query code built on top of it.
#[derive(Debug, Error)]
pub enum DbError {
    /// The connection descriptor was rejected before any network I/O.
    #[error("invalid connection descriptor: {0}")]
    Open(String),

    /// The liveness check failed. Carries the driver error untouched.
    #[error(transparent)]
    Ping(sqlx::Error),

    #[error("database did not answer within {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    NoMatch(#[from] NoMatch),

    #[error(transparent)]
    Query(sqlx::Error),
}

impl DbError {
    pub fn is_no_match(&self) -> bool {
        matches!(self, DbError::NoMatch(_))
    }
}

impl From<sqlx::Error> for DbError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => DbError::NoMatch(ERR_NO_MATCH),
            other => DbError::Query(other),
        }
    }
}
