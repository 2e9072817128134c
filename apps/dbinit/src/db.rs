use std::fmt;
use std::future::Future;
use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{Connection, PgConnection, PgPool};
use tracing::{debug, info};

use crate::errors::DbError;
use crate::settings::{ConnectionSettings, Descriptor};

/// A PostgreSQL pool that answered a ping when it was created.
/// Clones share the same pool.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
    options: PgConnectOptions,
    ping_timeout: Duration,
}

/// Opens a pool on the default port with TLS disabled and checks it is reachable.
pub async fn initialize(
    username: &str,
    password: &str,
    database: &str,
    host: &str,
) -> Result<Database, DbError> {
    Database::initialize(&ConnectionSettings::new(username, password, database, host)).await
}

impl Database {
    /// Opens a pool for `settings` and pings it once.
    /// Errors are returned as-is: no retry, no logging.
    pub async fn initialize(settings: &ConnectionSettings) -> Result<Self, DbError> {
        let db = open(&settings.descriptor(), settings.connect_timeout)?;

        if let Err(e) = db.ping().await {
            db.pool.close().await;
            return Err(e);
        }

        info!("Database connection established");
        Ok(db)
    }

    /// Runs `f` against a freshly initialized database and closes the pool
    /// afterwards, whatever `f` returned.
    pub async fn scoped<F, Fut, T>(settings: &ConnectionSettings, f: F) -> Result<T, DbError>
    where
        F: FnOnce(Database) -> Fut,
        Fut: Future<Output = Result<T, DbError>>,
    {
        Self::initialize(settings).await?.run_then_close(f).await
    }

    async fn run_then_close<F, Fut, T>(self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(Database) -> Fut,
        Fut: Future<Output = Result<T, DbError>>,
    {
        let outcome = f(self.clone()).await;
        self.close().await;
        outcome
    }

    /// Round-trips to the server on a fresh connection outside the pool, so a
    /// refused or failed connect comes back at once as the driver reported it.
    pub async fn ping(&self) -> Result<(), DbError> {
        let check = async {
            let mut conn = PgConnection::connect_with(&self.options).await?;
            conn.ping().await?;
            conn.close().await?;
            Ok::<(), sqlx::Error>(())
        };

        match tokio::time::timeout(self.ping_timeout, check).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(DbError::Ping(e)),
            Err(_) => Err(DbError::Timeout(self.ping_timeout)),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    /// Closes the pool and waits for checked-out connections to come back.
    pub async fn close(self) {
        self.pool.close().await;
        debug!("Database connection pool closed");
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("pool", &self.pool)
            .field("ping_timeout", &self.ping_timeout)
            .finish_non_exhaustive()
    }
}

/// Builds a lazy pool from a descriptor string. Does no network I/O.
fn open(descriptor: &str, ping_timeout: Duration) -> Result<Database, DbError> {
    let options = descriptor.parse::<Descriptor>()?.connect_options();
    let pool = PgPoolOptions::new().connect_lazy_with(options.clone());

    Ok(Database {
        pool,
        options,
        ping_timeout,
    })
}
