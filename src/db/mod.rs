//! Local cache store.
//!
//! One SQLite table per cached entity. Every write is announced on a change
//! bus so that observed queries re-run and push fresh rows to their
//! subscribers.

mod cameras;
mod changes;
mod devices;
mod farms;
mod owners;
mod readings;
mod silos;

pub use cameras::{CachedCamera, CameraTable};
pub use changes::{Observed, Table};
pub use devices::{CachedDevice, DeviceTable};
pub use farms::{CachedFarm, FarmTable};
pub use owners::{CachedOwner, OwnerTable};
pub use readings::{CachedSensorReading, SensorReadingTable};
pub use silos::{CachedSilo, SiloTable};

use sqlx::migrate::{MigrateError, Migrator};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::{info, warn};

use changes::ChangeBus;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] MigrateError),

    #[error("Failed to prepare database file '{}': {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),
}

/// Open the database and bring its schema up to date.
///
/// The cache has a single schema version and no upgrade path. When the file
/// on disk cannot be reconciled with the embedded migrations it is deleted
/// and recreated empty.
pub async fn init_db(path: &Path) -> Result<SqlitePool, StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Io(parent.to_path_buf(), e))?;
        }
    }

    let pool = connect(path).await?;
    match MIGRATOR.run(&pool).await {
        Ok(()) => Ok(pool),
        Err(e) => {
            warn!(
                error = %e,
                path = %path.display(),
                "Local cache schema mismatch; resetting store"
            );
            pool.close().await;
            remove_database_files(path)?;

            let pool = connect(path).await?;
            MIGRATOR.run(&pool).await?;
            info!(path = %path.display(), "Local cache recreated");
            Ok(pool)
        }
    }
}

async fn connect(path: &Path) -> Result<SqlitePool, StoreError> {
    let db_url = format!("sqlite:{}?mode=rwc", path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?.create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;
    Ok(pool)
}

fn remove_database_files(path: &Path) -> Result<(), StoreError> {
    let mut candidates = vec![path.to_path_buf()];
    for suffix in ["-wal", "-shm", "-journal"] {
        let mut name = path.as_os_str().to_owned();
        name.push(suffix);
        candidates.push(PathBuf::from(name));
    }

    for candidate in candidates {
        match std::fs::remove_file(&candidate) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(StoreError::Io(candidate, e)),
        }
    }
    Ok(())
}

/// Handle to the cache tables. Cheap to clone; all clones share one pool
/// and one change bus.
#[derive(Clone)]
pub struct LocalStore {
    pool: SqlitePool,
    changes: ChangeBus,
}

impl LocalStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            changes: ChangeBus::new(),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn owners(&self) -> OwnerTable<'_> {
        OwnerTable::new(self)
    }

    pub fn farms(&self) -> FarmTable<'_> {
        FarmTable::new(self)
    }

    pub fn devices(&self) -> DeviceTable<'_> {
        DeviceTable::new(self)
    }

    pub fn sensor_readings(&self) -> SensorReadingTable<'_> {
        SensorReadingTable::new(self)
    }

    pub fn silos(&self) -> SiloTable<'_> {
        SiloTable::new(self)
    }

    pub fn cameras(&self) -> CameraTable<'_> {
        CameraTable::new(self)
    }

    pub(crate) fn notify(&self, table: Table) {
        self.changes.notify(table);
    }
}
