use sqlx::{SqliteConnection, SqlitePool};

use super::changes::{observe, Observed, Table};
use super::{LocalStore, StoreError};

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct CachedFarm {
    pub id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub address: String,
    pub area: f64,
    pub species: String,
    pub owner_id: String,
    pub last_synced_at: i64,
}

pub struct FarmTable<'a> {
    store: &'a LocalStore,
}

impl<'a> FarmTable<'a> {
    pub(super) fn new(store: &'a LocalStore) -> Self {
        Self { store }
    }

    pub async fn get(&self, id: &str) -> Result<Option<CachedFarm>, StoreError> {
        let row = sqlx::query_as("SELECT * FROM farms WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.store.pool)
            .await?;
        Ok(row)
    }

    pub async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<CachedFarm>, StoreError> {
        list_by_owner(&self.store.pool, owner_id).await
    }

    pub fn observe_by_owner(&self, owner_id: &str) -> Observed<CachedFarm> {
        let owner_id = owner_id.to_string();
        observe(
            self.store.pool.clone(),
            &self.store.changes,
            Table::Farms,
            move |pool| {
                let owner_id = owner_id.clone();
                async move { list_by_owner(&pool, &owner_id).await }
            },
        )
    }

    pub async fn insert(&self, farm: &CachedFarm) -> Result<(), StoreError> {
        let mut conn = self.store.pool.acquire().await?;
        upsert(&mut conn, farm).await?;
        self.store.notify(Table::Farms);
        Ok(())
    }

    pub async fn insert_all(&self, farms: &[CachedFarm]) -> Result<(), StoreError> {
        let mut tx = self.store.pool.begin().await?;
        for farm in farms {
            upsert(&mut tx, farm).await?;
        }
        tx.commit().await?;
        self.store.notify(Table::Farms);
        Ok(())
    }

    /// Returns false when no cached row has this id.
    pub async fn update(&self, farm: &CachedFarm) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE farms
            SET name = ?, latitude = ?, longitude = ?, address = ?, area = ?,
                species = ?, owner_id = ?, last_synced_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&farm.name)
        .bind(farm.latitude)
        .bind(farm.longitude)
        .bind(&farm.address)
        .bind(farm.area)
        .bind(&farm.species)
        .bind(&farm.owner_id)
        .bind(farm.last_synced_at)
        .bind(&farm.id)
        .execute(&self.store.pool)
        .await?;

        let updated = result.rows_affected() > 0;
        if updated {
            self.store.notify(Table::Farms);
        }
        Ok(updated)
    }

    /// Delete a farm and everything cached under it.
    pub async fn delete(&self, id: &str) -> Result<u64, StoreError> {
        let mut tx = self.store.pool.begin().await?;
        let deleted = purge_farms(&mut tx, "id = ?", id).await?;
        tx.commit().await?;
        notify_cascade(self.store);
        Ok(deleted)
    }

    /// Delete every farm of an owner and everything cached under them.
    pub async fn delete_by_owner(&self, owner_id: &str) -> Result<u64, StoreError> {
        let mut tx = self.store.pool.begin().await?;
        let deleted = purge_farms(&mut tx, "owner_id = ?", owner_id).await?;
        tx.commit().await?;
        notify_cascade(self.store);
        Ok(deleted)
    }
}

async fn list_by_owner(pool: &SqlitePool, owner_id: &str) -> Result<Vec<CachedFarm>, StoreError> {
    let rows = sqlx::query_as("SELECT * FROM farms WHERE owner_id = ? ORDER BY rowid")
        .bind(owner_id)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

// The conflict clause updates in place, so a refreshed row keeps its
// original insertion position.
async fn upsert(conn: &mut SqliteConnection, farm: &CachedFarm) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO farms (id, name, latitude, longitude, address, area, species, owner_id, last_synced_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            latitude = excluded.latitude,
            longitude = excluded.longitude,
            address = excluded.address,
            area = excluded.area,
            species = excluded.species,
            owner_id = excluded.owner_id,
            last_synced_at = excluded.last_synced_at
        "#,
    )
    .bind(&farm.id)
    .bind(&farm.name)
    .bind(farm.latitude)
    .bind(farm.longitude)
    .bind(&farm.address)
    .bind(farm.area)
    .bind(&farm.species)
    .bind(&farm.owner_id)
    .bind(farm.last_synced_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Delete the farms matching `filter` (a single-placeholder `WHERE` clause
/// over `farms`) along with their devices, sensor readings, silos and
/// cameras. Children go first. Returns the number of farms removed.
pub(super) async fn purge_farms(
    conn: &mut SqliteConnection,
    filter: &'static str,
    value: &str,
) -> Result<u64, sqlx::Error> {
    let farm_ids = format!("SELECT id FROM farms WHERE {}", filter);

    let readings = format!(
        "DELETE FROM sensor_readings WHERE device_id IN \
         (SELECT id FROM devices WHERE farm_id IN ({}))",
        farm_ids
    );
    let devices = format!("DELETE FROM devices WHERE farm_id IN ({})", farm_ids);
    let silos = format!("DELETE FROM silos WHERE farm_id IN ({})", farm_ids);
    let cameras = format!("DELETE FROM cameras WHERE farm_id IN ({})", farm_ids);

    for statement in [&readings, &devices, &silos, &cameras] {
        sqlx::query(statement)
            .bind(value)
            .execute(&mut *conn)
            .await?;
    }

    let result = sqlx::query(&format!("DELETE FROM farms WHERE {}", filter))
        .bind(value)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

pub(super) fn notify_cascade(store: &LocalStore) {
    for table in [
        Table::Farms,
        Table::Devices,
        Table::SensorReadings,
        Table::Silos,
        Table::Cameras,
    ] {
        store.notify(table);
    }
}
