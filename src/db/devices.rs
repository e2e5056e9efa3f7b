use sqlx::{SqliteConnection, SqlitePool};

use super::changes::{observe, Observed, Table};
use super::{LocalStore, StoreError};

/// Device row, denormalized with its owner, farm and pen ids.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct CachedDevice {
    pub id: String,
    pub hardware_id: String,
    pub name: String,
    pub prediction_enabled: bool,
    pub index_config: String,
    pub owner_id: String,
    pub farm_id: String,
    pub pen_id: String,
    pub last_synced_at: i64,
}

pub struct DeviceTable<'a> {
    store: &'a LocalStore,
}

impl<'a> DeviceTable<'a> {
    pub(super) fn new(store: &'a LocalStore) -> Self {
        Self { store }
    }

    pub async fn get(&self, id: &str) -> Result<Option<CachedDevice>, StoreError> {
        let row = sqlx::query_as("SELECT * FROM devices WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.store.pool)
            .await?;
        Ok(row)
    }

    pub async fn list_by_farm(&self, farm_id: &str) -> Result<Vec<CachedDevice>, StoreError> {
        list_where(&self.store.pool, "farm_id = ?", farm_id).await
    }

    pub async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<CachedDevice>, StoreError> {
        list_where(&self.store.pool, "owner_id = ?", owner_id).await
    }

    pub fn observe_by_farm(&self, farm_id: &str) -> Observed<CachedDevice> {
        self.observe_where("farm_id = ?", farm_id)
    }

    pub fn observe_by_owner(&self, owner_id: &str) -> Observed<CachedDevice> {
        self.observe_where("owner_id = ?", owner_id)
    }

    fn observe_where(&self, filter: &'static str, value: &str) -> Observed<CachedDevice> {
        let value = value.to_string();
        observe(
            self.store.pool.clone(),
            &self.store.changes,
            Table::Devices,
            move |pool| {
                let value = value.clone();
                async move { list_where(&pool, filter, &value).await }
            },
        )
    }

    pub async fn insert(&self, device: &CachedDevice) -> Result<(), StoreError> {
        let mut conn = self.store.pool.acquire().await?;
        upsert(&mut conn, device).await?;
        self.store.notify(Table::Devices);
        Ok(())
    }

    pub async fn insert_all(&self, devices: &[CachedDevice]) -> Result<(), StoreError> {
        let mut tx = self.store.pool.begin().await?;
        for device in devices {
            upsert(&mut tx, device).await?;
        }
        tx.commit().await?;
        self.store.notify(Table::Devices);
        Ok(())
    }

    pub async fn update(&self, device: &CachedDevice) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE devices
            SET hardware_id = ?, name = ?, prediction_enabled = ?, index_config = ?,
                owner_id = ?, farm_id = ?, pen_id = ?, last_synced_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&device.hardware_id)
        .bind(&device.name)
        .bind(device.prediction_enabled)
        .bind(&device.index_config)
        .bind(&device.owner_id)
        .bind(&device.farm_id)
        .bind(&device.pen_id)
        .bind(device.last_synced_at)
        .bind(&device.id)
        .execute(&self.store.pool)
        .await?;

        let updated = result.rows_affected() > 0;
        if updated {
            self.store.notify(Table::Devices);
        }
        Ok(updated)
    }

    /// Delete a device together with its sensor readings.
    pub async fn delete(&self, id: &str) -> Result<u64, StoreError> {
        self.purge("id = ?", id).await
    }

    pub async fn delete_by_farm(&self, farm_id: &str) -> Result<u64, StoreError> {
        self.purge("farm_id = ?", farm_id).await
    }

    async fn purge(&self, filter: &'static str, value: &str) -> Result<u64, StoreError> {
        let mut tx = self.store.pool.begin().await?;

        sqlx::query(&format!(
            "DELETE FROM sensor_readings WHERE device_id IN (SELECT id FROM devices WHERE {})",
            filter
        ))
        .bind(value)
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query(&format!("DELETE FROM devices WHERE {}", filter))
            .bind(value)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        self.store.notify(Table::Devices);
        self.store.notify(Table::SensorReadings);
        Ok(result.rows_affected())
    }
}

async fn list_where(
    pool: &SqlitePool,
    filter: &'static str,
    value: &str,
) -> Result<Vec<CachedDevice>, StoreError> {
    let rows = sqlx::query_as(&format!(
        "SELECT * FROM devices WHERE {} ORDER BY rowid",
        filter
    ))
    .bind(value)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

async fn upsert(conn: &mut SqliteConnection, device: &CachedDevice) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO devices (id, hardware_id, name, prediction_enabled, index_config, owner_id, farm_id, pen_id, last_synced_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            hardware_id = excluded.hardware_id,
            name = excluded.name,
            prediction_enabled = excluded.prediction_enabled,
            index_config = excluded.index_config,
            owner_id = excluded.owner_id,
            farm_id = excluded.farm_id,
            pen_id = excluded.pen_id,
            last_synced_at = excluded.last_synced_at
        "#,
    )
    .bind(&device.id)
    .bind(&device.hardware_id)
    .bind(&device.name)
    .bind(device.prediction_enabled)
    .bind(&device.index_config)
    .bind(&device.owner_id)
    .bind(&device.farm_id)
    .bind(&device.pen_id)
    .bind(device.last_synced_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
