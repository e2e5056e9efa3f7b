use sqlx::{SqliteConnection, SqlitePool};

use super::changes::{observe, Observed, Table};
use super::{LocalStore, StoreError};

/// Sensor reading row. Several readings can share device, sensor and
/// timestamp, so rows are keyed by an auto-incrementing sequence number;
/// `seq` is `None` until the row has been inserted.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct CachedSensorReading {
    pub seq: Option<i64>,
    pub device_id: String,
    pub sensor: String,
    pub value: f64,
    pub unit: Option<String>,
    pub captured_at: i64,
    pub synced_at: i64,
}

pub struct SensorReadingTable<'a> {
    store: &'a LocalStore,
}

impl<'a> SensorReadingTable<'a> {
    pub(super) fn new(store: &'a LocalStore) -> Self {
        Self { store }
    }

    pub async fn get(&self, seq: i64) -> Result<Option<CachedSensorReading>, StoreError> {
        let row = sqlx::query_as("SELECT * FROM sensor_readings WHERE seq = ?")
            .bind(seq)
            .fetch_optional(&self.store.pool)
            .await?;
        Ok(row)
    }

    /// Readings for a device, newest first.
    pub async fn list_by_device(
        &self,
        device_id: &str,
    ) -> Result<Vec<CachedSensorReading>, StoreError> {
        list_by_device(&self.store.pool, device_id).await
    }

    pub fn observe_by_device(&self, device_id: &str) -> Observed<CachedSensorReading> {
        let device_id = device_id.to_string();
        observe(
            self.store.pool.clone(),
            &self.store.changes,
            Table::SensorReadings,
            move |pool| {
                let device_id = device_id.clone();
                async move { list_by_device(&pool, &device_id).await }
            },
        )
    }

    /// Capture time of the newest cached reading for a device.
    pub async fn latest_captured_at(&self, device_id: &str) -> Result<Option<i64>, StoreError> {
        let latest: Option<(Option<i64>,)> =
            sqlx::query_as("SELECT MAX(captured_at) FROM sensor_readings WHERE device_id = ?")
                .bind(device_id)
                .fetch_optional(&self.store.pool)
                .await?;
        Ok(latest.and_then(|(max,)| max))
    }

    /// Sensor names of the device's readings captured exactly at `captured_at`.
    pub async fn sensors_at(
        &self,
        device_id: &str,
        captured_at: i64,
    ) -> Result<Vec<String>, StoreError> {
        let sensors = sqlx::query_scalar(
            "SELECT sensor FROM sensor_readings WHERE device_id = ? AND captured_at = ?",
        )
        .bind(device_id)
        .bind(captured_at)
        .fetch_all(&self.store.pool)
        .await?;
        Ok(sensors)
    }

    /// Insert a reading, replacing the row with the same `seq` if it has one.
    /// Returns the row's sequence number.
    pub async fn insert(&self, reading: &CachedSensorReading) -> Result<i64, StoreError> {
        let mut conn = self.store.pool.acquire().await?;
        let seq = insert_or_replace(&mut conn, reading).await?;
        self.store.notify(Table::SensorReadings);
        Ok(seq)
    }

    pub async fn insert_all(&self, readings: &[CachedSensorReading]) -> Result<(), StoreError> {
        let mut tx = self.store.pool.begin().await?;
        for reading in readings {
            insert_or_replace(&mut tx, reading).await?;
        }
        tx.commit().await?;
        self.store.notify(Table::SensorReadings);
        Ok(())
    }

    /// Returns false when the reading has no `seq` or no row matches it.
    pub async fn update(&self, reading: &CachedSensorReading) -> Result<bool, StoreError> {
        let Some(seq) = reading.seq else {
            return Ok(false);
        };

        let result = sqlx::query(
            r#"
            UPDATE sensor_readings
            SET device_id = ?, sensor = ?, value = ?, unit = ?, captured_at = ?, synced_at = ?
            WHERE seq = ?
            "#,
        )
        .bind(&reading.device_id)
        .bind(&reading.sensor)
        .bind(reading.value)
        .bind(&reading.unit)
        .bind(reading.captured_at)
        .bind(reading.synced_at)
        .bind(seq)
        .execute(&self.store.pool)
        .await?;

        let updated = result.rows_affected() > 0;
        if updated {
            self.store.notify(Table::SensorReadings);
        }
        Ok(updated)
    }

    pub async fn delete(&self, seq: i64) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM sensor_readings WHERE seq = ?")
            .bind(seq)
            .execute(&self.store.pool)
            .await?;
        self.store.notify(Table::SensorReadings);
        Ok(result.rows_affected())
    }

    pub async fn delete_by_device(&self, device_id: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM sensor_readings WHERE device_id = ?")
            .bind(device_id)
            .execute(&self.store.pool)
            .await?;
        self.store.notify(Table::SensorReadings);
        Ok(result.rows_affected())
    }

    /// Delete every reading captured strictly before `cutoff` (epoch ms).
    /// A reading captured exactly at the cutoff is kept.
    pub async fn prune_older_than(&self, cutoff: i64) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM sensor_readings WHERE captured_at < ?")
            .bind(cutoff)
            .execute(&self.store.pool)
            .await?;

        let pruned = result.rows_affected();
        if pruned > 0 {
            self.store.notify(Table::SensorReadings);
        }
        Ok(pruned)
    }
}

async fn list_by_device(
    pool: &SqlitePool,
    device_id: &str,
) -> Result<Vec<CachedSensorReading>, StoreError> {
    let rows = sqlx::query_as(
        "SELECT * FROM sensor_readings WHERE device_id = ? ORDER BY captured_at DESC, seq DESC",
    )
    .bind(device_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

async fn insert_or_replace(
    conn: &mut SqliteConnection,
    reading: &CachedSensorReading,
) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT OR REPLACE INTO sensor_readings (seq, device_id, sensor, value, unit, captured_at, synced_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(reading.seq)
    .bind(&reading.device_id)
    .bind(&reading.sensor)
    .bind(reading.value)
    .bind(&reading.unit)
    .bind(reading.captured_at)
    .bind(reading.synced_at)
    .execute(&mut *conn)
    .await?;
    Ok(result.last_insert_rowid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::setup_store;
    use futures::StreamExt;

    const DAY_MS: i64 = 24 * 60 * 60 * 1000;

    fn reading(device_id: &str, sensor: &str, captured_at: i64) -> CachedSensorReading {
        CachedSensorReading {
            seq: None,
            device_id: device_id.to_string(),
            sensor: sensor.to_string(),
            value: captured_at as f64,
            unit: None,
            captured_at,
            synced_at: captured_at,
        }
    }

    #[tokio::test]
    async fn test_list_by_device_is_newest_first() {
        let ctx = setup_store().await;
        let readings = ctx.store.sensor_readings();

        readings
            .insert_all(&[
                reading("dev", "t", 200),
                reading("dev", "t", 100),
                reading("dev", "t", 300),
                reading("other", "t", 999),
            ])
            .await
            .unwrap();

        let listed = readings.list_by_device("dev").await.unwrap();
        let times: Vec<i64> = listed.iter().map(|r| r.captured_at).collect();
        assert_eq!(times, vec![300, 200, 100]);
        assert!(listed.iter().all(|r| r.seq.is_some()));
    }

    #[tokio::test]
    async fn test_identical_readings_are_kept_separately() {
        let ctx = setup_store().await;
        let readings = ctx.store.sensor_readings();

        let first = readings.insert(&reading("dev", "t", 100)).await.unwrap();
        let second = readings.insert(&reading("dev", "t", 100)).await.unwrap();
        assert_ne!(first, second);
        assert_eq!(readings.list_by_device("dev").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_insert_with_seq_replaces() {
        let ctx = setup_store().await;
        let readings = ctx.store.sensor_readings();

        let seq = readings.insert(&reading("dev", "t", 100)).await.unwrap();
        let mut replacement = reading("dev", "humidity", 100);
        replacement.seq = Some(seq);
        readings.insert(&replacement).await.unwrap();

        let listed = readings.list_by_device("dev").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].sensor, "humidity");
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let ctx = setup_store().await;
        let readings = ctx.store.sensor_readings();

        assert!(!readings.update(&reading("dev", "t", 1)).await.unwrap());

        let seq = readings.insert(&reading("dev", "t", 1)).await.unwrap();
        let mut stored = readings.get(seq).await.unwrap().unwrap();
        stored.value = 7.5;
        assert!(readings.update(&stored).await.unwrap());
        assert_eq!(readings.get(seq).await.unwrap().unwrap().value, 7.5);

        assert_eq!(readings.delete(seq).await.unwrap(), 1);
        assert!(readings.get(seq).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_prune_keeps_rows_at_cutoff() {
        let ctx = setup_store().await;
        let readings = ctx.store.sensor_readings();

        let now = 100 * DAY_MS;
        let cutoff = now - 30 * DAY_MS;
        readings
            .insert_all(&[
                reading("dev", "t", cutoff - 1),
                reading("dev", "t", cutoff),
                reading("dev", "t", cutoff + 1),
                reading("dev", "t", 0),
                reading("other", "t", cutoff - DAY_MS),
                reading("other", "t", now),
            ])
            .await
            .unwrap();

        assert_eq!(readings.prune_older_than(cutoff).await.unwrap(), 3);

        let mut remaining: Vec<i64> = readings
            .list_by_device("dev")
            .await
            .unwrap()
            .into_iter()
            .chain(readings.list_by_device("other").await.unwrap())
            .map(|r| r.captured_at)
            .collect();
        remaining.sort();
        assert_eq!(remaining, vec![cutoff, cutoff + 1, now]);
    }

    #[tokio::test]
    async fn test_latest_captured_at() {
        let ctx = setup_store().await;
        let readings = ctx.store.sensor_readings();

        assert_eq!(readings.latest_captured_at("dev").await.unwrap(), None);
        readings
            .insert_all(&[reading("dev", "t", 5), reading("dev", "t", 9)])
            .await
            .unwrap();
        assert_eq!(readings.latest_captured_at("dev").await.unwrap(), Some(9));
    }

    #[tokio::test]
    async fn test_observe_by_device_follows_pruning() {
        let ctx = setup_store().await;
        let readings = ctx.store.sensor_readings();

        readings.insert(&reading("dev", "t", 10)).await.unwrap();
        let mut stream = readings.observe_by_device("dev");
        assert_eq!(stream.next().await.unwrap().unwrap().len(), 1);

        readings.prune_older_than(11).await.unwrap();
        assert!(stream.next().await.unwrap().unwrap().is_empty());
    }
}
