use sqlx::{SqliteConnection, SqlitePool};

use super::changes::{observe, Observed, Table};
use super::{LocalStore, StoreError};

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct CachedCamera {
    pub id: String,
    pub name: String,
    pub stream_url: String,
    pub farm_id: String,
    pub owner_id: String,
    pub last_synced_at: i64,
}

pub struct CameraTable<'a> {
    store: &'a LocalStore,
}

impl<'a> CameraTable<'a> {
    pub(super) fn new(store: &'a LocalStore) -> Self {
        Self { store }
    }

    pub async fn get(&self, id: &str) -> Result<Option<CachedCamera>, StoreError> {
        let row = sqlx::query_as("SELECT * FROM cameras WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.store.pool)
            .await?;
        Ok(row)
    }

    pub async fn list_by_farm(&self, farm_id: &str) -> Result<Vec<CachedCamera>, StoreError> {
        list_by_farm(&self.store.pool, farm_id).await
    }

    pub fn observe_by_farm(&self, farm_id: &str) -> Observed<CachedCamera> {
        let farm_id = farm_id.to_string();
        observe(
            self.store.pool.clone(),
            &self.store.changes,
            Table::Cameras,
            move |pool| {
                let farm_id = farm_id.clone();
                async move { list_by_farm(&pool, &farm_id).await }
            },
        )
    }

    pub async fn insert(&self, camera: &CachedCamera) -> Result<(), StoreError> {
        let mut conn = self.store.pool.acquire().await?;
        upsert(&mut conn, camera).await?;
        self.store.notify(Table::Cameras);
        Ok(())
    }

    pub async fn insert_all(&self, cameras: &[CachedCamera]) -> Result<(), StoreError> {
        let mut tx = self.store.pool.begin().await?;
        for camera in cameras {
            upsert(&mut tx, camera).await?;
        }
        tx.commit().await?;
        self.store.notify(Table::Cameras);
        Ok(())
    }

    pub async fn update(&self, camera: &CachedCamera) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE cameras
            SET name = ?, stream_url = ?, farm_id = ?, owner_id = ?, last_synced_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&camera.name)
        .bind(&camera.stream_url)
        .bind(&camera.farm_id)
        .bind(&camera.owner_id)
        .bind(camera.last_synced_at)
        .bind(&camera.id)
        .execute(&self.store.pool)
        .await?;

        let updated = result.rows_affected() > 0;
        if updated {
            self.store.notify(Table::Cameras);
        }
        Ok(updated)
    }

    pub async fn delete(&self, id: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM cameras WHERE id = ?")
            .bind(id)
            .execute(&self.store.pool)
            .await?;
        self.store.notify(Table::Cameras);
        Ok(result.rows_affected())
    }

    pub async fn delete_by_farm(&self, farm_id: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM cameras WHERE farm_id = ?")
            .bind(farm_id)
            .execute(&self.store.pool)
            .await?;
        self.store.notify(Table::Cameras);
        Ok(result.rows_affected())
    }
}

async fn list_by_farm(pool: &SqlitePool, farm_id: &str) -> Result<Vec<CachedCamera>, StoreError> {
    let rows = sqlx::query_as("SELECT * FROM cameras WHERE farm_id = ? ORDER BY rowid")
        .bind(farm_id)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

async fn upsert(conn: &mut SqliteConnection, camera: &CachedCamera) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO cameras (id, name, stream_url, farm_id, owner_id, last_synced_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            stream_url = excluded.stream_url,
            farm_id = excluded.farm_id,
            owner_id = excluded.owner_id,
            last_synced_at = excluded.last_synced_at
        "#,
    )
    .bind(&camera.id)
    .bind(&camera.name)
    .bind(&camera.stream_url)
    .bind(&camera.farm_id)
    .bind(&camera.owner_id)
    .bind(camera.last_synced_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::setup_store;
    use crate::db::CachedFarm;
    use futures::StreamExt;

    fn camera(id: &str, farm_id: &str) -> CachedCamera {
        CachedCamera {
            id: id.to_string(),
            name: format!("Cam {}", id),
            stream_url: format!("rtsp://cams.local/{}", id),
            farm_id: farm_id.to_string(),
            owner_id: "owner".to_string(),
            last_synced_at: 3,
        }
    }

    #[tokio::test]
    async fn test_list_by_farm_in_insertion_order() {
        let ctx = setup_store().await;
        let cameras = ctx.store.cameras();

        let batch = vec![camera("b", "farm"), camera("a", "farm"), camera("c", "farm")];
        cameras.insert_all(&batch).await.unwrap();

        assert_eq!(cameras.list_by_farm("farm").await.unwrap(), batch);
        assert!(cameras.list_by_farm("other").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let ctx = setup_store().await;
        let cameras = ctx.store.cameras();

        cameras.insert(&camera("a", "farm")).await.unwrap();
        let mut moved = camera("a", "farm");
        moved.stream_url = "rtsp://cams.local/new".to_string();
        assert!(cameras.update(&moved).await.unwrap());
        assert_eq!(cameras.get("a").await.unwrap(), Some(moved));

        assert_eq!(cameras.delete("a").await.unwrap(), 1);
        assert_eq!(cameras.delete("a").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_observe_by_farm_sees_farm_cascade() {
        let ctx = setup_store().await;
        let store = &ctx.store;

        store
            .farms()
            .insert(&CachedFarm {
                id: "farm".to_string(),
                name: "North".to_string(),
                latitude: 0.0,
                longitude: 0.0,
                address: String::new(),
                area: 1.0,
                species: "poultry".to_string(),
                owner_id: "owner".to_string(),
                last_synced_at: 3,
            })
            .await
            .unwrap();
        store.cameras().insert(&camera("a", "farm")).await.unwrap();
        let mut stream = store.cameras().observe_by_farm("farm");
        assert_eq!(stream.next().await.unwrap().unwrap().len(), 1);

        store.farms().delete("farm").await.unwrap();
        assert!(stream.next().await.unwrap().unwrap().is_empty());
    }
}
