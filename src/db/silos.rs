use sqlx::{SqliteConnection, SqlitePool};

use super::changes::{observe, Observed, Table};
use super::{LocalStore, StoreError};

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct CachedSilo {
    pub id: String,
    pub name: String,
    pub height: f64,
    pub diameter: f64,
    pub cone_height: f64,
    pub bottom_diameter: f64,
    pub shape: String,
    pub capacity: f64,
    pub fill_level: f64,
    pub material: Option<String>,
    pub farm_id: String,
    pub last_synced_at: i64,
}

pub struct SiloTable<'a> {
    store: &'a LocalStore,
}

impl<'a> SiloTable<'a> {
    pub(super) fn new(store: &'a LocalStore) -> Self {
        Self { store }
    }

    pub async fn get(&self, id: &str) -> Result<Option<CachedSilo>, StoreError> {
        let row = sqlx::query_as("SELECT * FROM silos WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.store.pool)
            .await?;
        Ok(row)
    }

    pub async fn list_by_farm(&self, farm_id: &str) -> Result<Vec<CachedSilo>, StoreError> {
        list_by_farm(&self.store.pool, farm_id).await
    }

    pub fn observe_by_farm(&self, farm_id: &str) -> Observed<CachedSilo> {
        let farm_id = farm_id.to_string();
        observe(
            self.store.pool.clone(),
            &self.store.changes,
            Table::Silos,
            move |pool| {
                let farm_id = farm_id.clone();
                async move { list_by_farm(&pool, &farm_id).await }
            },
        )
    }

    pub async fn insert(&self, silo: &CachedSilo) -> Result<(), StoreError> {
        let mut conn = self.store.pool.acquire().await?;
        upsert(&mut conn, silo).await?;
        self.store.notify(Table::Silos);
        Ok(())
    }

    pub async fn insert_all(&self, silos: &[CachedSilo]) -> Result<(), StoreError> {
        let mut tx = self.store.pool.begin().await?;
        for silo in silos {
            upsert(&mut tx, silo).await?;
        }
        tx.commit().await?;
        self.store.notify(Table::Silos);
        Ok(())
    }

    pub async fn update(&self, silo: &CachedSilo) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE silos
            SET name = ?, height = ?, diameter = ?, cone_height = ?, bottom_diameter = ?,
                shape = ?, capacity = ?, fill_level = ?, material = ?, farm_id = ?,
                last_synced_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&silo.name)
        .bind(silo.height)
        .bind(silo.diameter)
        .bind(silo.cone_height)
        .bind(silo.bottom_diameter)
        .bind(&silo.shape)
        .bind(silo.capacity)
        .bind(silo.fill_level)
        .bind(&silo.material)
        .bind(&silo.farm_id)
        .bind(silo.last_synced_at)
        .bind(&silo.id)
        .execute(&self.store.pool)
        .await?;

        let updated = result.rows_affected() > 0;
        if updated {
            self.store.notify(Table::Silos);
        }
        Ok(updated)
    }

    pub async fn delete(&self, id: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM silos WHERE id = ?")
            .bind(id)
            .execute(&self.store.pool)
            .await?;
        self.store.notify(Table::Silos);
        Ok(result.rows_affected())
    }

    pub async fn delete_by_farm(&self, farm_id: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM silos WHERE farm_id = ?")
            .bind(farm_id)
            .execute(&self.store.pool)
            .await?;
        self.store.notify(Table::Silos);
        Ok(result.rows_affected())
    }
}

async fn list_by_farm(pool: &SqlitePool, farm_id: &str) -> Result<Vec<CachedSilo>, StoreError> {
    let rows = sqlx::query_as("SELECT * FROM silos WHERE farm_id = ? ORDER BY rowid")
        .bind(farm_id)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

async fn upsert(conn: &mut SqliteConnection, silo: &CachedSilo) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO silos (id, name, height, diameter, cone_height, bottom_diameter, shape,
                           capacity, fill_level, material, farm_id, last_synced_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            height = excluded.height,
            diameter = excluded.diameter,
            cone_height = excluded.cone_height,
            bottom_diameter = excluded.bottom_diameter,
            shape = excluded.shape,
            capacity = excluded.capacity,
            fill_level = excluded.fill_level,
            material = excluded.material,
            farm_id = excluded.farm_id,
            last_synced_at = excluded.last_synced_at
        "#,
    )
    .bind(&silo.id)
    .bind(&silo.name)
    .bind(silo.height)
    .bind(silo.diameter)
    .bind(silo.cone_height)
    .bind(silo.bottom_diameter)
    .bind(&silo.shape)
    .bind(silo.capacity)
    .bind(silo.fill_level)
    .bind(&silo.material)
    .bind(&silo.farm_id)
    .bind(silo.last_synced_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
