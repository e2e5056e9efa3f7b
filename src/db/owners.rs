use sqlx::SqliteConnection;

use super::changes::Table;
use super::farms::{notify_cascade, purge_farms};
use super::{LocalStore, StoreError};

/// Owner row with its settings flattened into columns.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct CachedOwner {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password: String,
    pub birthday: Option<i64>,
    pub language: String,
    pub currency: String,
    pub unit_system: String,
    pub use_averages: bool,
    pub is_free_tier: bool,
    pub parent_id: Option<String>,
    pub role_id: Option<String>,
    pub last_synced_at: i64,
}

pub struct OwnerTable<'a> {
    store: &'a LocalStore,
}

impl<'a> OwnerTable<'a> {
    pub(super) fn new(store: &'a LocalStore) -> Self {
        Self { store }
    }

    pub async fn get(&self, id: &str) -> Result<Option<CachedOwner>, StoreError> {
        let row = sqlx::query_as("SELECT * FROM owners WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.store.pool)
            .await?;
        Ok(row)
    }

    /// Sub-accounts of a parent owner.
    pub async fn list_by_parent(&self, parent_id: &str) -> Result<Vec<CachedOwner>, StoreError> {
        let rows = sqlx::query_as("SELECT * FROM owners WHERE parent_id = ? ORDER BY rowid")
            .bind(parent_id)
            .fetch_all(&self.store.pool)
            .await?;
        Ok(rows)
    }

    pub async fn insert(&self, owner: &CachedOwner) -> Result<(), StoreError> {
        let mut conn = self.store.pool.acquire().await?;
        upsert(&mut conn, owner).await?;
        self.store.notify(Table::Owners);
        Ok(())
    }

    pub async fn update(&self, owner: &CachedOwner) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE owners
            SET name = ?, email = ?, password = ?, birthday = ?, language = ?, currency = ?,
                unit_system = ?, use_averages = ?, is_free_tier = ?, parent_id = ?, role_id = ?,
                last_synced_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&owner.name)
        .bind(&owner.email)
        .bind(&owner.password)
        .bind(owner.birthday)
        .bind(&owner.language)
        .bind(&owner.currency)
        .bind(&owner.unit_system)
        .bind(owner.use_averages)
        .bind(owner.is_free_tier)
        .bind(&owner.parent_id)
        .bind(&owner.role_id)
        .bind(owner.last_synced_at)
        .bind(&owner.id)
        .execute(&self.store.pool)
        .await?;

        let updated = result.rows_affected() > 0;
        if updated {
            self.store.notify(Table::Owners);
        }
        Ok(updated)
    }

    /// Delete an owner and every farm cached under it.
    pub async fn delete(&self, id: &str) -> Result<u64, StoreError> {
        let mut tx = self.store.pool.begin().await?;
        purge_farms(&mut tx, "owner_id = ?", id).await?;
        sqlx::query("DELETE FROM cameras WHERE owner_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM owners WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        notify_cascade(self.store);
        self.store.notify(Table::Owners);
        Ok(result.rows_affected())
    }
}

async fn upsert(conn: &mut SqliteConnection, owner: &CachedOwner) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO owners (id, name, email, password, birthday, language, currency, unit_system,
                            use_averages, is_free_tier, parent_id, role_id, last_synced_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            email = excluded.email,
            password = excluded.password,
            birthday = excluded.birthday,
            language = excluded.language,
            currency = excluded.currency,
            unit_system = excluded.unit_system,
            use_averages = excluded.use_averages,
            is_free_tier = excluded.is_free_tier,
            parent_id = excluded.parent_id,
            role_id = excluded.role_id,
            last_synced_at = excluded.last_synced_at
        "#,
    )
    .bind(&owner.id)
    .bind(&owner.name)
    .bind(&owner.email)
    .bind(&owner.password)
    .bind(owner.birthday)
    .bind(&owner.language)
    .bind(&owner.currency)
    .bind(&owner.unit_system)
    .bind(owner.use_averages)
    .bind(owner.is_free_tier)
    .bind(&owner.parent_id)
    .bind(&owner.role_id)
    .bind(owner.last_synced_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
