//! Single mediation point between the local cache and the remote API.
//!
//! Reads are local-first and never fall back to the network. Plain
//! mutations (`insert_*`, `update_*`, `delete_*`) touch the cache only; the
//! remote-then-local operations live in [`remote`](self) and are the ones
//! view-models call.

mod mapping;
mod remote;

pub use mapping::{from_rows, owner_from_row, owner_to_row, to_rows, CacheRow};

use chrono::{Duration, Utc};
use farmstead_core::{ApiClient, Camera, Device, Farm, NetworkError, Owner, SensorReading, Silo};
use futures::stream::{BoxStream, StreamExt};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::connectivity::{is_online, Connectivity};
use crate::db::{LocalStore, Observed, StoreError};

/// How long sensor readings are kept in the cache, in days.
pub const DEFAULT_RETENTION_DAYS: i64 = 30;

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Local store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error("No network connection")]
    Offline,
}

/// Live list of entities, re-emitted whenever the underlying table changes.
pub type EntityStream<T> = BoxStream<'static, Result<Vec<T>, RepositoryError>>;

#[derive(Clone)]
pub struct Repository {
    store: LocalStore,
    api: ApiClient,
    connectivity: Arc<dyn Connectivity>,
}

impl Repository {
    pub fn new(store: LocalStore, api: ApiClient, connectivity: Arc<dyn Connectivity>) -> Self {
        Self {
            store,
            api,
            connectivity,
        }
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn is_online(&self) -> bool {
        is_online(self.connectivity.as_ref())
    }

    fn ensure_online(&self) -> Result<(), RepositoryError> {
        if self.is_online() {
            Ok(())
        } else {
            debug!("Skipping remote call while offline");
            Err(RepositoryError::Offline)
        }
    }

    // Local reads

    pub async fn owner(&self, id: Uuid) -> Result<Option<Owner>, RepositoryError> {
        let row = self.store.owners().get(&id.to_string()).await?;
        Ok(row.and_then(owner_from_row))
    }

    pub async fn farm(&self, id: Uuid) -> Result<Option<Farm>, RepositoryError> {
        let row = self.store.farms().get(&id.to_string()).await?;
        Ok(row.and_then(Farm::from_row))
    }

    pub async fn device(&self, id: Uuid) -> Result<Option<Device>, RepositoryError> {
        let row = self.store.devices().get(&id.to_string()).await?;
        Ok(row.and_then(Device::from_row))
    }

    pub async fn silo(&self, id: Uuid) -> Result<Option<Silo>, RepositoryError> {
        let row = self.store.silos().get(&id.to_string()).await?;
        Ok(row.and_then(Silo::from_row))
    }

    pub async fn camera(&self, id: Uuid) -> Result<Option<Camera>, RepositoryError> {
        let row = self.store.cameras().get(&id.to_string()).await?;
        Ok(row.and_then(Camera::from_row))
    }

    // Live lists

    pub fn farms(&self, owner_id: Uuid) -> EntityStream<Farm> {
        entities(self.store.farms().observe_by_owner(&owner_id.to_string()))
    }

    pub fn devices(&self, farm_id: Uuid) -> EntityStream<Device> {
        entities(self.store.devices().observe_by_farm(&farm_id.to_string()))
    }

    pub fn devices_for_owner(&self, owner_id: Uuid) -> EntityStream<Device> {
        entities(self.store.devices().observe_by_owner(&owner_id.to_string()))
    }

    /// Readings for a device, newest first.
    pub fn sensor_readings(&self, device_id: Uuid) -> EntityStream<SensorReading> {
        entities(
            self.store
                .sensor_readings()
                .observe_by_device(&device_id.to_string()),
        )
    }

    pub fn silos(&self, farm_id: Uuid) -> EntityStream<Silo> {
        entities(self.store.silos().observe_by_farm(&farm_id.to_string()))
    }

    pub fn cameras(&self, farm_id: Uuid) -> EntityStream<Camera> {
        entities(self.store.cameras().observe_by_farm(&farm_id.to_string()))
    }

    // Snapshots

    pub async fn farms_snapshot(&self, owner_id: Uuid) -> Result<Vec<Farm>, RepositoryError> {
        let rows = self.store.farms().list_by_owner(&owner_id.to_string()).await?;
        Ok(from_rows(rows))
    }

    pub async fn devices_snapshot(&self, farm_id: Uuid) -> Result<Vec<Device>, RepositoryError> {
        let rows = self.store.devices().list_by_farm(&farm_id.to_string()).await?;
        Ok(from_rows(rows))
    }

    pub async fn devices_for_owner_snapshot(
        &self,
        owner_id: Uuid,
    ) -> Result<Vec<Device>, RepositoryError> {
        let rows = self
            .store
            .devices()
            .list_by_owner(&owner_id.to_string())
            .await?;
        Ok(from_rows(rows))
    }

    pub async fn sensor_readings_snapshot(
        &self,
        device_id: Uuid,
    ) -> Result<Vec<SensorReading>, RepositoryError> {
        let rows = self
            .store
            .sensor_readings()
            .list_by_device(&device_id.to_string())
            .await?;
        Ok(from_rows(rows))
    }

    pub async fn silos_snapshot(&self, farm_id: Uuid) -> Result<Vec<Silo>, RepositoryError> {
        let rows = self.store.silos().list_by_farm(&farm_id.to_string()).await?;
        Ok(from_rows(rows))
    }

    pub async fn cameras_snapshot(&self, farm_id: Uuid) -> Result<Vec<Camera>, RepositoryError> {
        let rows = self.store.cameras().list_by_farm(&farm_id.to_string()).await?;
        Ok(from_rows(rows))
    }

    // Local mutations

    /// Cache an owner. Owners without a server-assigned id are not cached.
    pub async fn insert_owner(&self, owner: &Owner) -> Result<bool, RepositoryError> {
        match owner_to_row(owner, now_millis()) {
            Some(row) => {
                self.store.owners().insert(&row).await?;
                Ok(true)
            }
            None => {
                debug!(email = %owner.email, "Owner has no id yet; not cached");
                Ok(false)
            }
        }
    }

    pub async fn update_owner(&self, owner: &Owner) -> Result<bool, RepositoryError> {
        let Some(row) = owner_to_row(owner, now_millis()) else {
            return Ok(false);
        };
        Ok(self.store.owners().update(&row).await?)
    }

    pub async fn delete_owner(&self, id: Uuid) -> Result<u64, RepositoryError> {
        Ok(self.store.owners().delete(&id.to_string()).await?)
    }

    pub async fn insert_farm(&self, farm: &Farm) -> Result<(), RepositoryError> {
        Ok(self.store.farms().insert(&farm.to_row(now_millis())).await?)
    }

    pub async fn insert_farms(&self, farms: &[Farm]) -> Result<(), RepositoryError> {
        Ok(self.store.farms().insert_all(&to_rows(farms, now_millis())).await?)
    }

    pub async fn update_farm(&self, farm: &Farm) -> Result<bool, RepositoryError> {
        Ok(self.store.farms().update(&farm.to_row(now_millis())).await?)
    }

    /// Delete a cached farm with its devices, readings, silos and cameras.
    pub async fn delete_farm(&self, id: Uuid) -> Result<u64, RepositoryError> {
        Ok(self.store.farms().delete(&id.to_string()).await?)
    }

    pub async fn insert_device(&self, device: &Device) -> Result<(), RepositoryError> {
        Ok(self.store.devices().insert(&device.to_row(now_millis())).await?)
    }

    pub async fn insert_devices(&self, devices: &[Device]) -> Result<(), RepositoryError> {
        Ok(self
            .store
            .devices()
            .insert_all(&to_rows(devices, now_millis()))
            .await?)
    }

    pub async fn update_device(&self, device: &Device) -> Result<bool, RepositoryError> {
        Ok(self.store.devices().update(&device.to_row(now_millis())).await?)
    }

    pub async fn delete_device(&self, id: Uuid) -> Result<u64, RepositoryError> {
        Ok(self.store.devices().delete(&id.to_string()).await?)
    }

    pub async fn insert_sensor_readings(
        &self,
        readings: &[SensorReading],
    ) -> Result<(), RepositoryError> {
        Ok(self
            .store
            .sensor_readings()
            .insert_all(&to_rows(readings, now_millis()))
            .await?)
    }

    pub async fn delete_sensor_readings(&self, device_id: Uuid) -> Result<u64, RepositoryError> {
        Ok(self
            .store
            .sensor_readings()
            .delete_by_device(&device_id.to_string())
            .await?)
    }

    pub async fn insert_silo(&self, silo: &Silo) -> Result<(), RepositoryError> {
        Ok(self.store.silos().insert(&silo.to_row(now_millis())).await?)
    }

    pub async fn insert_silos(&self, silos: &[Silo]) -> Result<(), RepositoryError> {
        Ok(self.store.silos().insert_all(&to_rows(silos, now_millis())).await?)
    }

    pub async fn update_silo(&self, silo: &Silo) -> Result<bool, RepositoryError> {
        Ok(self.store.silos().update(&silo.to_row(now_millis())).await?)
    }

    pub async fn delete_silo(&self, id: Uuid) -> Result<u64, RepositoryError> {
        Ok(self.store.silos().delete(&id.to_string()).await?)
    }

    pub async fn insert_camera(&self, camera: &Camera) -> Result<(), RepositoryError> {
        Ok(self.store.cameras().insert(&camera.to_row(now_millis())).await?)
    }

    pub async fn insert_cameras(&self, cameras: &[Camera]) -> Result<(), RepositoryError> {
        Ok(self
            .store
            .cameras()
            .insert_all(&to_rows(cameras, now_millis()))
            .await?)
    }

    pub async fn update_camera(&self, camera: &Camera) -> Result<bool, RepositoryError> {
        Ok(self.store.cameras().update(&camera.to_row(now_millis())).await?)
    }

    pub async fn delete_camera(&self, id: Uuid) -> Result<u64, RepositoryError> {
        Ok(self.store.cameras().delete(&id.to_string()).await?)
    }

    /// Drop sensor readings captured more than `days` days ago. A window
    /// reaching past the earliest representable time prunes nothing.
    pub async fn clean_old_sensor_data(&self, days: i64) -> Result<u64, RepositoryError> {
        let cutoff = Duration::try_days(days)
            .and_then(|window| Utc::now().checked_sub_signed(window))
            .map_or(i64::MIN, |cutoff| cutoff.timestamp_millis());
        let pruned = self
            .store
            .sensor_readings()
            .prune_older_than(cutoff)
            .await?;
        info!(days, pruned, "Pruned old sensor readings");
        Ok(pruned)
    }
}

fn entities<T>(rows: Observed<T::Row>) -> EntityStream<T>
where
    T: CacheRow + Send + 'static,
    T::Row: Send + 'static,
{
    rows.map(|batch| batch.map(from_rows::<T>).map_err(RepositoryError::from))
        .boxed()
}

pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
