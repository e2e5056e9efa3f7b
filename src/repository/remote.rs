//! Remote-then-local operations.
//!
//! Each call checks connectivity, performs the API request and, only when
//! it succeeds, writes the server's copy into the cache. A refresh replaces
//! the cached children of the parent it was asked about, so rows deleted on
//! the server disappear locally too.

use chrono::{DateTime, Utc};
use farmstead_core::{Camera, Credentials, Device, Farm, Owner, Silo, Weather};
use std::collections::HashSet;
use tracing::{debug, info};
use uuid::Uuid;

use super::{now_millis, CacheRow, Repository, RepositoryError};

/// Cached ids that the server no longer returns.
fn stale_ids<I>(cached: I, fresh: &[Uuid]) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let fresh: HashSet<String> = fresh.iter().map(Uuid::to_string).collect();
    cached
        .into_iter()
        .filter(|id| !fresh.contains(id))
        .collect()
}

impl Repository {
    pub async fn authenticate(&self, credentials: &Credentials) -> Result<Owner, RepositoryError> {
        self.ensure_online()?;
        let owner = self.api.authenticate(credentials).await?;
        self.insert_owner(&owner).await?;
        info!(email = %owner.email, "Authenticated");
        Ok(owner)
    }

    pub async fn register_owner(&self, owner: &Owner) -> Result<Owner, RepositoryError> {
        self.ensure_online()?;
        let created = self.api.register_owner(owner).await?;
        self.insert_owner(&created).await?;
        info!(email = %created.email, "Registered owner");
        Ok(created)
    }

    pub async fn save_owner(&self, owner_id: Uuid, owner: &Owner) -> Result<Owner, RepositoryError> {
        self.ensure_online()?;
        let saved = self.api.update_owner(owner_id, owner).await?;
        self.insert_owner(&saved).await?;
        Ok(saved)
    }

    pub async fn refresh_farms(&self, owner_id: Uuid) -> Result<Vec<Farm>, RepositoryError> {
        self.ensure_online()?;
        let farms = self.api.farms(owner_id).await?;

        let cached = self.store.farms().list_by_owner(&owner_id.to_string()).await?;
        let fresh: Vec<Uuid> = farms.iter().map(|f| f.id).collect();
        for id in stale_ids(cached.into_iter().map(|row| row.id), &fresh) {
            self.store.farms().delete(&id).await?;
        }
        self.insert_farms(&farms).await?;

        debug!(%owner_id, count = farms.len(), "Refreshed farms");
        Ok(farms)
    }

    pub async fn create_farm(&self, farm: &Farm) -> Result<Farm, RepositoryError> {
        self.ensure_online()?;
        let created = self.api.create_farm(farm.owner_id, farm).await?;
        self.insert_farm(&created).await?;
        info!(farm_id = %created.id, name = %created.name, "Created farm");
        Ok(created)
    }

    pub async fn save_farm(&self, farm: &Farm) -> Result<Farm, RepositoryError> {
        self.ensure_online()?;
        let saved = self.api.update_farm(farm).await?;
        self.insert_farm(&saved).await?;
        Ok(saved)
    }

    pub async fn remove_farm(&self, farm_id: Uuid) -> Result<(), RepositoryError> {
        self.ensure_online()?;
        self.api.delete_farm(farm_id).await?;
        self.delete_farm(farm_id).await?;
        info!(%farm_id, "Deleted farm");
        Ok(())
    }

    pub async fn refresh_devices(
        &self,
        owner_id: Uuid,
        farm_id: Uuid,
    ) -> Result<Vec<Device>, RepositoryError> {
        self.ensure_online()?;
        let devices = self.api.devices(owner_id, farm_id).await?;

        let cached = self.store.devices().list_by_farm(&farm_id.to_string()).await?;
        let fresh: Vec<Uuid> = devices.iter().map(|d| d.id).collect();
        for id in stale_ids(cached.into_iter().map(|row| row.id), &fresh) {
            self.store.devices().delete(&id).await?;
        }
        self.insert_devices(&devices).await?;

        debug!(%farm_id, count = devices.len(), "Refreshed devices");
        Ok(devices)
    }

    pub async fn create_device(&self, device: &Device) -> Result<Device, RepositoryError> {
        self.ensure_online()?;
        let created = self
            .api
            .create_device(device.owner_id, device.farm_id, device)
            .await?;
        self.insert_device(&created).await?;
        info!(device_id = %created.id, hardware_id = %created.hardware_id, "Created device");
        Ok(created)
    }

    pub async fn save_device(&self, device: &Device) -> Result<Device, RepositoryError> {
        self.ensure_online()?;
        let saved = self.api.update_device(device).await?;
        self.insert_device(&saved).await?;
        Ok(saved)
    }

    pub async fn remove_device(&self, device_id: Uuid) -> Result<(), RepositoryError> {
        self.ensure_online()?;
        self.api.delete_device(device_id).await?;
        self.delete_device(device_id).await?;
        info!(%device_id, "Deleted device");
        Ok(())
    }

    /// Fetch readings newer than the latest cached one and append them.
    /// Readings at exactly the latest cached instant are added only for
    /// sensors not already cached at that instant. Returns how many readings
    /// were added.
    pub async fn refresh_sensor_readings(&self, device_id: Uuid) -> Result<usize, RepositoryError> {
        self.ensure_online()?;

        let table = self.store.sensor_readings();
        let device_key = device_id.to_string();
        let latest = table.latest_captured_at(&device_key).await?;
        let since = latest.and_then(DateTime::<Utc>::from_timestamp_millis);

        let mut readings = self.api.sensor_readings(device_id, since).await?;
        if let Some(latest) = latest {
            let mut boundary = table.sensors_at(&device_key, latest).await?;
            readings.retain(|r| {
                let at = r.captured_at.timestamp_millis();
                if at != latest {
                    return at > latest;
                }
                match boundary.iter().position(|sensor| *sensor == r.sensor) {
                    Some(i) => {
                        boundary.swap_remove(i);
                        false
                    }
                    None => true,
                }
            });
        }

        let synced_at = now_millis();
        let rows: Vec<_> = readings.iter().map(|r| r.to_row(synced_at)).collect();
        table.insert_all(&rows).await?;

        debug!(%device_id, added = rows.len(), "Refreshed sensor readings");
        Ok(rows.len())
    }

    pub async fn refresh_silos(&self, farm_id: Uuid) -> Result<Vec<Silo>, RepositoryError> {
        self.ensure_online()?;
        let silos = self.api.silos(farm_id).await?;

        let cached = self.store.silos().list_by_farm(&farm_id.to_string()).await?;
        let fresh: Vec<Uuid> = silos.iter().map(|s| s.id).collect();
        for id in stale_ids(cached.into_iter().map(|row| row.id), &fresh) {
            self.store.silos().delete(&id).await?;
        }
        self.insert_silos(&silos).await?;

        debug!(%farm_id, count = silos.len(), "Refreshed silos");
        Ok(silos)
    }

    pub async fn create_silo(&self, silo: &Silo) -> Result<Silo, RepositoryError> {
        self.ensure_online()?;
        let created = self.api.create_silo(silo.farm_id, silo).await?;
        self.insert_silo(&created).await?;
        info!(silo_id = %created.id, name = %created.name, "Created silo");
        Ok(created)
    }

    pub async fn remove_silo(&self, silo_id: Uuid) -> Result<(), RepositoryError> {
        self.ensure_online()?;
        self.api.delete_silo(silo_id).await?;
        self.delete_silo(silo_id).await?;
        info!(%silo_id, "Deleted silo");
        Ok(())
    }

    pub async fn refresh_cameras(
        &self,
        farm_id: Uuid,
        owner_id: Uuid,
    ) -> Result<Vec<Camera>, RepositoryError> {
        self.ensure_online()?;
        let cameras = self.api.cameras(farm_id, owner_id).await?;

        let cached = self.store.cameras().list_by_farm(&farm_id.to_string()).await?;
        let fresh: Vec<Uuid> = cameras.iter().map(|c| c.id).collect();
        for id in stale_ids(cached.into_iter().map(|row| row.id), &fresh) {
            self.store.cameras().delete(&id).await?;
        }
        self.insert_cameras(&cameras).await?;

        debug!(%farm_id, count = cameras.len(), "Refreshed cameras");
        Ok(cameras)
    }

    pub async fn create_camera(&self, camera: &Camera) -> Result<Camera, RepositoryError> {
        self.ensure_online()?;
        let created = self
            .api
            .create_camera(camera.farm_id, camera.owner_id, camera)
            .await?;
        self.insert_camera(&created).await?;
        info!(camera_id = %created.id, name = %created.name, "Created camera");
        Ok(created)
    }

    pub async fn remove_camera(&self, camera_id: Uuid) -> Result<(), RepositoryError> {
        self.ensure_online()?;
        self.api.delete_camera(camera_id).await?;
        self.delete_camera(camera_id).await?;
        info!(%camera_id, "Deleted camera");
        Ok(())
    }

    /// Current weather for a farm. Never cached.
    pub async fn weather(&self, farm_id: Uuid) -> Result<Weather, RepositoryError> {
        self.ensure_online()?;
        Ok(self.api.weather(farm_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{setup_repository, spawn_server};
    use super::*;
    use axum::extract::{Path, Query};
    use axum::http::StatusCode;
    use axum::routing::{delete, get, post};
    use axum::{Json, Router};
    use chrono::Duration;
    use farmstead_core::{NetworkError, SensorReading, SiloShape, SpeciesCategory};
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_offline_skips_network() {
        // Nothing listens on this port; an attempted request would fail
        // with a network error instead of Offline.
        let ctx = setup_repository("http://127.0.0.1:9").await;
        ctx.connectivity.set_online(false);

        let result = ctx.repo.refresh_farms(Uuid::new_v4()).await;
        assert!(matches!(result, Err(RepositoryError::Offline)));

        let farm = Farm::new("North", SpeciesCategory::Swine, Uuid::new_v4());
        let result = ctx.repo.create_farm(&farm).await;
        assert!(matches!(result, Err(RepositoryError::Offline)));
        assert!(ctx.repo.farm(farm.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_refresh_farms_replaces_cached_set() {
        let owner_id = Uuid::new_v4();
        let kept = Farm::new("Kept", SpeciesCategory::Ruminant, owner_id);
        let added = Farm::new("Added", SpeciesCategory::Poultry, owner_id);
        let gone = Farm::new("Gone", SpeciesCategory::Other, owner_id);

        let remote = vec![kept.clone(), added.clone()];
        let router = Router::new().route(
            "/api/farms/{owner_id}",
            get(move || {
                let remote = remote.clone();
                async move { Json(remote) }
            }),
        );
        let ctx = setup_repository(&spawn_server(router).await).await;

        ctx.repo.insert_farms(&[gone.clone(), kept.clone()]).await.unwrap();
        ctx.repo
            .insert_silo(&Silo::new("Orphan", SiloShape::Conical, gone.id))
            .await
            .unwrap();

        let fetched = ctx.repo.refresh_farms(owner_id).await.unwrap();
        assert_eq!(fetched.len(), 2);

        let cached = ctx.repo.farms_snapshot(owner_id).await.unwrap();
        assert_eq!(cached, vec![kept, added]);
        assert!(ctx.repo.silos_snapshot(gone.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_farm_caches_server_copy() {
        let server_id = Uuid::new_v4();
        let router = Router::new().route(
            "/api/farms/{owner_id}",
            post(move |Json(mut farm): Json<Farm>| async move {
                farm.id = server_id;
                Json(farm)
            }),
        );
        let ctx = setup_repository(&spawn_server(router).await).await;

        let draft = Farm::new("Hillside", SpeciesCategory::Equine, Uuid::new_v4());
        let created = ctx.repo.create_farm(&draft).await.unwrap();

        assert_eq!(created.id, server_id);
        assert!(ctx.repo.farm(draft.id).await.unwrap().is_none());
        assert_eq!(ctx.repo.farm(server_id).await.unwrap(), Some(created));
    }

    #[tokio::test]
    async fn test_failed_remote_delete_keeps_cache() {
        let router = Router::new().route(
            "/api/farms/{farm_id}",
            delete(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        );
        let ctx = setup_repository(&spawn_server(router).await).await;

        let farm = Farm::new("Stays", SpeciesCategory::Swine, Uuid::new_v4());
        ctx.repo.insert_farm(&farm).await.unwrap();

        let result = ctx.repo.remove_farm(farm.id).await;
        assert!(matches!(
            result,
            Err(RepositoryError::Network(NetworkError::BadStatusCode(500)))
        ));
        assert!(ctx.repo.farm(farm.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_remove_device_deletes_cached_readings() {
        let router = Router::new().route("/api/devices/{device_id}", delete(|| async { "" }));
        let ctx = setup_repository(&spawn_server(router).await).await;

        let device = Device::new("hw-1", "Barn", Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        ctx.repo.insert_device(&device).await.unwrap();
        ctx.repo
            .insert_sensor_readings(&[SensorReading::new(device.id, "t", 1.0, Utc::now())])
            .await
            .unwrap();

        ctx.repo.remove_device(device.id).await.unwrap();
        assert!(ctx.repo.device(device.id).await.unwrap().is_none());
        assert!(ctx
            .repo
            .sensor_readings_snapshot(device.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_refresh_sensor_readings_appends_only_newer() {
        let router = Router::new().route(
            "/api/sensor-data/{device_id}",
            get(
                |Path(device_id): Path<Uuid>,
                 Query(params): Query<HashMap<String, String>>| async move {
                    let from: i64 = params
                        .get("from")
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(0);
                    // The server includes the boundary reading itself.
                    let readings: Vec<SensorReading> = [from, from + 1_000, from + 2_000]
                        .into_iter()
                        .map(|ms| {
                            let at = DateTime::from_timestamp_millis(ms).unwrap();
                            SensorReading::new(device_id, "temperature", 20.0, at)
                        })
                        .collect();
                    Json(readings)
                },
            ),
        );
        let ctx = setup_repository(&spawn_server(router).await).await;

        let device_id = Uuid::new_v4();
        let latest = Utc::now() - Duration::hours(1);
        let latest = DateTime::from_timestamp_millis(latest.timestamp_millis()).unwrap();
        ctx.repo
            .insert_sensor_readings(&[SensorReading::new(device_id, "temperature", 19.0, latest)])
            .await
            .unwrap();

        let added = ctx.repo.refresh_sensor_readings(device_id).await.unwrap();
        assert_eq!(added, 2);

        let cached = ctx.repo.sensor_readings_snapshot(device_id).await.unwrap();
        assert_eq!(cached.len(), 3);
        assert!(cached[0].captured_at > cached[1].captured_at);
        assert_eq!(cached[2].captured_at, latest);
    }

    #[tokio::test]
    async fn test_refresh_sensor_readings_keeps_other_sensors_at_boundary() {
        let router = Router::new().route(
            "/api/sensor-data/{device_id}",
            get(
                |Path(device_id): Path<Uuid>,
                 Query(params): Query<HashMap<String, String>>| async move {
                    let from: i64 = params
                        .get("from")
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(0);
                    let at = DateTime::from_timestamp_millis(from).unwrap();
                    Json(vec![
                        SensorReading::new(device_id, "temperature", 19.0, at),
                        SensorReading::new(device_id, "humidity", 64.0, at),
                    ])
                },
            ),
        );
        let ctx = setup_repository(&spawn_server(router).await).await;

        let device_id = Uuid::new_v4();
        let latest = Utc::now() - Duration::minutes(5);
        let latest = DateTime::from_timestamp_millis(latest.timestamp_millis()).unwrap();
        ctx.repo
            .insert_sensor_readings(&[SensorReading::new(device_id, "temperature", 19.0, latest)])
            .await
            .unwrap();

        assert_eq!(ctx.repo.refresh_sensor_readings(device_id).await.unwrap(), 1);
        // A second pass finds both boundary sensors cached.
        assert_eq!(ctx.repo.refresh_sensor_readings(device_id).await.unwrap(), 0);

        let mut sensors: Vec<String> = ctx
            .repo
            .sensor_readings_snapshot(device_id)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.sensor)
            .collect();
        sensors.sort();
        assert_eq!(sensors, vec!["humidity", "temperature"]);
    }

    #[tokio::test]
    async fn test_create_camera_and_refresh() {
        let farm_id = Uuid::new_v4();
        let owner_id = Uuid::new_v4();
        let router = Router::new().route(
            "/api/cameras/{farm_id}/{owner_id}",
            post(|Json(camera): Json<Camera>| async move { Json(camera) })
                .get(|| async { Json(Vec::<Camera>::new()) }),
        );
        let ctx = setup_repository(&spawn_server(router).await).await;

        let camera = Camera::new("Gate", "rtsp://gate", farm_id, owner_id);
        ctx.repo.create_camera(&camera).await.unwrap();
        assert_eq!(ctx.repo.cameras_snapshot(farm_id).await.unwrap(), vec![camera]);

        // The server has since forgotten it.
        ctx.repo.refresh_cameras(farm_id, owner_id).await.unwrap();
        assert!(ctx.repo.cameras_snapshot(farm_id).await.unwrap().is_empty());
    }

    #[test]
    fn test_stale_ids() {
        let keep = Uuid::new_v4();
        let drop = Uuid::new_v4();
        let stale = stale_ids(vec![keep.to_string(), drop.to_string()], &[keep]);
        assert_eq!(stale, vec![drop.to_string()]);
    }
}
