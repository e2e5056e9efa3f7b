use farmstead_core::{Device, SensorReading};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;

use super::{Scope, StatePublisher, UiState};
use crate::repository::{Repository, RepositoryError};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReadingsState {
    pub device_id: Option<Uuid>,
    pub readings: Vec<SensorReading>,
}

/// Devices of one farm and the readings of a selected device.
pub struct DeviceViewModel {
    repository: Repository,
    owner_id: Uuid,
    farm_id: Uuid,
    state: Arc<StatePublisher<Vec<Device>>>,
    readings: StatePublisher<ReadingsState>,
    scope: Scope,
}

impl DeviceViewModel {
    pub fn new(repository: Repository, owner_id: Uuid, farm_id: Uuid) -> Self {
        Self {
            repository,
            owner_id,
            farm_id,
            state: Arc::new(StatePublisher::new(Vec::new())),
            readings: StatePublisher::new(ReadingsState::default()),
            scope: Scope::default(),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<UiState<Vec<Device>>> {
        self.state.subscribe()
    }

    pub fn state(&self) -> UiState<Vec<Device>> {
        self.state.current()
    }

    pub fn readings_state(&self) -> UiState<ReadingsState> {
        self.readings.current()
    }

    pub fn subscribe_readings(&self) -> watch::Receiver<UiState<ReadingsState>> {
        self.readings.subscribe()
    }

    pub fn watch(&self) {
        self.scope
            .follow(self.state.clone(), self.repository.devices(self.farm_id));
    }

    pub async fn load(&self) -> bool {
        let Some(cached) = self
            .state
            .track(self.repository.devices_snapshot(self.farm_id))
            .await
        else {
            return false;
        };
        self.state.set_data(cached);

        self.state
            .refresh(self.repository.refresh_devices(self.owner_id, self.farm_id))
            .await;
        !self.state.current().is_error
    }

    pub async fn add(&self, device: &Device) -> Option<Device> {
        let created = self.state.track(self.repository.create_device(device)).await?;
        self.state.update(|devices| devices.push(created.clone()));
        Some(created)
    }

    pub async fn save(&self, device: &Device) -> Option<Device> {
        let saved = self.state.track(self.repository.save_device(device)).await?;
        self.state.update(|devices| {
            if let Some(existing) = devices.iter_mut().find(|d| d.id == saved.id) {
                *existing = saved.clone();
            }
        });
        Some(saved)
    }

    /// Rename a cached device on the server.
    pub async fn rename(&self, device_id: Uuid, name: &str) -> Option<Device> {
        let mut device = match self.state.track(self.repository.device(device_id)).await? {
            Some(device) => device,
            None => {
                self.state
                    .fail(format!("Device {} is not in the local cache.", device_id));
                return None;
            }
        };
        device.name = name.to_string();
        self.save(&device).await
    }

    pub async fn delete(&self, device_id: Uuid) -> bool {
        if self
            .state
            .track(self.repository.remove_device(device_id))
            .await
            .is_none()
        {
            return false;
        }
        self.state.update(|devices| devices.retain(|d| d.id != device_id));
        true
    }

    /// Pull new readings for `device_id` when online, then publish the
    /// cached history, newest first.
    pub async fn load_readings(&self, device_id: Uuid) -> bool {
        let repository = &self.repository;
        let fetched = self
            .readings
            .refresh(async {
                let added = repository.refresh_sensor_readings(device_id).await?;
                debug!(%device_id, added, "Fetched sensor readings");
                Ok::<_, RepositoryError>(ReadingsState {
                    device_id: Some(device_id),
                    readings: repository.sensor_readings_snapshot(device_id).await?,
                })
            })
            .await;
        if fetched.is_some() {
            return true;
        }
        if self.readings.current().is_error {
            return false;
        }

        // Offline: the cache is all there is.
        let Some(readings) = self
            .readings
            .track(repository.sensor_readings_snapshot(device_id))
            .await
        else {
            return false;
        };
        self.readings.set_data(ReadingsState {
            device_id: Some(device_id),
            readings,
        });
        true
    }
}
