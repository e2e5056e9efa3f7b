use farmstead_core::Weather;
use tokio::sync::watch;
use uuid::Uuid;

use super::{StatePublisher, UiState};
use crate::repository::Repository;

/// Live conditions for one farm. Nothing here is cached, so it only works
/// online.
pub struct WeatherViewModel {
    repository: Repository,
    farm_id: Uuid,
    state: StatePublisher<Option<Weather>>,
}

impl WeatherViewModel {
    pub fn new(repository: Repository, farm_id: Uuid) -> Self {
        Self {
            repository,
            farm_id,
            state: StatePublisher::new(None),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<UiState<Option<Weather>>> {
        self.state.subscribe()
    }

    pub fn state(&self) -> UiState<Option<Weather>> {
        self.state.current()
    }

    pub async fn load(&self) -> Option<Weather> {
        let weather = self.state.track(self.repository.weather(self.farm_id)).await?;
        self.state.set_data(Some(weather.clone()));
        Some(weather)
    }
}
