use farmstead_core::Farm;
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

use super::{Scope, StatePublisher, UiState};
use crate::repository::Repository;

/// The logged-in owner's farms.
pub struct FarmViewModel {
    repository: Repository,
    owner_id: Uuid,
    state: Arc<StatePublisher<Vec<Farm>>>,
    scope: Scope,
}

impl FarmViewModel {
    pub fn new(repository: Repository, owner_id: Uuid) -> Self {
        Self {
            repository,
            owner_id,
            state: Arc::new(StatePublisher::new(Vec::new())),
            scope: Scope::default(),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<UiState<Vec<Farm>>> {
        self.state.subscribe()
    }

    pub fn state(&self) -> UiState<Vec<Farm>> {
        self.state.current()
    }

    /// Keep the state in step with the cache for as long as this
    /// view-model lives.
    pub fn watch(&self) {
        self.scope
            .follow(self.state.clone(), self.repository.farms(self.owner_id));
    }

    /// Publish the cached farms, then refresh them from the server.
    pub async fn load(&self) -> bool {
        let Some(cached) = self
            .state
            .track(self.repository.farms_snapshot(self.owner_id))
            .await
        else {
            return false;
        };
        self.state.set_data(cached);

        self.state
            .refresh(self.repository.refresh_farms(self.owner_id))
            .await;
        !self.state.current().is_error
    }

    pub async fn farm(&self, farm_id: Uuid) -> Option<Farm> {
        self.state.track(self.repository.farm(farm_id)).await.flatten()
    }

    pub async fn create(&self, farm: &Farm) -> Option<Farm> {
        let created = self.state.track(self.repository.create_farm(farm)).await?;
        self.state.update(|farms| farms.push(created.clone()));
        Some(created)
    }

    pub async fn save(&self, farm: &Farm) -> Option<Farm> {
        let saved = self.state.track(self.repository.save_farm(farm)).await?;
        self.state.update(|farms| {
            if let Some(existing) = farms.iter_mut().find(|f| f.id == saved.id) {
                *existing = saved.clone();
            }
        });
        Some(saved)
    }

    pub async fn delete(&self, farm_id: Uuid) -> bool {
        if self
            .state
            .track(self.repository.remove_farm(farm_id))
            .await
            .is_none()
        {
            return false;
        }
        self.state.update(|farms| farms.retain(|f| f.id != farm_id));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{setup_repository, spawn_server};
    use axum::http::StatusCode;
    use axum::routing::{delete, get};
    use axum::{Json, Router};
    use farmstead_core::SpeciesCategory;
    use std::time::Duration;

    #[tokio::test]
    async fn test_load_refreshes_from_server() {
        let owner_id = Uuid::new_v4();
        let remote = vec![
            Farm::new("East", SpeciesCategory::Ruminant, owner_id),
            Farm::new("West", SpeciesCategory::Poultry, owner_id),
        ];
        let served = remote.clone();
        let router = Router::new().route(
            "/api/farms/{owner_id}",
            get(move || {
                let served = served.clone();
                async move { Json(served) }
            }),
        );
        let ctx = setup_repository(&spawn_server(router).await).await;
        let vm = FarmViewModel::new(ctx.repo.clone(), owner_id);

        assert!(vm.load().await);
        let state = vm.state();
        assert_eq!(state.data, remote);
        assert!(!state.is_loading);
        assert_eq!(ctx.repo.farms_snapshot(owner_id).await.unwrap(), remote);
    }

    #[tokio::test]
    async fn test_load_offline_shows_cache() {
        let ctx = setup_repository("http://127.0.0.1:9").await;
        ctx.connectivity.set_online(false);
        let owner_id = Uuid::new_v4();
        let cached = Farm::new("Cached", SpeciesCategory::Swine, owner_id);
        ctx.repo.insert_farm(&cached).await.unwrap();

        let vm = FarmViewModel::new(ctx.repo.clone(), owner_id);
        assert!(vm.load().await);

        let state = vm.state();
        assert_eq!(state.data, vec![cached]);
        assert!(!state.is_error);
    }

    #[tokio::test]
    async fn test_server_error_keeps_cache_and_flags_error() {
        let router = Router::new().route(
            "/api/farms/{owner_id}",
            get(|| async { StatusCode::SERVICE_UNAVAILABLE }),
        );
        let ctx = setup_repository(&spawn_server(router).await).await;
        let owner_id = Uuid::new_v4();
        let cached = Farm::new("Cached", SpeciesCategory::Equine, owner_id);
        ctx.repo.insert_farm(&cached).await.unwrap();

        let vm = FarmViewModel::new(ctx.repo.clone(), owner_id);
        assert!(!vm.load().await);

        let state = vm.state();
        assert_eq!(state.data, vec![cached]);
        assert!(state.is_error);
        assert!(state.error_message.unwrap().contains("503"));
    }

    #[tokio::test]
    async fn test_delete_failure_is_reported() {
        let router = Router::new().route(
            "/api/farms/{farm_id}",
            delete(|| async { StatusCode::NOT_FOUND }),
        );
        let ctx = setup_repository(&spawn_server(router).await).await;
        let vm = FarmViewModel::new(ctx.repo.clone(), Uuid::new_v4());

        assert!(!vm.delete(Uuid::new_v4()).await);
        assert!(vm.state().error_message.unwrap().contains("Not found"));
    }

    #[tokio::test]
    async fn test_watch_follows_cache() {
        let ctx = setup_repository("http://127.0.0.1:9").await;
        let owner_id = Uuid::new_v4();
        let vm = FarmViewModel::new(ctx.repo.clone(), owner_id);
        let mut rx = vm.subscribe();
        vm.watch();

        let farm = Farm::new("Live", SpeciesCategory::Other, owner_id);
        ctx.repo.insert_farm(&farm).await.unwrap();

        let seen = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                rx.changed().await.unwrap();
                if rx.borrow().data.len() == 1 {
                    break rx.borrow().data.clone();
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(seen, vec![farm]);
    }
}
