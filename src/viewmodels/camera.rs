use farmstead_core::Camera;
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

use super::{Scope, StatePublisher, UiState};
use crate::repository::Repository;

pub struct CameraViewModel {
    repository: Repository,
    farm_id: Uuid,
    owner_id: Uuid,
    state: Arc<StatePublisher<Vec<Camera>>>,
    scope: Scope,
}

impl CameraViewModel {
    pub fn new(repository: Repository, farm_id: Uuid, owner_id: Uuid) -> Self {
        Self {
            repository,
            farm_id,
            owner_id,
            state: Arc::new(StatePublisher::new(Vec::new())),
            scope: Scope::default(),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<UiState<Vec<Camera>>> {
        self.state.subscribe()
    }

    pub fn state(&self) -> UiState<Vec<Camera>> {
        self.state.current()
    }

    pub fn watch(&self) {
        self.scope
            .follow(self.state.clone(), self.repository.cameras(self.farm_id));
    }

    pub async fn load(&self) -> bool {
        let Some(cached) = self
            .state
            .track(self.repository.cameras_snapshot(self.farm_id))
            .await
        else {
            return false;
        };
        self.state.set_data(cached);

        self.state
            .refresh(self.repository.refresh_cameras(self.farm_id, self.owner_id))
            .await;
        !self.state.current().is_error
    }

    pub async fn add(&self, camera: &Camera) -> Option<Camera> {
        let created = self.state.track(self.repository.create_camera(camera)).await?;
        self.state.update(|cameras| cameras.push(created.clone()));
        Some(created)
    }

    pub async fn delete(&self, camera_id: Uuid) -> bool {
        if self
            .state
            .track(self.repository.remove_camera(camera_id))
            .await
            .is_none()
        {
            return false;
        }
        self.state.update(|cameras| cameras.retain(|c| c.id != camera_id));
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

    #[tokio::test]
    async fn test_load_and_delete() {
        let (farm_id, owner_id) = (Uuid::new_v4(), Uuid::new_v4());
        let gate = Camera::new("Gate", "rtsp://10.0.0.5/gate", farm_id, owner_id);
        let served = vec![gate.clone()];
        let router = Router::new()
            .route(
                "/api/cameras/{farm_id}/{owner_id}",
                get(move || {
                    let served = served.clone();
                    async move { Json(served) }
                }),
            )
            .route(
                "/api/cameras/{camera_id}",
                delete(|| async { StatusCode::NO_CONTENT }),
            );
        let ctx = setup_repository(&spawn_server(router).await).await;
        let vm = CameraViewModel::new(ctx.repo.clone(), farm_id, owner_id);

        assert!(vm.load().await);
        assert_eq!(vm.state().data, vec![gate.clone()]);

        assert!(vm.delete(gate.id).await);
        assert!(vm.state().data.is_empty());
        assert!(ctx.repo.camera(gate.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_add_offline_fails() {
        let ctx = setup_repository("http://127.0.0.1:9").await;
        ctx.connectivity.set_online(false);
        let (farm_id, owner_id) = (Uuid::new_v4(), Uuid::new_v4());
        let vm = CameraViewModel::new(ctx.repo.clone(), farm_id, owner_id);

        let camera = Camera::new("Barn", "rtsp://10.0.0.6/barn", farm_id, owner_id);
        assert!(vm.add(&camera).await.is_none());

        let state = vm.state();
        assert!(state.is_error);
        assert!(state.data.is_empty());
    }
}
