use farmstead_core::{Credentials, Owner};
use tokio::sync::watch;
use tracing::{info, warn};

use super::{StatePublisher, UiState};
use crate::repository::Repository;
use crate::session::{Session, SessionStore};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AuthState {
    pub current_user: Option<Owner>,
    pub is_logged_in: bool,
}

impl From<Session> for AuthState {
    fn from(session: Session) -> Self {
        Self {
            current_user: session.current_user,
            is_logged_in: session.is_logged_in,
        }
    }
}

/// Login, registration and the persisted session.
pub struct AuthViewModel {
    repository: Repository,
    session: SessionStore,
    state: StatePublisher<AuthState>,
}

impl AuthViewModel {
    pub fn new(repository: Repository, session: SessionStore) -> Self {
        Self {
            repository,
            session,
            state: StatePublisher::new(AuthState::default()),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<UiState<AuthState>> {
        self.state.subscribe()
    }

    pub fn state(&self) -> UiState<AuthState> {
        self.state.current()
    }

    pub fn current_user(&self) -> Option<Owner> {
        let state = self.state.current();
        if state.data.is_logged_in {
            state.data.current_user
        } else {
            None
        }
    }

    /// Load the persisted session. Never fails.
    pub fn restore(&self) -> Option<Owner> {
        let session = self.session.restore();
        let user = session.user().cloned();
        self.state.set_data(session.into());
        user
    }

    pub async fn login(&self, email: &str, password: &str) -> Option<Owner> {
        let credentials = Credentials::new(email, password);
        let owner = self
            .state
            .track(self.repository.authenticate(&credentials))
            .await?;
        self.persist(owner)
    }

    /// Create the account on the server, then log in as it.
    pub async fn register(&self, owner: &Owner) -> Option<Owner> {
        let created = self
            .state
            .track(self.repository.register_owner(owner))
            .await?;
        self.persist(created)
    }

    /// Push profile or settings changes for the logged-in user.
    pub async fn save_profile(&self, owner: &Owner) -> Option<Owner> {
        let Some(owner_id) = owner.id.or_else(|| self.current_user().and_then(|u| u.id)) else {
            self.state.fail("No user is logged in.".to_string());
            return None;
        };
        let saved = self
            .state
            .track(self.repository.save_owner(owner_id, owner))
            .await?;
        self.persist(saved)
    }

    pub fn logout(&self) -> bool {
        if let Err(e) = self.session.clear() {
            warn!(error = %e, "Failed to clear session");
            self.state.fail(format!("Could not clear the saved session: {}", e));
            return false;
        }
        self.state.set_data(AuthState::default());
        info!("Logged out");
        true
    }

    fn persist(&self, owner: Owner) -> Option<Owner> {
        let session = Session::logged_in(owner.clone());
        if let Err(e) = self.session.save(&session) {
            warn!(error = %e, "Failed to save session");
            self.state.fail(format!("Could not save the session: {}", e));
            return None;
        }
        self.state.set_data(session.into());
        Some(owner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{setup_repository, spawn_server};
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use tempfile::tempdir;
    use uuid::Uuid;

    fn auth_router(owner_id: Uuid) -> Router {
        Router::new()
            .route(
                "/api/owner/authenticate",
                post(move |Json(body): Json<serde_json::Value>| async move {
                    if body["password"] == "secret" {
                        let owner = Owner::new("Rui", "rui@example.com", "hashed").with_id(owner_id);
                        Ok(Json(owner))
                    } else {
                        Err(StatusCode::UNAUTHORIZED)
                    }
                }),
            )
            .route(
                "/api/owner",
                post(move |Json(owner): Json<Owner>| async move {
                    Json(owner.with_id(owner_id))
                }),
            )
    }

    #[tokio::test]
    async fn test_login_persists_session() {
        let owner_id = Uuid::new_v4();
        let ctx = setup_repository(&spawn_server(auth_router(owner_id)).await).await;
        let dir = tempdir().unwrap();
        let session = SessionStore::new(dir.path().join("session.json"));
        let vm = AuthViewModel::new(ctx.repo.clone(), session.clone());

        let owner = vm.login("rui@example.com", "secret").await.unwrap();
        assert_eq!(owner.id, Some(owner_id));

        let state = vm.state();
        assert!(state.data.is_logged_in);
        assert!(!state.is_error);
        assert_eq!(session.load().unwrap().user(), Some(&owner));
        assert_eq!(ctx.repo.owner(owner_id).await.unwrap(), Some(owner));
    }

    #[tokio::test]
    async fn test_rejected_login_sets_error() {
        let ctx = setup_repository(&spawn_server(auth_router(Uuid::new_v4())).await).await;
        let dir = tempdir().unwrap();
        let vm = AuthViewModel::new(ctx.repo.clone(), SessionStore::new(dir.path().join("s.json")));

        assert!(vm.login("rui@example.com", "wrong").await.is_none());

        let state = vm.state();
        assert!(state.is_error);
        assert!(!state.is_loading);
        assert!(state.error_message.unwrap().contains("Not authorized"));
        assert!(vm.current_user().is_none());
    }

    #[tokio::test]
    async fn test_login_offline() {
        let ctx = setup_repository("http://127.0.0.1:9").await;
        ctx.connectivity.set_online(false);
        let dir = tempdir().unwrap();
        let vm = AuthViewModel::new(ctx.repo.clone(), SessionStore::new(dir.path().join("s.json")));

        assert!(vm.login("a@b.c", "secret").await.is_none());
        assert!(vm.state().error_message.unwrap().contains("No internet"));
    }

    #[tokio::test]
    async fn test_register_then_restore_then_logout() {
        let owner_id = Uuid::new_v4();
        let ctx = setup_repository(&spawn_server(auth_router(owner_id)).await).await;
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");

        let vm = AuthViewModel::new(ctx.repo.clone(), SessionStore::new(&path));
        let draft = Owner::new("Lia", "lia@example.com", "pw");
        let created = vm.register(&draft).await.unwrap();
        assert_eq!(created.id, Some(owner_id));

        let restored = AuthViewModel::new(ctx.repo.clone(), SessionStore::new(&path));
        assert_eq!(restored.restore(), Some(created));
        assert!(restored.current_user().is_some());

        assert!(restored.logout());
        assert!(restored.current_user().is_none());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_save_profile_requires_user() {
        let ctx = setup_repository("http://127.0.0.1:9").await;
        let dir = tempdir().unwrap();
        let vm = AuthViewModel::new(ctx.repo.clone(), SessionStore::new(dir.path().join("s.json")));

        assert!(vm.save_profile(&Owner::new("X", "x@y.z", "pw")).await.is_none());
        assert!(vm.state().is_error);
    }
}
