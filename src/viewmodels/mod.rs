//! Per-feature state holders.
//!
//! A view-model calls the repository, turns failures into a readable message
//! and publishes a [`UiState`] on a `watch` channel. Nothing is retried
//! automatically; the caller re-invokes the action.

mod auth;
mod camera;
mod device;
mod farm;
mod weather;

pub use auth::{AuthState, AuthViewModel};
pub use camera::CameraViewModel;
pub use device::{DeviceViewModel, ReadingsState};
pub use farm::FarmViewModel;
pub use weather::WeatherViewModel;

use farmstead_core::NetworkError;
use futures::StreamExt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::repository::{EntityStream, RepositoryError};

#[derive(Debug, Clone, PartialEq)]
pub struct UiState<T> {
    pub data: T,
    pub is_loading: bool,
    pub is_error: bool,
    pub error_message: Option<String>,
}

impl<T: Default> Default for UiState<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> UiState<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            is_loading: false,
            is_error: false,
            error_message: None,
        }
    }
}

/// Owner side of a view-model's observable state.
pub struct StatePublisher<T> {
    tx: watch::Sender<UiState<T>>,
}

impl<T: Clone + Send + Sync + 'static> StatePublisher<T> {
    pub fn new(data: T) -> Self {
        let (tx, _) = watch::channel(UiState::new(data));
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<UiState<T>> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> UiState<T> {
        self.tx.borrow().clone()
    }

    pub fn set_data(&self, data: T) {
        self.tx.send_modify(|state| state.data = data);
    }

    pub fn update(&self, f: impl FnOnce(&mut T)) {
        self.tx.send_modify(|state| f(&mut state.data));
    }

    fn start(&self) {
        self.tx.send_modify(|state| {
            state.is_loading = true;
            state.is_error = false;
            state.error_message = None;
        });
    }

    fn finish(&self) {
        self.tx.send_modify(|state| state.is_loading = false);
    }

    fn fail(&self, message: String) {
        self.tx.send_modify(|state| {
            state.is_loading = false;
            state.is_error = true;
            state.error_message = Some(message);
        });
    }

    /// Run an action, flagging loading while it runs and recording its
    /// failure message. Returns `None` on failure.
    pub async fn track<R, F>(&self, action: F) -> Option<R>
    where
        F: Future<Output = Result<R, RepositoryError>>,
    {
        self.start();
        match action.await {
            Ok(value) => {
                self.finish();
                Some(value)
            }
            Err(e) => {
                debug!(error = %e, "View-model action failed");
                self.fail(error_message(&e));
                None
            }
        }
    }

    /// Replace the data with a fresh server copy. Being offline is not an
    /// error here: the cached data stays and `None` is returned.
    pub async fn refresh<F>(&self, action: F) -> Option<T>
    where
        F: Future<Output = Result<T, RepositoryError>>,
    {
        self.start();
        match action.await {
            Ok(data) => {
                self.tx.send_modify(|state| {
                    state.data = data.clone();
                    state.is_loading = false;
                });
                Some(data)
            }
            Err(RepositoryError::Offline) => {
                debug!("Offline; keeping cached data");
                self.finish();
                None
            }
            Err(e) => {
                debug!(error = %e, "Refresh failed");
                self.fail(error_message(&e));
                None
            }
        }
    }
}

/// Human-readable text for a failed action.
pub fn error_message(error: &RepositoryError) -> String {
    match error {
        RepositoryError::Offline => {
            "No internet connection. Check your network and try again.".to_string()
        }
        RepositoryError::Store(e) => format!("Local storage error: {}", e),
        RepositoryError::Network(e) => match e {
            NetworkError::BadStatusCode(401) | NetworkError::BadStatusCode(403) => {
                "Not authorized. Check your credentials.".to_string()
            }
            NetworkError::BadStatusCode(404) => "Not found on the server.".to_string(),
            NetworkError::BadStatusCode(code) if *code >= 500 => {
                format!("The server failed to handle the request (HTTP {}).", code)
            }
            NetworkError::BadStatusCode(code) => format!("Request rejected (HTTP {}).", code),
            NetworkError::NoContent => "The server returned an empty response.".to_string(),
            NetworkError::InvalidUrl(url) => format!("Invalid server address: {}", url),
            NetworkError::RequestEncoding(_) => "Could not encode the request.".to_string(),
            NetworkError::ResponseDecoding(_) => {
                "Could not read the server response.".to_string()
            }
            NetworkError::Network(e) => format!("Network error: {}", e),
        },
    }
}

/// Background tasks tied to a view-model's lifetime. Dropping the scope
/// aborts them.
#[derive(Default)]
pub struct Scope {
    tasks: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl Scope {
    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(future);
        let mut tasks = self
            .tasks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        tasks.retain(|task| !task.is_finished());
        tasks.push(handle);
    }

    /// Mirror a live cache query into `publisher` until the scope ends.
    pub fn follow<T>(&self, publisher: Arc<StatePublisher<Vec<T>>>, mut stream: EntityStream<T>)
    where
        T: Clone + Send + Sync + 'static,
    {
        self.spawn(async move {
            while let Some(batch) = stream.next().await {
                match batch {
                    Ok(items) => publisher.set_data(items),
                    Err(e) => publisher.fail(error_message(&e)),
                }
            }
        });
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        let tasks = self
            .tasks
            .get_mut()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        for task in tasks.drain(..) {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::StoreError;
    use std::time::Duration;

    #[test]
    fn test_error_messages() {
        assert!(error_message(&RepositoryError::Offline).contains("No internet"));
        assert!(error_message(&RepositoryError::Network(NetworkError::BadStatusCode(503)))
            .contains("503"));
        assert!(error_message(&RepositoryError::Network(NetworkError::BadStatusCode(401)))
            .contains("Not authorized"));
        assert!(error_message(&RepositoryError::Network(NetworkError::NoContent))
            .contains("empty response"));
        let store = StoreError::Database(sqlx::Error::PoolClosed);
        assert!(error_message(&RepositoryError::Store(store)).starts_with("Local storage error"));
    }

    #[tokio::test]
    async fn test_track_publishes_failure() {
        let publisher = StatePublisher::new(0u32);
        let mut rx = publisher.subscribe();

        let result: Option<()> = publisher
            .track(async { Err(RepositoryError::Offline) })
            .await;
        assert!(result.is_none());

        rx.changed().await.unwrap();
        let state = rx.borrow().clone();
        assert!(state.is_error);
        assert!(!state.is_loading);
        assert!(state.error_message.unwrap().contains("No internet"));
    }

    #[tokio::test]
    async fn test_track_clears_previous_error() {
        let publisher = StatePublisher::new(Vec::<u32>::new());
        publisher
            .track(async { Err::<(), _>(RepositoryError::Offline) })
            .await;

        let value = publisher.track(async { Ok(7) }).await;
        assert_eq!(value, Some(7));

        let state = publisher.current();
        assert!(!state.is_error);
        assert!(state.error_message.is_none());
    }

    #[tokio::test]
    async fn test_refresh_offline_keeps_data() {
        let publisher = StatePublisher::new(vec![1, 2]);

        let result = publisher
            .refresh(async { Err(RepositoryError::Offline) })
            .await;
        assert!(result.is_none());

        let state = publisher.current();
        assert_eq!(state.data, vec![1, 2]);
        assert!(!state.is_error);
        assert!(!state.is_loading);

        publisher.refresh(async { Ok(vec![3]) }).await;
        assert_eq!(publisher.current().data, vec![3]);
    }

    #[tokio::test]
    async fn test_scope_aborts_tasks_on_drop() {
        let (tx, mut rx) = tokio::sync::mpsc::channel::<()>(1);
        let scope = Scope::default();
        scope.spawn(async move {
            let _tx = tx;
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });

        drop(scope);
        // The sender is dropped with the aborted task.
        let closed = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
        assert_eq!(closed.unwrap(), None);
    }
}
