//! Offline-first farm management client.
//!
//! The local SQLite cache, the repository that keeps it in step with the
//! remote API, background sync, session persistence and the view-models the
//! `farm` binary drives.

pub mod config;
pub mod connectivity;
pub mod db;
pub mod repository;
pub mod session;
pub mod sync;
pub mod viewmodels;

pub use config::Config;
pub use connectivity::{is_online, Connectivity, ProbeConnectivity};
pub use db::{init_db, LocalStore, StoreError};
pub use repository::{Repository, RepositoryError};
pub use session::{Session, SessionStore};
pub use sync::SyncScheduler;
