mod auth;
mod camera;
mod config_cmd;
mod device;
mod farm;
mod silo;
mod sync_cmd;
mod weather;

pub use auth::AuthCommand;
pub use camera::CameraCommand;
pub use config_cmd::ConfigCommand;
pub use device::DeviceCommand;
pub use farm::FarmCommand;
pub use silo::SiloCommand;
pub use sync_cmd::SyncCommand;
pub use weather::WeatherCommand;

use clap::ValueEnum;
use farmstead::config::Config;
use farmstead::viewmodels::{error_message, UiState};
use farmstead::{Connectivity, Repository, RepositoryError, SessionStore};
use farmstead_core::Owner;
use serde::Serialize;
use std::io::{self, Write};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Everything a command needs, built once in `main`.
pub struct Context {
    pub config: Config,
    pub repository: Repository,
    pub connectivity: Arc<dyn Connectivity>,
    pub session: SessionStore,
    pub user: Option<Owner>,
}

impl Context {
    /// The logged-in owner and their server id.
    pub fn require_user(&self) -> Result<(&Owner, Uuid), CommandError> {
        let owner = self.user.as_ref().ok_or(CommandError::NotLoggedIn)?;
        let id = owner.id.ok_or(CommandError::NotLoggedIn)?;
        Ok((owner, id))
    }
}

#[derive(Debug)]
pub enum CommandError {
    NotLoggedIn,
    NotFound(String),
    InvalidInput(String),
    /// A view-model or repository action failed; carries its readable message.
    Failed(String),
    Io(io::Error),
    Json(serde_json::Error),
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandError::NotLoggedIn => {
                write!(f, "Not logged in. Run 'farm auth login' first.")
            }
            CommandError::NotFound(what) => write!(f, "{} not found", what),
            CommandError::InvalidInput(msg) => write!(f, "{}", msg),
            CommandError::Failed(msg) => write!(f, "{}", msg),
            CommandError::Io(e) => write!(f, "I/O error: {}", e),
            CommandError::Json(e) => write!(f, "JSON error: {}", e),
        }
    }
}

impl std::error::Error for CommandError {}

impl From<io::Error> for CommandError {
    fn from(e: io::Error) -> Self {
        CommandError::Io(e)
    }
}

impl From<serde_json::Error> for CommandError {
    fn from(e: serde_json::Error) -> Self {
        CommandError::Json(e)
    }
}

impl From<RepositoryError> for CommandError {
    fn from(e: RepositoryError) -> Self {
        CommandError::Failed(error_message(&e))
    }
}

/// The error a view-model published for its last action.
pub fn failure<T>(state: UiState<T>) -> CommandError {
    CommandError::Failed(
        state
            .error_message
            .unwrap_or_else(|| "The action failed".to_string()),
    )
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CommandError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Ask a yes/no question on stdin. Anything but `y` is a no.
pub fn confirm(question: &str) -> Result<bool, CommandError> {
    print!("{} [y/N] ", question);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}

pub fn prompt(label: &str) -> Result<String, CommandError> {
    print!("{}: ", label);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let value = input.trim().to_string();
    if value.is_empty() {
        return Err(CommandError::InvalidInput(format!("{} cannot be empty", label)));
    }
    Ok(value)
}

pub fn parse_id(value: &str, what: &str) -> Result<Uuid, CommandError> {
    Uuid::parse_str(value)
        .map_err(|_| CommandError::InvalidInput(format!("Invalid {} ID: {}", what, value)))
}

/// Shorten `text` to `width` characters for table output.
pub fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() > width {
        let kept: String = text.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a very long farm name", 10), "a very ...");
    }

    #[test]
    fn test_parse_id() {
        let id = Uuid::new_v4();
        assert_eq!(parse_id(&id.to_string(), "farm").unwrap(), id);
        assert!(parse_id("nope", "farm")
            .unwrap_err()
            .to_string()
            .contains("Invalid farm ID"));
    }

    #[test]
    fn test_failure_uses_published_message() {
        let mut state = UiState::new(());
        state.is_error = true;
        state.error_message = Some("Server down".to_string());
        assert_eq!(failure(state).to_string(), "Server down");
    }
}
