use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Measurement system used when displaying values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UnitSystem {
    #[default]
    Metric,
    Imperial,
}

impl fmt::Display for UnitSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitSystem::Metric => write!(f, "metric"),
            UnitSystem::Imperial => write!(f, "imperial"),
        }
    }
}

impl FromStr for UnitSystem {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "metric" => Ok(UnitSystem::Metric),
            "imperial" => Ok(UnitSystem::Imperial),
            _ => Err(format!(
                "Invalid unit system '{}'. Valid options: metric, imperial",
                s
            )),
        }
    }
}

/// Per-owner display preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub language: String,
    pub currency: String,
    pub unit_system: UnitSystem,
    /// Show averaged sensor values instead of raw samples.
    pub use_averages: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            currency: "USD".to_string(),
            unit_system: UnitSystem::Metric,
            use_averages: false,
        }
    }
}

/// Account holder; top of the ownership hierarchy.
///
/// `id` is assigned by the server on creation, so a locally built owner
/// carries `None` until the registration response arrives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Owner {
    pub id: Option<Uuid>,
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default, with = "crate::wire::date_millis_option")]
    pub birthday: Option<NaiveDate>,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub is_free_tier: bool,
    pub parent_id: Option<Uuid>,
    pub role_id: Option<Uuid>,
}

impl Owner {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            email: email.into(),
            password: password.into(),
            birthday: None,
            settings: Settings::default(),
            is_free_tier: true,
            parent_id: None,
            role_id: None,
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_birthday(mut self, birthday: NaiveDate) -> Self {
        self.birthday = Some(birthday);
        self
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_parent(mut self, parent_id: Uuid) -> Self {
        self.parent_id = Some(parent_id);
        self
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} <{}>", self.name, self.email)?;
        if let Some(id) = self.id {
            writeln!(f, "ID: {}", id)?;
        }
        if let Some(birthday) = self.birthday {
            writeln!(f, "Birthday: {}", birthday)?;
        }
        writeln!(
            f,
            "Settings: {} / {} / {}",
            self.settings.language, self.settings.currency, self.settings.unit_system
        )?;
        write!(
            f,
            "Plan: {}",
            if self.is_free_tier { "free" } else { "paid" }
        )
    }
}

/// Login payload for `POST /api/owner/authenticate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_owner_has_no_id() {
        let owner = Owner::new("Ana", "ana@example.com", "secret");
        assert!(owner.id.is_none());
        assert!(owner.is_free_tier);
        assert_eq!(owner.settings, Settings::default());
    }

    #[test]
    fn test_owner_wire_format() {
        let id = Uuid::new_v4();
        let owner = Owner::new("Ana", "ana@example.com", "secret")
            .with_id(id)
            .with_birthday(NaiveDate::from_ymd_opt(1970, 1, 2).unwrap());

        let json = serde_json::to_value(&owner).unwrap();
        assert_eq!(json["id"], id.to_string());
        assert_eq!(json["birthday"], 86_400_000);
        assert_eq!(json["isFreeTier"], true);
        assert_eq!(json["settings"]["unitSystem"], "metric");
        assert_eq!(json["settings"]["useAverages"], false);
    }

    #[test]
    fn test_owner_accepts_missing_optional_fields() {
        let json = r#"{
            "id": null,
            "name": "Ana",
            "email": "ana@example.com",
            "password": "x",
            "parentId": null,
            "roleId": null
        }"#;
        let owner: Owner = serde_json::from_str(json).unwrap();
        assert!(owner.birthday.is_none());
        assert_eq!(owner.settings, Settings::default());
        assert!(!owner.is_free_tier);
    }

    #[test]
    fn test_unit_system_from_str() {
        assert_eq!(UnitSystem::from_str("METRIC").unwrap(), UnitSystem::Metric);
        assert_eq!(
            UnitSystem::from_str("imperial").unwrap(),
            UnitSystem::Imperial
        );
        assert!(UnitSystem::from_str("nautical").is_err());
    }
}
