//! Run constraints for background jobs.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::connectivity::{is_online, Connectivity};

/// Conditions that must hold before a job may start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Constraints {
    pub requires_network: bool,
    pub requires_battery_not_low: bool,
}

impl Constraints {
    /// One-shot runs only need a network.
    pub fn network() -> Self {
        Self {
            requires_network: true,
            requires_battery_not_low: false,
        }
    }

    /// Periodic runs also stay away from a low battery.
    pub fn periodic() -> Self {
        Self {
            requires_network: true,
            requires_battery_not_low: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatteryStatus {
    /// Charge in percent, when the battery reports one.
    pub level: Option<u8>,
    pub charging: bool,
}

impl BatteryStatus {
    pub const LOW_THRESHOLD: u8 = 15;

    /// Low means discharging at or below the threshold. An unknown level is
    /// never low.
    pub fn is_low(&self) -> bool {
        !self.charging && self.level.is_some_and(|level| level <= Self::LOW_THRESHOLD)
    }
}

pub trait PowerSource: Send + Sync {
    /// `None` when the host has no battery.
    fn battery(&self) -> Option<BatteryStatus>;
}

/// Reads battery state from the Linux power supply class.
#[derive(Debug, Clone)]
pub struct SysfsPowerSource {
    root: PathBuf,
}

impl Default for SysfsPowerSource {
    fn default() -> Self {
        Self::new("/sys/class/power_supply")
    }
}

impl SysfsPowerSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

fn read_attr(dir: &Path, name: &str) -> Option<String> {
    fs::read_to_string(dir.join(name))
        .ok()
        .map(|s| s.trim().to_string())
}

impl PowerSource for SysfsPowerSource {
    fn battery(&self) -> Option<BatteryStatus> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(root = %self.root.display(), error = %e, "No power supply information");
                return None;
            }
        };

        let mut battery: Option<BatteryStatus> = None;
        let mut on_mains = false;

        for entry in entries.flatten() {
            let dir = entry.path();
            match read_attr(&dir, "type").as_deref() {
                Some("Battery") => {
                    let level = read_attr(&dir, "capacity").and_then(|c| c.parse().ok());
                    let charging = matches!(
                        read_attr(&dir, "status").as_deref(),
                        Some("Charging") | Some("Full")
                    );
                    battery.get_or_insert(BatteryStatus { level, charging });
                }
                Some("Mains") => {
                    on_mains |= read_attr(&dir, "online").as_deref() == Some("1");
                }
                _ => {}
            }
        }

        battery.map(|mut status| {
            status.charging |= on_mains;
            status
        })
    }
}

/// Evaluates [`Constraints`] against the host.
pub struct ConstraintChecker {
    connectivity: Arc<dyn Connectivity>,
    power: Arc<dyn PowerSource>,
}

impl ConstraintChecker {
    pub fn new(connectivity: Arc<dyn Connectivity>, power: Arc<dyn PowerSource>) -> Self {
        Self {
            connectivity,
            power,
        }
    }

    pub fn is_online(&self) -> bool {
        is_online(self.connectivity.as_ref())
    }

    pub fn battery(&self) -> Option<BatteryStatus> {
        self.power.battery()
    }

    /// The first constraint that does not hold, if any.
    pub fn unmet(&self, constraints: Constraints) -> Option<&'static str> {
        if constraints.requires_network && !self.is_online() {
            return Some("network unavailable");
        }
        if constraints.requires_battery_not_low && self.battery().is_some_and(|b| b.is_low()) {
            return Some("battery low");
        }
        None
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::FakePower;
    use super::*;
    use crate::connectivity::test_support::FakeConnectivity;
    use tempfile::tempdir;

    fn supply(root: &Path, name: &str, attrs: &[(&str, &str)]) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        for (attr, value) in attrs {
            fs::write(dir.join(attr), format!("{}\n", value)).unwrap();
        }
    }

    #[test]
    fn test_battery_is_low() {
        let low = BatteryStatus {
            level: Some(15),
            charging: false,
        };
        assert!(low.is_low());
        assert!(!BatteryStatus {
            charging: true,
            ..low
        }
        .is_low());
        assert!(!BatteryStatus {
            level: Some(16),
            ..low
        }
        .is_low());
        assert!(!BatteryStatus {
            level: None,
            ..low
        }
        .is_low());
    }

    #[test]
    fn test_sysfs_reads_discharging_battery() {
        let root = tempdir().unwrap();
        supply(
            root.path(),
            "BAT0",
            &[("type", "Battery"), ("capacity", "9"), ("status", "Discharging")],
        );
        supply(root.path(), "AC", &[("type", "Mains"), ("online", "0")]);

        let status = SysfsPowerSource::new(root.path()).battery().unwrap();
        assert_eq!(
            status,
            BatteryStatus {
                level: Some(9),
                charging: false
            }
        );
        assert!(status.is_low());
    }

    #[test]
    fn test_sysfs_mains_counts_as_charging() {
        let root = tempdir().unwrap();
        supply(
            root.path(),
            "BAT0",
            &[("type", "Battery"), ("capacity", "5"), ("status", "Not charging")],
        );
        supply(root.path(), "AC", &[("type", "Mains"), ("online", "1")]);

        let status = SysfsPowerSource::new(root.path()).battery().unwrap();
        assert!(status.charging);
        assert!(!status.is_low());
    }

    #[test]
    fn test_sysfs_without_battery() {
        let root = tempdir().unwrap();
        supply(root.path(), "AC", &[("type", "Mains"), ("online", "1")]);
        assert!(SysfsPowerSource::new(root.path()).battery().is_none());
        assert!(SysfsPowerSource::new(root.path().join("missing"))
            .battery()
            .is_none());
    }

    #[test]
    fn test_checker_reports_first_unmet_constraint() {
        let connectivity = Arc::new(FakeConnectivity::offline());
        let power = Arc::new(FakePower::mains());
        let checker = ConstraintChecker::new(connectivity.clone(), power.clone());

        assert_eq!(checker.unmet(Constraints::default()), None);
        assert_eq!(
            checker.unmet(Constraints::periodic()),
            Some("network unavailable")
        );

        connectivity.set_online(true);
        assert_eq!(checker.unmet(Constraints::periodic()), None);

        power.set(Some(BatteryStatus {
            level: Some(3),
            charging: false,
        }));
        assert_eq!(checker.unmet(Constraints::periodic()), Some("battery low"));
        assert_eq!(checker.unmet(Constraints::network()), None);
    }
}
