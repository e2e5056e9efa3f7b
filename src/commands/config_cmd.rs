use clap::{Args, Subcommand};
use farmstead::config::Config;
use std::fs;
use std::path::PathBuf;

use super::{print_json, CommandError, OutputFormat};

#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show current configuration values
    Show {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Initialize configuration file
    Init,
}

const DEFAULT_CONFIG: &str = r#"# farmstead configuration

# Local cache (default: platform data dir, farmstead/farmstead.db)
# database_path: farmstead.db

# Saved login session (default: platform data dir, farmstead/session.json)
# session_path: session.json

api:
  base_url: http://localhost:8080
  # api_key: your-api-key

sync:
  interval_minutes: 15
  retention_days: 30
"#;

impl ConfigCommand {
    pub fn run(&self, config: &Config, config_path: Option<PathBuf>) -> Result<(), CommandError> {
        match &self.command {
            ConfigSubcommand::Show { format } => {
                let mut shown = config.clone();
                if let Some(key) = shown.api.api_key.as_mut() {
                    key.value = mask(&key.value);
                }

                match format {
                    OutputFormat::Json => print_json(&shown)?,
                    OutputFormat::Text => {
                        println!("Configuration");
                        println!("=============\n");

                        if let Some(path) = &shown.config_file {
                            println!("Config file: {}", path.display());
                        } else {
                            println!(
                                "Config file: {} (not found)",
                                Config::default_config_path().display()
                            );
                        }
                        println!();

                        println!("database_path: {}", shown.database_path.value.display());
                        println!("  source: {}", shown.database_path.source);
                        println!();

                        println!("session_path: {}", shown.session_path.value.display());
                        println!("  source: {}", shown.session_path.source);
                        println!();

                        println!("api.base_url: {}", shown.api.base_url.value);
                        println!("  source: {}", shown.api.base_url.source);
                        match &shown.api.api_key {
                            Some(key) => {
                                println!("api.api_key: {}", key.value);
                                println!("  source: {}", key.source);
                            }
                            None => println!("api.api_key: (not set)"),
                        }
                        println!();

                        println!("sync.interval_minutes: {}", shown.sync.interval_minutes);
                        println!("sync.retention_days: {}", shown.sync.retention_days);
                    }
                }
                Ok(())
            }

            ConfigSubcommand::Init => {
                let path = config_path.unwrap_or_else(Config::default_config_path);

                if path.exists() {
                    println!("Config file already exists: {}", path.display());
                    println!("Use 'farm config show' to view current configuration.");
                    return Ok(());
                }

                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&path, DEFAULT_CONFIG)?;

                println!("Created config file: {}", path.display());
                println!("\nEdit this file to customize your settings.");
                Ok(())
            }
        }
    }
}

fn mask(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    if secret.chars().count() <= 4 {
        "****".to_string()
    } else {
        format!("{}****", visible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask() {
        assert_eq!(mask("abc"), "****");
        assert_eq!(mask("abcdef123"), "abcd****");
    }

    #[test]
    fn test_default_config_parses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, DEFAULT_CONFIG).unwrap();

        let config = Config::load(Some(path)).unwrap();
        assert_eq!(config.sync.interval_minutes, 15);
        assert_eq!(config.sync.retention_days, 30);
    }
}
