use clap::{Args, Subcommand};
use farmstead::RepositoryError;
use farmstead_core::{Silo, SiloShape};

use super::farm::resolve_farm;
use super::{confirm, parse_id, print_json, truncate, CommandError, Context, OutputFormat};

#[derive(Args)]
pub struct SiloCommand {
    #[command(subcommand)]
    command: SiloSubcommand,
}

#[derive(Subcommand)]
enum SiloSubcommand {
    /// List the silos on a farm
    List {
        /// Farm ID (UUID) or name
        #[arg(long)]
        farm: String,

        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Add a silo to a farm
    Add {
        #[arg(long)]
        farm: String,

        name: String,

        /// cylindrical, conical, rectangular or other
        #[arg(long)]
        shape: SiloShape,

        /// Height in metres
        #[arg(long, default_value = "0")]
        height: f64,

        #[arg(long, default_value = "0")]
        diameter: f64,

        #[arg(long, default_value = "0")]
        cone_height: f64,

        #[arg(long, default_value = "0")]
        bottom_diameter: f64,

        /// Capacity in tonnes
        #[arg(long, default_value = "0")]
        capacity: f64,

        /// Current fill in tonnes
        #[arg(long, default_value = "0")]
        fill_level: f64,

        #[arg(long)]
        material: Option<String>,
    },

    /// Remove a silo
    Delete {
        /// Silo ID (UUID)
        silo: String,

        #[arg(long, short)]
        force: bool,
    },
}

impl SiloCommand {
    pub async fn run(&self, ctx: &Context) -> Result<(), CommandError> {
        let (_, owner_id) = ctx.require_user()?;
        let repo = &ctx.repository;

        match &self.command {
            SiloSubcommand::List { farm, format } => {
                let farm = resolve_farm(repo, owner_id, farm).await?;

                match repo.refresh_silos(farm.id).await {
                    Ok(_) | Err(RepositoryError::Offline) => {}
                    Err(e) => eprintln!("Warning: {}; showing cached silos", CommandError::from(e)),
                }
                let silos = repo.silos_snapshot(farm.id).await?;

                match format {
                    OutputFormat::Json => print_json(&silos)?,
                    OutputFormat::Text => {
                        if silos.is_empty() {
                            println!("No silos on {}", farm.name);
                            return Ok(());
                        }
                        println!("{:<36}  {:<24}  {:<12}  FILL", "ID", "NAME", "SHAPE");
                        println!("{}", "-".repeat(86));
                        for silo in &silos {
                            let fill = silo
                                .fill_percentage()
                                .map(|p| format!("{:.0}%", p))
                                .unwrap_or_else(|| "-".to_string());
                            println!(
                                "{:<36}  {:<24}  {:<12}  {}",
                                silo.id,
                                truncate(&silo.name, 24),
                                silo.shape,
                                fill
                            );
                        }
                        println!("\nTotal: {} silo(s)", silos.len());
                    }
                }
                Ok(())
            }

            SiloSubcommand::Add {
                farm,
                name,
                shape,
                height,
                diameter,
                cone_height,
                bottom_diameter,
                capacity,
                fill_level,
                material,
            } => {
                if *fill_level < 0.0 || *capacity < 0.0 {
                    return Err(CommandError::InvalidInput(
                        "Capacity and fill level cannot be negative".to_string(),
                    ));
                }
                let farm = resolve_farm(repo, owner_id, farm).await?;

                let mut silo = Silo::new(name.trim(), *shape, farm.id)
                    .with_dimensions(*height, *diameter, *cone_height, *bottom_diameter)
                    .with_capacity(*capacity)
                    .with_fill_level(*fill_level);
                if let Some(material) = material {
                    silo = silo.with_material(material);
                }

                let created = repo.create_silo(&silo).await?;
                println!("Added silo to {}:", farm.name);
                println!("{}", created);
                Ok(())
            }

            SiloSubcommand::Delete { silo, force } => {
                let id = parse_id(silo, "silo")?;
                let silo = repo
                    .silo(id)
                    .await?
                    .ok_or_else(|| CommandError::NotFound(format!("Silo '{}'", id)))?;

                if !force && !confirm(&format!("Delete silo '{}'?", silo.name))? {
                    println!("Deletion cancelled.");
                    return Ok(());
                }

                repo.remove_silo(silo.id).await?;
                println!("Deleted silo: {}", silo.name);
                Ok(())
            }
        }
    }
}
