use clap::{Args, Subcommand};
use farmstead::viewmodels::FarmViewModel;
use farmstead::Repository;
use farmstead_core::{Farm, SpeciesCategory};
use uuid::Uuid;

use super::{confirm, failure, print_json, truncate, CommandError, Context, OutputFormat};

#[derive(Args)]
pub struct FarmCommand {
    #[command(subcommand)]
    command: FarmSubcommand,
}

#[derive(Subcommand)]
enum FarmSubcommand {
    /// List your farms
    List {
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show a farm's details
    Show {
        /// Farm ID (UUID) or name
        farm: String,

        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Create a farm
    Create {
        name: String,

        /// ruminant, swine, poultry, equine or other
        #[arg(long)]
        species: SpeciesCategory,

        #[arg(long, allow_negative_numbers = true)]
        latitude: Option<f64>,

        #[arg(long, allow_negative_numbers = true)]
        longitude: Option<f64>,

        #[arg(long)]
        address: Option<String>,

        /// Area in hectares
        #[arg(long)]
        area: Option<f64>,
    },

    /// Delete a farm and everything cached under it
    Delete {
        /// Farm ID (UUID) or name
        farm: String,

        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },
}

/// Find a cached farm by id or exact name (case-insensitive).
pub async fn resolve_farm(
    repository: &Repository,
    owner_id: Uuid,
    identifier: &str,
) -> Result<Farm, CommandError> {
    let found = if let Ok(id) = Uuid::parse_str(identifier) {
        repository.farm(id).await?
    } else {
        repository
            .farms_snapshot(owner_id)
            .await?
            .into_iter()
            .find(|f| f.name.eq_ignore_ascii_case(identifier))
    };
    found.ok_or_else(|| CommandError::NotFound(format!("Farm '{}'", identifier)))
}

impl FarmCommand {
    pub async fn run(&self, ctx: &Context) -> Result<(), CommandError> {
        let (_, owner_id) = ctx.require_user()?;
        let vm = FarmViewModel::new(ctx.repository.clone(), owner_id);

        match &self.command {
            FarmSubcommand::List { format } => {
                if !vm.load().await {
                    let state = vm.state();
                    if state.data.is_empty() {
                        return Err(failure(state));
                    }
                    eprintln!(
                        "Warning: {}; showing cached farms",
                        state.error_message.unwrap_or_default()
                    );
                }
                let farms = vm.state().data;

                match format {
                    OutputFormat::Json => print_json(&farms)?,
                    OutputFormat::Text => {
                        if farms.is_empty() {
                            println!("No farms found");
                            return Ok(());
                        }
                        println!("{:<36}  {:<30}  {:<9}  AREA", "ID", "NAME", "SPECIES");
                        println!("{}", "-".repeat(90));
                        for farm in &farms {
                            println!(
                                "{:<36}  {:<30}  {:<9}  {} ha",
                                farm.id,
                                truncate(&farm.name, 30),
                                farm.species,
                                farm.area
                            );
                        }
                        println!("\nTotal: {} farm(s)", farms.len());
                    }
                }
                Ok(())
            }

            FarmSubcommand::Show { farm, format } => {
                let farm = resolve_farm(&ctx.repository, owner_id, farm).await?;
                match format {
                    OutputFormat::Json => print_json(&farm)?,
                    OutputFormat::Text => println!("{}", farm),
                }
                Ok(())
            }

            FarmSubcommand::Create {
                name,
                species,
                latitude,
                longitude,
                address,
                area,
            } => {
                if name.trim().is_empty() {
                    return Err(CommandError::InvalidInput(
                        "Farm name cannot be empty".to_string(),
                    ));
                }

                let mut farm = Farm::new(name.trim(), *species, owner_id);
                if let (Some(lat), Some(lon)) = (latitude, longitude) {
                    farm = farm.with_location(*lat, *lon);
                }
                if let Some(address) = address {
                    farm = farm.with_address(address);
                }
                if let Some(area) = area {
                    farm = farm.with_area(*area);
                }

                let created = vm.create(&farm).await.ok_or_else(|| failure(vm.state()))?;
                println!("Created farm:");
                println!("{}", created);
                Ok(())
            }

            FarmSubcommand::Delete { farm, force } => {
                let farm = resolve_farm(&ctx.repository, owner_id, farm).await?;

                if !force && !confirm(&format!("Delete farm '{}'?", farm.name))? {
                    println!("Deletion cancelled.");
                    return Ok(());
                }

                if !vm.delete(farm.id).await {
                    return Err(failure(vm.state()));
                }
                println!("Deleted farm: {}", farm.name);
                Ok(())
            }
        }
    }
}
