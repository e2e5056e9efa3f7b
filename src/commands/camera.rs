use clap::{Args, Subcommand};
use farmstead::viewmodels::CameraViewModel;
use farmstead_core::Camera;

use super::farm::resolve_farm;
use super::{
    confirm, failure, parse_id, print_json, truncate, CommandError, Context, OutputFormat,
};

#[derive(Args)]
pub struct CameraCommand {
    #[command(subcommand)]
    command: CameraSubcommand,
}

#[derive(Subcommand)]
enum CameraSubcommand {
    /// List the cameras on a farm
    List {
        /// Farm ID (UUID) or name
        #[arg(long)]
        farm: String,

        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Add a camera stream
    Add {
        #[arg(long)]
        farm: String,

        name: String,

        /// Stream URL (rtsp://, https://, ...)
        url: String,
    },

    /// Remove a camera
    Delete {
        /// Camera ID (UUID)
        camera: String,

        #[arg(long, short)]
        force: bool,
    },
}

impl CameraCommand {
    pub async fn run(&self, ctx: &Context) -> Result<(), CommandError> {
        let (_, owner_id) = ctx.require_user()?;

        match &self.command {
            CameraSubcommand::List { farm, format } => {
                let farm = resolve_farm(&ctx.repository, owner_id, farm).await?;
                let vm = CameraViewModel::new(ctx.repository.clone(), farm.id, owner_id);

                if !vm.load().await {
                    let state = vm.state();
                    if state.data.is_empty() {
                        return Err(failure(state));
                    }
                    eprintln!(
                        "Warning: {}; showing cached cameras",
                        state.error_message.unwrap_or_default()
                    );
                }
                let cameras = vm.state().data;

                match format {
                    OutputFormat::Json => print_json(&cameras)?,
                    OutputFormat::Text => {
                        if cameras.is_empty() {
                            println!("No cameras on {}", farm.name);
                            return Ok(());
                        }
                        println!("{:<36}  {:<24}  STREAM", "ID", "NAME");
                        println!("{}", "-".repeat(90));
                        for camera in &cameras {
                            println!(
                                "{:<36}  {:<24}  {}",
                                camera.id,
                                truncate(&camera.name, 24),
                                camera.stream_url
                            );
                        }
                        println!("\nTotal: {} camera(s)", cameras.len());
                    }
                }
                Ok(())
            }

            CameraSubcommand::Add { farm, name, url } => {
                if url.trim().is_empty() {
                    return Err(CommandError::InvalidInput(
                        "Stream URL cannot be empty".to_string(),
                    ));
                }
                let farm = resolve_farm(&ctx.repository, owner_id, farm).await?;
                let vm = CameraViewModel::new(ctx.repository.clone(), farm.id, owner_id);

                let camera = Camera::new(name.trim(), url.trim(), farm.id, owner_id);
                let created = vm.add(&camera).await.ok_or_else(|| failure(vm.state()))?;
                println!("Added camera: {}", created);
                Ok(())
            }

            CameraSubcommand::Delete { camera, force } => {
                let id = parse_id(camera, "camera")?;
                let camera = ctx
                    .repository
                    .camera(id)
                    .await?
                    .ok_or_else(|| CommandError::NotFound(format!("Camera '{}'", id)))?;

                if !force && !confirm(&format!("Delete camera '{}'?", camera.name))? {
                    println!("Deletion cancelled.");
                    return Ok(());
                }

                let vm = CameraViewModel::new(ctx.repository.clone(), camera.farm_id, owner_id);
                if !vm.delete(camera.id).await {
                    return Err(failure(vm.state()));
                }
                println!("Deleted camera: {}", camera.name);
                Ok(())
            }
        }
    }
}
