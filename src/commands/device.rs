use clap::{Args, Subcommand};
use farmstead::viewmodels::DeviceViewModel;
use farmstead_core::Device;

use super::farm::resolve_farm;
use super::{
    confirm, failure, parse_id, print_json, truncate, CommandError, Context, OutputFormat,
};

#[derive(Args)]
pub struct DeviceCommand {
    #[command(subcommand)]
    command: DeviceSubcommand,
}

#[derive(Subcommand)]
enum DeviceSubcommand {
    /// List the devices installed on a farm
    List {
        /// Farm ID (UUID) or name
        #[arg(long)]
        farm: String,

        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Register a device on a farm
    Add {
        #[arg(long)]
        farm: String,

        /// Identifier printed on the hardware
        #[arg(long)]
        hardware_id: String,

        #[arg(long)]
        name: String,

        /// Pen the device is installed in (UUID)
        #[arg(long)]
        pen: String,

        /// Enable growth prediction
        #[arg(long)]
        prediction: bool,
    },

    /// Rename a device
    Rename {
        /// Device ID (UUID)
        device: String,

        name: String,
    },

    /// Remove a device
    Delete {
        device: String,

        #[arg(long, short)]
        force: bool,
    },

    /// Show recent sensor readings for a device
    Readings {
        device: String,

        /// Number of readings to show
        #[arg(long, short, default_value = "20")]
        limit: usize,

        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

impl DeviceCommand {
    pub async fn run(&self, ctx: &Context) -> Result<(), CommandError> {
        let (_, owner_id) = ctx.require_user()?;

        match &self.command {
            DeviceSubcommand::List { farm, format } => {
                let farm = resolve_farm(&ctx.repository, owner_id, farm).await?;
                let vm = DeviceViewModel::new(ctx.repository.clone(), owner_id, farm.id);

                if !vm.load().await {
                    let state = vm.state();
                    if state.data.is_empty() {
                        return Err(failure(state));
                    }
                    eprintln!(
                        "Warning: {}; showing cached devices",
                        state.error_message.unwrap_or_default()
                    );
                }
                let devices = vm.state().data;

                match format {
                    OutputFormat::Json => print_json(&devices)?,
                    OutputFormat::Text => {
                        if devices.is_empty() {
                            println!("No devices on {}", farm.name);
                            return Ok(());
                        }
                        println!("{:<36}  {:<24}  {:<16}  PREDICTION", "ID", "NAME", "HARDWARE");
                        println!("{}", "-".repeat(92));
                        for device in &devices {
                            println!(
                                "{:<36}  {:<24}  {:<16}  {}",
                                device.id,
                                truncate(&device.name, 24),
                                truncate(&device.hardware_id, 16),
                                if device.prediction_enabled { "on" } else { "off" }
                            );
                        }
                        println!("\nTotal: {} device(s)", devices.len());
                    }
                }
                Ok(())
            }

            DeviceSubcommand::Add {
                farm,
                hardware_id,
                name,
                pen,
                prediction,
            } => {
                let farm = resolve_farm(&ctx.repository, owner_id, farm).await?;
                let pen_id = parse_id(pen, "pen")?;
                let vm = DeviceViewModel::new(ctx.repository.clone(), owner_id, farm.id);

                let device = Device::new(hardware_id, name, owner_id, farm.id, pen_id)
                    .with_prediction(*prediction);
                let created = vm.add(&device).await.ok_or_else(|| failure(vm.state()))?;
                println!("Added device to {}:", farm.name);
                println!("{}", created);
                Ok(())
            }

            DeviceSubcommand::Rename { device, name } => {
                let device = cached_device(ctx, device).await?;
                let vm = DeviceViewModel::new(ctx.repository.clone(), owner_id, device.farm_id);

                let renamed = vm
                    .rename(device.id, name.trim())
                    .await
                    .ok_or_else(|| failure(vm.state()))?;
                println!("Renamed '{}' to '{}'", device.name, renamed.name);
                Ok(())
            }

            DeviceSubcommand::Delete { device, force } => {
                let device = cached_device(ctx, device).await?;

                if !force && !confirm(&format!("Delete device '{}'?", device.name))? {
                    println!("Deletion cancelled.");
                    return Ok(());
                }

                let vm = DeviceViewModel::new(ctx.repository.clone(), owner_id, device.farm_id);
                if !vm.delete(device.id).await {
                    return Err(failure(vm.state()));
                }
                println!("Deleted device: {}", device.name);
                Ok(())
            }

            DeviceSubcommand::Readings {
                device,
                limit,
                format,
            } => {
                let device = cached_device(ctx, device).await?;
                let vm = DeviceViewModel::new(ctx.repository.clone(), owner_id, device.farm_id);

                if !vm.load_readings(device.id).await {
                    return Err(failure(vm.readings_state()));
                }
                let readings: Vec<_> = vm
                    .readings_state()
                    .data
                    .readings
                    .into_iter()
                    .take(*limit)
                    .collect();

                match format {
                    OutputFormat::Json => print_json(&readings)?,
                    OutputFormat::Text => {
                        if readings.is_empty() {
                            println!("No readings for {}", device.name);
                            return Ok(());
                        }
                        println!("Readings for {}:", device.name);
                        for reading in &readings {
                            println!("  {}", reading);
                        }
                    }
                }
                Ok(())
            }
        }
    }
}

async fn cached_device(ctx: &Context, identifier: &str) -> Result<Device, CommandError> {
    let id = parse_id(identifier, "device")?;
    ctx.repository
        .device(id)
        .await?
        .ok_or_else(|| CommandError::NotFound(format!("Device '{}'", identifier)))
}
