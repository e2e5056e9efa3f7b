use clap::{Args, Subcommand};
use farmstead::viewmodels::WeatherViewModel;

use super::farm::resolve_farm;
use super::{failure, print_json, CommandError, Context, OutputFormat};

#[derive(Args)]
pub struct WeatherCommand {
    #[command(subcommand)]
    command: WeatherSubcommand,
}

#[derive(Subcommand)]
enum WeatherSubcommand {
    /// Show current conditions and forecast for a farm
    Show {
        /// Farm ID (UUID) or name
        farm: String,

        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

impl WeatherCommand {
    pub async fn run(&self, ctx: &Context) -> Result<(), CommandError> {
        let (_, owner_id) = ctx.require_user()?;

        match &self.command {
            WeatherSubcommand::Show { farm, format } => {
                let farm = resolve_farm(&ctx.repository, owner_id, farm).await?;
                let vm = WeatherViewModel::new(ctx.repository.clone(), farm.id);

                let weather = vm.load().await.ok_or_else(|| failure(vm.state()))?;
                match format {
                    OutputFormat::Json => print_json(&weather)?,
                    OutputFormat::Text => {
                        println!("Weather at {}", farm.name);
                        println!("{}", "=".repeat(11 + farm.name.len()));
                        println!("{}", weather);
                    }
                }
                Ok(())
            }
        }
    }
}
