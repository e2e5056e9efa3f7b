//! Login, registration and session commands.

use clap::{Args, Subcommand};
use farmstead::viewmodels::AuthViewModel;
use farmstead_core::Owner;

use super::{failure, print_json, prompt, CommandError, Context, OutputFormat};

#[derive(Args)]
pub struct AuthCommand {
    #[command(subcommand)]
    command: AuthSubcommand,
}

#[derive(Subcommand)]
enum AuthSubcommand {
    /// Log in with email and password
    Login {
        #[arg(long)]
        email: Option<String>,

        /// Prompted for when omitted
        #[arg(long)]
        password: Option<String>,
    },

    /// Create an account and log in
    Register {
        #[arg(long)]
        name: String,

        #[arg(long)]
        email: String,

        #[arg(long)]
        password: Option<String>,
    },

    /// Forget the saved session
    Logout,

    /// Show the logged-in user
    Whoami {
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

impl AuthCommand {
    pub async fn run(&self, ctx: &Context) -> Result<(), CommandError> {
        let vm = AuthViewModel::new(ctx.repository.clone(), ctx.session.clone());
        vm.restore();

        match &self.command {
            AuthSubcommand::Login { email, password } => {
                let email = match email {
                    Some(email) => email.clone(),
                    None => prompt("Email")?,
                };
                let password = match password {
                    Some(password) => password.clone(),
                    None => prompt("Password")?,
                };

                let owner = vm
                    .login(&email, &password)
                    .await
                    .ok_or_else(|| failure(vm.state()))?;
                println!("Logged in as {} <{}>", owner.name, owner.email);
                Ok(())
            }

            AuthSubcommand::Register {
                name,
                email,
                password,
            } => {
                if name.trim().is_empty() {
                    return Err(CommandError::InvalidInput(
                        "Name cannot be empty".to_string(),
                    ));
                }
                let password = match password {
                    Some(password) => password.clone(),
                    None => prompt("Password")?,
                };

                let draft = Owner::new(name.trim(), email.trim(), password);
                let owner = vm
                    .register(&draft)
                    .await
                    .ok_or_else(|| failure(vm.state()))?;
                println!("Registered and logged in as {} <{}>", owner.name, owner.email);
                Ok(())
            }

            AuthSubcommand::Logout => {
                if vm.current_user().is_none() {
                    println!("Not logged in.");
                    return Ok(());
                }
                if !vm.logout() {
                    return Err(failure(vm.state()));
                }
                println!("Logged out.");
                Ok(())
            }

            AuthSubcommand::Whoami { format } => {
                let mut owner = vm.current_user().ok_or(CommandError::NotLoggedIn)?;
                owner.password.clear();
                match format {
                    OutputFormat::Json => print_json(&owner)?,
                    OutputFormat::Text => println!("{}", owner),
                }
                Ok(())
            }
        }
    }
}
