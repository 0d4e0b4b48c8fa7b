//! `emporium`: operator commands for an Emporium deployment.
//!
//! ```bash
//! emporium migrate
//! emporium staff create -e owner@example.com -n "Store Owner" -r super_admin -p 'a long password'
//! ```
//!
//! Both commands read `DATABASE_URL` from the environment or `.env`.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use emporium_core::StaffRole;

use crate::commands::CommandError;

mod commands;

#[derive(Parser)]
#[command(name = "emporium", author, version, about = "Emporium operator commands")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply pending database migrations
    Migrate,
    /// Staff account administration
    #[command(subcommand)]
    Staff(StaffCommand),
}

#[derive(Subcommand)]
enum StaffCommand {
    /// Create a staff account, e.g. the first super admin
    Create {
        /// Login email
        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        name: String,

        /// One of `super_admin`, `admin`, `staff`
        #[arg(short, long, default_value = "staff")]
        role: StaffRole,

        #[arg(short, long, env = "EMPORIUM_STAFF_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

impl Cli {
    async fn execute(self) -> Result<(), CommandError> {
        match self.command {
            Command::Migrate => commands::migrate::run().await,
            Command::Staff(StaffCommand::Create {
                email,
                name,
                role,
                password,
            }) => commands::staff::create(&email, &name, role, &password).await,
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    if let Err(e) = Cli::parse().execute().await {
        tracing::error!(error = %e, "Command failed");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    fn staff_create(args: &[&str]) -> Result<Cli, clap::Error> {
        let base = ["emporium", "staff", "create", "-e", "a@b.co", "-n", "Ann", "-p", "pw"];
        Cli::try_parse_from(base.iter().chain(args))
    }

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_staff_role_parses() {
        let role = |args: &[&str]| match staff_create(args).ok()?.command {
            Command::Staff(StaffCommand::Create { role, .. }) => Some(role),
            Command::Migrate => None,
        };
        assert_eq!(role(&[]), Some(StaffRole::Staff));
        assert_eq!(role(&["-r", "super_admin"]), Some(StaffRole::SuperAdmin));
        assert!(staff_create(&["-r", "owner"]).is_err());
    }
}
