//! Subcommand dispatch and execution.
//!
//! The [`dispatch`] function routes the parsed CLI to the appropriate
//! subcommand handler: [`run`], [`init`], [`validate`], or [`health`].

pub mod health;
pub mod init;
pub mod run;
pub mod validate;

use crate::cli::{Cli, Commands};
use crate::error::ShadowTrafficError;

pub async fn dispatch(cli: Cli) -> Result<(), ShadowTrafficError> {
    match cli.command {
        Some(Commands::Run(args)) => run::execute(*args).await,
        Some(Commands::Init(ref args)) => init::execute(args),
        Some(Commands::Validate(ref args)) => validate::execute(args),
        Some(Commands::Health(args)) => health::execute(args).await,
        None => {
            print_welcome();
            Ok(())
        }
    }
}

fn print_welcome() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        "\n  shadowtraffic v{version}: mirror live HTTP traffic to shadow hosts\n\n  \
         No command provided. To get started:\n\n    \
         shadowtraffic init                  Generate a starter config\n    \
         shadowtraffic run                   Start (auto-detects ./shadowtraffic.yaml)\n    \
         shadowtraffic run -c shadow.yaml    Start with a specific config file\n    \
         shadowtraffic --help                See all commands and options\n"
    );
}
