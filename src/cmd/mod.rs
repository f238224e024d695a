//! Subcommand dispatch and execution.
//!
//! The [`dispatch`] function routes the parsed CLI to the appropriate
//! subcommand handler: [`run`], [`init`], [`validate`], or [`health`].

pub mod health;
pub mod init;
pub mod run;
pub mod validate;

use crate::cli::{Cli, Commands};
use crate::error::ForwarderError;

pub async fn dispatch(cli: Cli) -> Result<(), ForwarderError> {
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
        "\n  forwarder v{version} \u{2014} single-upstream HTTP reverse proxy\n\n  \
         No command provided. To get started:\n\n    \
         forwarder run                     Listen on :80 and forward to web:5000\n    \
         forwarder init                    Generate a starter config\n    \
         forwarder run -c forwarder.yaml   Start with a specific config file\n    \
         forwarder --help                  See all commands and options\n"
    );
}
