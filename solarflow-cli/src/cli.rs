mod config;
mod replay;

use clap::{Parser, Subcommand};

pub use self::{config::ConfigArgs, replay::ReplayArgs};

#[derive(Parser)]
#[command(author, version, about, propagate_version = true)]
#[must_use]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Reconcile recorded ticks and print the events as JSON lines.
    #[clap(name = "replay")]
    Replay(Box<ReplayArgs>),

    /// Validate the configuration and show the configured units.
    #[clap(name = "check-config")]
    CheckConfig(ConfigArgs),
}
