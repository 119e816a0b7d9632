use std::path::PathBuf;

use clap::Parser;

use crate::{config::Config, prelude::*, tables::build_units_table};

#[derive(Parser)]
pub struct ConfigArgs {
    /// Path to the TOML configuration.
    #[clap(long = "config", env = "SOLARFLOW_CONFIG", default_value = "solarflow.toml")]
    pub path: PathBuf,
}

impl ConfigArgs {
    pub fn load(&self) -> Result<Config> {
        Config::from_path(&self.path)
    }

    pub fn check(&self) -> Result {
        let config = self.load()?;
        println!("{}", build_units_table(&config));
        info!(
            window = %humantime::format_duration(config.window.to_std()?),
            prices = config.prices.is_some(),
            "the configuration is valid",
        );
        Ok(())
    }
}
