use deconz_config::Config;

use crate::cli::{ConfigArgs, ConfigCommand};
use crate::error::CliError;

pub fn handle(args: &ConfigArgs, config: &Config) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            println!("{}", deconz_config::config_path().display());
        }
        ConfigCommand::Show => {
            print!("{}", config.redacted().to_toml()?);
        }
    }
    Ok(())
}
