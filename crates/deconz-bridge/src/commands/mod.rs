pub mod config_cmd;
pub mod devices;
pub mod run;

use std::io::Write;

use serde_json::Value;

use deconz_config::Config;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Load the config file and environment, then apply CLI overrides.
pub fn load_config(global: &GlobalOpts) -> Result<Config, CliError> {
    let mut config = deconz_config::load_config(global.config.as_deref())?;

    if let Some(ref url) = global.url {
        config.url = Some(url.clone());
    }
    if let Some(ref key) = global.api_key {
        config.api_key = Some(key.clone());
        config.api_key_env = None;
    }
    if let Some(ref unit) = global.temperature_unit {
        config.temperature_unit.clone_from(unit);
    }
    if global.no_websocket {
        config.websocket = false;
    }
    Ok(config)
}

/// Write one compact JSON object per line.
pub fn print_json_line(out: &mut impl Write, value: &Value) -> Result<(), CliError> {
    serde_json::to_writer(&mut *out, value)?;
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(())
}
