use deconz_core::{Adapter, AdapterConfig};

use crate::error::CliError;

/// One pairing pass; prints the classified devices as a JSON array.
pub async fn handle(config: AdapterConfig) -> Result<(), CliError> {
    let devices = Adapter::discover_only(config).await?;
    tracing::info!(count = devices.len(), "discovery finished");
    println!("{}", serde_json::to_string_pretty(&devices)?);
    Ok(())
}
