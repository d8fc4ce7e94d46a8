//! Devices command implementation.
//!
//! Works without credentials by falling back to the public specs.

use anyhow::Result;
use console::style;

use super::common::{GlobalArgs, connect_optional};

/// Execute the devices command.
pub async fn execute(globals: &GlobalArgs, device_type: Option<&str>) -> Result<()> {
    let sdk = connect_optional(globals).await?;
    let specs = sdk.get_device_specs().await?;

    if let Some(wanted) = device_type {
        let spec = specs
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(wanted))
            .map(|(_, spec)| spec)
            .ok_or_else(|| anyhow::anyhow!("Unknown device type: '{wanted}'"))?;

        // Specs are serialized JSON; pretty-print when they parse.
        match serde_json::from_str::<serde_json::Value>(spec) {
            Ok(value) => println!("{}", serde_json::to_string_pretty(&value)?),
            Err(_) => println!("{spec}"),
        }
        return Ok(());
    }

    let mut names: Vec<&String> = specs.keys().collect();
    names.sort();

    println!("{} {} device(s):\n", style("→").cyan().bold(), names.len());
    for name in names {
        println!("  {}", style(name).green());
    }
    if !sdk.client().is_authenticated() {
        println!(
            "\n  {}",
            style("Showing public devices; authenticate to see all of yours").dim()
        );
    }

    Ok(())
}
