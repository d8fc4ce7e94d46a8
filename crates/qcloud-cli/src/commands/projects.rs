//! Projects command implementation.

use anyhow::Result;
use console::style;

use super::common::{GlobalArgs, connect};

/// Execute the projects command.
pub async fn execute(globals: &GlobalArgs) -> Result<()> {
    let sdk = connect(globals).await?;
    let projects = sdk.get_all_active_projects().await?;

    if projects.is_empty() {
        println!("No active projects.");
        return Ok(());
    }

    println!(
        "{} {} active project(s):\n",
        style("→").cyan().bold(),
        projects.len()
    );
    println!("  {:<36}  {}", style("PROJECT ID").bold(), style("NAME").bold());
    println!("  {}", "-".repeat(60));
    for project in &projects {
        println!(
            "  {:<36}  {}",
            style(&project.id).dim(),
            project.name.as_deref().unwrap_or("-")
        );
    }

    Ok(())
}
