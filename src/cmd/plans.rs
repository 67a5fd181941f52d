//! Catalog listing: `vivo-site plans`.

use anyhow::{Context, Result};

use vivo_site::enrollment::plans::{catalog, format_clp};

pub fn cmd_plans(json: bool) -> Result<()> {
    let plans = catalog();

    if json {
        let out = serde_json::to_string_pretty(&plans).context("Failed to serialize catalog")?;
        println!("{}", out);
        return Ok(());
    }

    println!();
    println!("Plans");
    println!("=====");
    for plan in &plans {
        println!();
        let marker = if plan.featured { "  (featured)" } else { "" };
        println!("{}  {} / {}{}", plan.name, format_clp(plan.price), plan.period, marker);
        for feature in &plan.features {
            println!("  - {}", feature);
        }
    }
    println!();
    Ok(())
}
