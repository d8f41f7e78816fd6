use crate::output::print_json;
use anyhow::Context;
use easi_core::{config::Config, io, paths};
use std::path::Path;

pub fn run(root: &Path, name: Option<&str>, json: bool) -> anyhow::Result<()> {
    let project_name = name
        .map(str::to_string)
        .or_else(|| root.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "governance".to_string());

    let intakes = paths::intakes_dir(root);
    io::ensure_dir(&intakes).with_context(|| format!("failed to create {}", intakes.display()))?;

    let config_path = paths::config_path(root);
    let created = !config_path.exists();
    if created {
        Config::new(&project_name)
            .save(root)
            .context("failed to write config.yaml")?;
    }

    if json {
        print_json(&serde_json::json!({
            "root": root.display().to_string(),
            "project": project_name,
            "config_created": created,
        }))?;
    } else {
        println!("Initializing EASi in: {}", root.display());
        if created {
            println!("  created: {}", paths::CONFIG_FILE);
        } else {
            println!("  exists:  {}", paths::CONFIG_FILE);
        }
        println!("  ready:   {}", paths::INTAKES_DIR);
    }
    Ok(())
}
