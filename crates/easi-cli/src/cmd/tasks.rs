use crate::output::{print_json, print_table};
use anyhow::Context;
use easi_core::intake::SystemIntake;
use std::path::Path;

pub fn run(root: &Path, id: &str, json: bool) -> anyhow::Result<()> {
    let intake = SystemIntake::load(root, id).with_context(|| format!("intake '{id}' not found"))?;
    let tasks = intake.task_list();

    if json {
        print_json(&serde_json::json!({
            "id": intake.id,
            "current_stage": intake.current_stage(),
            "rows": tasks.rows,
        }))?;
        return Ok(());
    }

    println!("{} ({})", intake.request_name, intake.id);
    let current = intake.current_stage();
    let rows = tasks
        .rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let marker = if Some(row.stage) == current { ">" } else { "" };
            vec![
                marker.to_string(),
                format!("{}.", i + 1),
                row.stage.label().to_string(),
                row.status.label().to_string(),
                if row.has_feedback { "read feedback" } else { "" }.to_string(),
            ]
        })
        .collect();
    print_table(&["", "#", "STEP", "STATUS", "FEEDBACK"], rows);
    Ok(())
}
