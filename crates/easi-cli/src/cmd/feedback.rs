use crate::output::{or_dash, print_json, print_table};
use anyhow::{bail, Context};
use clap::Subcommand;
use easi_core::feedback;
use easi_core::intake::SystemIntake;
use easi_core::types::{FeedbackTarget, FeedbackType, TaskStage};
use std::path::Path;

#[derive(Subcommand)]
pub enum FeedbackSubcommand {
    /// Add feedback to an intake
    Add {
        id: String,
        /// Form the feedback is about, e.g. intake-request, draft-business-case
        #[arg(long)]
        target: String,
        /// governance-team (default) or reviewer
        #[arg(long = "type", default_value = "governance-team")]
        feedback_type: String,
        #[arg(long)]
        author: Option<String>,
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// List feedback by task-list row
    List { id: String },
}

pub fn run(root: &Path, subcmd: FeedbackSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        FeedbackSubcommand::Add {
            id,
            target,
            feedback_type,
            author,
            text,
        } => add(root, &id, &target, &feedback_type, author, &text.join(" "), json),
        FeedbackSubcommand::List { id } => list(root, &id, json),
    }
}

fn add(
    root: &Path,
    id: &str,
    target: &str,
    feedback_type: &str,
    author: Option<String>,
    text: &str,
    json: bool,
) -> anyhow::Result<()> {
    let target: FeedbackTarget = target.parse()?;
    let kind: FeedbackType = feedback_type.parse()?;
    if text.trim().is_empty() {
        bail!("feedback must not be empty");
    }

    let mut intake =
        SystemIntake::load(root, id).with_context(|| format!("intake '{id}' not found"))?;
    let fb_id = feedback::add(&mut intake.feedback, target, kind, text.trim(), author);
    intake.save(root).context("failed to save intake")?;

    if json {
        print_json(&serde_json::json!({ "id": intake.id, "feedback_id": fb_id }))?;
    } else {
        println!("Added feedback [{fb_id}] on {}", target.stage().label());
    }
    Ok(())
}

fn list(root: &Path, id: &str, json: bool) -> anyhow::Result<()> {
    let intake = SystemIntake::load(root, id).with_context(|| format!("intake '{id}' not found"))?;
    let ordered: Vec<_> = TaskStage::all()
        .iter()
        .flat_map(|&stage| feedback::feedback_for(&intake.feedback, stage))
        .collect();

    if json {
        print_json(&ordered)?;
        return Ok(());
    }
    if ordered.is_empty() {
        println!("No feedback.");
        return Ok(());
    }
    let rows = ordered
        .iter()
        .map(|r| {
            vec![
                r.id.clone(),
                r.target_form.stage().label().to_string(),
                r.feedback_type.to_string(),
                or_dash(r.author.as_deref()),
                r.feedback.clone(),
            ]
        })
        .collect();
    print_table(&["ID", "STEP", "FROM", "AUTHOR", "FEEDBACK"], rows);
    Ok(())
}
