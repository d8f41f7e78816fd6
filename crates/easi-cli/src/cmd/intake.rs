use crate::output::{or_dash, print_json, print_table};
use anyhow::{bail, Context};
use chrono::Utc;
use clap::Subcommand;
use easi_core::action::recipients::is_valid_email;
use easi_core::intake::{Contact, SystemIntake};
use easi_core::types::{StepStatus, TaskStage};
use std::path::Path;

#[derive(Subcommand)]
pub enum IntakeSubcommand {
    /// Start a new request on the intake form
    Create {
        /// Request name
        #[arg(required = true)]
        name: Vec<String>,
        /// Requester's name
        #[arg(long)]
        requester: String,
        /// Requester's email address
        #[arg(long)]
        email: String,
        /// Additional contact as NAME=EMAIL (repeatable)
        #[arg(long = "contact")]
        contacts: Vec<String>,
    },
    /// List all intakes
    List,
    /// Show one intake
    Show { id: String },
    /// Set the stored status of one task-list stage
    SetStatus {
        id: String,
        /// Stage, e.g. draft-business-case
        stage: String,
        /// Status, e.g. submitted
        status: String,
    },
}

pub fn run(root: &Path, subcmd: IntakeSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        IntakeSubcommand::Create {
            name,
            requester,
            email,
            contacts,
        } => create(root, &name.join(" "), requester, email, &contacts, json),
        IntakeSubcommand::List => list(root, json),
        IntakeSubcommand::Show { id } => show(root, &id, json),
        IntakeSubcommand::SetStatus { id, stage, status } => {
            set_status(root, &id, &stage, &status, json)
        }
    }
}

fn parse_contact(raw: &str) -> anyhow::Result<Contact> {
    let Some((name, email)) = raw.split_once('=') else {
        bail!("contact must be NAME=EMAIL, got '{raw}'");
    };
    let email = email.trim();
    if !is_valid_email(email) {
        bail!("invalid email address: {email}");
    }
    Ok(Contact {
        name: name.trim().to_string(),
        email: email.to_string(),
        role: None,
    })
}

fn create(
    root: &Path,
    name: &str,
    requester: String,
    email: String,
    contacts: &[String],
    json: bool,
) -> anyhow::Result<()> {
    if !is_valid_email(&email) {
        bail!("invalid email address: {email}");
    }
    let contacts = contacts
        .iter()
        .map(|c| parse_contact(c))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let mut intake = SystemIntake::create(
        root,
        name,
        Contact {
            name: requester,
            email,
            role: None,
        },
    )
    .context("failed to create intake")?;
    if !contacts.is_empty() {
        intake.contacts = contacts;
        intake.save(root).context("failed to save intake")?;
    }

    if json {
        print_json(&intake)?;
    } else {
        println!("Created intake {}: {}", intake.id, intake.request_name);
    }
    Ok(())
}

fn list(root: &Path, json: bool) -> anyhow::Result<()> {
    let intakes = SystemIntake::list(root).context("failed to list intakes")?;
    let today = Utc::now().date_naive();

    if json {
        let items: Vec<serde_json::Value> = intakes
            .iter()
            .map(|i| {
                serde_json::json!({
                    "id": i.id,
                    "request_name": i.request_name,
                    "state": i.state,
                    "decision_state": i.decision_state,
                    "current_stage": i.current_stage(),
                    "lcid": i.lcid.as_ref().map(|l| &l.lcid),
                })
            })
            .collect();
        print_json(&items)?;
        return Ok(());
    }

    if intakes.is_empty() {
        println!("No intakes.");
        return Ok(());
    }
    let rows = intakes
        .iter()
        .map(|i| {
            vec![
                i.id.clone(),
                i.request_name.clone(),
                i.state.to_string(),
                or_dash(i.current_stage().map(|s| s.label())),
                or_dash(
                    i.lcid
                        .as_ref()
                        .map(|l| format!("{} ({})", l.lcid, l.status(today))),
                ),
            ]
        })
        .collect();
    print_table(&["ID", "NAME", "STATE", "CURRENT STEP", "LCID"], rows);
    Ok(())
}

fn show(root: &Path, id: &str, json: bool) -> anyhow::Result<()> {
    let intake = SystemIntake::load(root, id).with_context(|| format!("intake '{id}' not found"))?;
    if json {
        print_json(&intake)?;
        return Ok(());
    }

    let today = Utc::now().date_naive();
    println!("Intake:    {}", intake.id);
    println!("Name:      {}", intake.request_name);
    println!(
        "Requester: {} <{}>",
        intake.requester.name, intake.requester.email
    );
    println!("Step:      {}", intake.step);
    println!("State:     {}", intake.state);
    println!("Decision:  {}", intake.decision_state);
    if let Some(stage) = intake.current_stage() {
        println!("Current:   {}", stage.label());
    }
    if let Some(date) = intake.grt_date {
        println!("GRT date:  {date}");
    }
    if let Some(date) = intake.grb_date {
        println!("GRB date:  {date}");
    }
    if let Some(lcid) = &intake.lcid {
        println!(
            "LCID:      {} ({}, expires {})",
            lcid.lcid,
            lcid.status(today),
            lcid.expires_at
        );
        if let Some(retires) = lcid.retires_at {
            println!("Retires:   {retires}");
        }
    }
    if !intake.history.is_empty() {
        println!("\nHistory:");
        for record in &intake.history {
            println!(
                "  {}  {}",
                record.created_at.format("%Y-%m-%d %H:%M"),
                record.operation.name()
            );
        }
    }
    Ok(())
}

fn set_status(root: &Path, id: &str, stage: &str, status: &str, json: bool) -> anyhow::Result<()> {
    let stage: TaskStage = stage.parse()?;
    let status: StepStatus = status.parse()?;
    let mut intake =
        SystemIntake::load(root, id).with_context(|| format!("intake '{id}' not found"))?;
    intake.set_step_status(stage, status);
    if status == StepStatus::Submitted && stage == TaskStage::IntakeForm {
        intake.submitted_at = Some(Utc::now());
    }
    intake.save(root).context("failed to save intake")?;

    let resolved = intake.task_list().status(stage);
    if json {
        print_json(&serde_json::json!({
            "id": intake.id,
            "stage": stage,
            "stored": status,
            "resolved": resolved,
        }))?;
    } else {
        println!("{}: {} (shows as \"{}\")", stage.label(), status, resolved.label());
    }
    Ok(())
}
