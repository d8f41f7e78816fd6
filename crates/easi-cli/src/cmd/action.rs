use crate::output::{print_json, print_table};
use anyhow::{bail, Context};
use clap::Subcommand;
use easi_core::action::fields::{self, FieldKind, FieldValue, FormValues};
use easi_core::action::recipients::EmailRecipients;
use easi_core::action::{self, ActionForm, ActionKind, DefaultsSource, SubmitButton};
use easi_core::intake::SystemIntake;
use easi_core::store::{ActionRequest, ActionRun, IntakeStore};
use std::path::Path;

#[derive(Subcommand)]
pub enum ActionSubcommand {
    /// List the actions available on an intake and its action history
    List { id: String },
    /// Show an action's form with its default values
    Show {
        id: String,
        /// Action, e.g. issue-lcid
        action: String,
    },
    /// Fill in and submit an action form
    Run {
        id: String,
        /// Action, e.g. issue-lcid
        action: String,
        /// Field value as NAME=VALUE (repeatable)
        #[arg(long = "set", value_name = "NAME=VALUE")]
        values: Vec<String>,
        /// Replace the default recipients with these addresses (repeatable)
        #[arg(long = "to", value_name = "EMAIL")]
        to: Vec<String>,
        /// Copy the IT Governance mailbox (with --to)
        #[arg(long)]
        notify_governance: bool,
        /// Copy the IT Investment mailbox (with --to)
        #[arg(long)]
        notify_investment: bool,
        /// Complete the action without sending a notification email
        #[arg(long)]
        no_email: bool,
        /// Accept the confirmation prompt, if the action asks for one
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

pub fn run(root: &Path, subcmd: ActionSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ActionSubcommand::List { id } => list(root, &id, json),
        ActionSubcommand::Show { id, action } => show(root, &id, &action, json),
        ActionSubcommand::Run {
            id,
            action,
            values,
            to,
            notify_governance,
            notify_investment,
            no_email,
            yes,
        } => {
            let kind: ActionKind = action.parse()?;
            let recipients = (!to.is_empty()).then(|| EmailRecipients {
                regular_recipient_emails: to,
                should_notify_it_governance: notify_governance,
                should_notify_it_investment: notify_investment,
            });
            let request = ActionRequest {
                intake_id: id,
                kind,
                values: parse_values(kind, &values)?,
                recipients,
                button: if no_email {
                    SubmitButton::CompleteWithoutEmail
                } else {
                    SubmitButton::Complete
                },
                confirmed: yes,
            };
            submit(root, request, json)
        }
    }
}

/// Parse `NAME=VALUE` pairs. Checkbox fields take `true`/`false`; unknown
/// names pass through as text so the form reports them.
fn parse_values(kind: ActionKind, raw: &[String]) -> anyhow::Result<FormValues> {
    let mut values = FormValues::new();
    for pair in raw {
        let Some((name, value)) = pair.split_once('=') else {
            bail!("--set expects NAME=VALUE, got '{pair}'");
        };
        let name = name.trim();
        let is_flag = fields::field(kind, name).is_some_and(|f| f.kind == FieldKind::Bool);
        let value = if is_flag {
            match value.trim() {
                "true" | "yes" | "1" => FieldValue::Bool(true),
                "false" | "no" | "0" => FieldValue::Bool(false),
                other => bail!("{name} is a checkbox, expected true or false, got '{other}'"),
            }
        } else {
            FieldValue::Text(value.to_string())
        };
        values.set(name, value);
    }
    Ok(values)
}

fn list(root: &Path, id: &str, json: bool) -> anyhow::Result<()> {
    let intake = SystemIntake::load(root, id).with_context(|| format!("intake '{id}' not found"))?;
    let available: Vec<ActionKind> = ActionKind::all()
        .iter()
        .copied()
        .filter(|k| k.is_available(&intake))
        .collect();

    if json {
        print_json(&serde_json::json!({
            "id": intake.id,
            "available": available,
            "history": intake.history,
        }))?;
        return Ok(());
    }

    let rows = available
        .iter()
        .map(|k| vec![k.slug().to_string(), k.title().to_string()])
        .collect();
    print_table(&["ACTION", "TITLE"], rows);

    if !intake.history.is_empty() {
        println!("\nHistory:");
        for record in &intake.history {
            println!(
                "  {}  {:<20} {}",
                record.created_at.format("%Y-%m-%d %H:%M"),
                record.action.slug(),
                record.operation.name()
            );
        }
    }
    Ok(())
}

fn show(root: &Path, id: &str, action: &str, json: bool) -> anyhow::Result<()> {
    let kind: ActionKind = action.parse()?;
    let store = IntakeStore::new(root);
    let ctx = store
        .load_context(id, store.today())
        .with_context(|| format!("intake '{id}' not found"))?;
    let mut form = ActionForm::new(kind, id);
    form.hydrate(Ok(ctx.clone()))?;
    let confirmation = action::confirmation_for(kind, &ctx);
    let warnings = form.warnings(ctx.today);

    if json {
        let fields: Vec<serde_json::Value> = form
            .visible_fields()
            .iter()
            .map(|f| {
                serde_json::json!({
                    "name": f.name,
                    "label": f.label,
                    "required": f.is_required(form.values()),
                })
            })
            .collect();
        print_json(&serde_json::json!({
            "action": kind,
            "title": kind.title(),
            "fields": fields,
            "values": form.values(),
            "recipients": form.recipients(),
            "warnings": warnings,
            "confirmation": confirmation,
        }))?;
        return Ok(());
    }

    println!("{} ({})", kind.title(), kind.slug());
    if !kind.is_available(&ctx.intake) {
        println!("note: not normally offered for this intake right now");
    }
    println!();
    let rows = form
        .visible_fields()
        .iter()
        .map(|f| {
            let value = match form.values().get(f.name) {
                Some(FieldValue::Text(t)) => t.clone(),
                Some(FieldValue::Bool(b)) => b.to_string(),
                None => String::new(),
            };
            let required = if f.is_required(form.values()) { "yes" } else { "" };
            vec![f.name.to_string(), f.label.to_string(), required.to_string(), value]
        })
        .collect();
    print_table(&["FIELD", "LABEL", "REQUIRED", "DEFAULT"], rows);

    let recipients = form.recipients();
    println!(
        "\nRecipients: {}",
        if recipients.regular_recipient_emails.is_empty() {
            "-".to_string()
        } else {
            recipients.regular_recipient_emails.join(", ")
        }
    );
    for w in &warnings {
        println!("warning: {}: {}", w.field, w.message);
    }
    if let Some(modal) = confirmation {
        println!("\n{}\n{}", modal.title, modal.content);
    }
    Ok(())
}

fn submit(root: &Path, request: ActionRequest, json: bool) -> anyhow::Result<()> {
    let id = request.intake_id.clone();
    SystemIntake::load(root, &id).with_context(|| format!("intake '{id}' not found"))?;
    let run = IntakeStore::new(root).run_action(request)?;

    if json {
        print_json(&run)?;
    }

    match run {
        ActionRun::Done { flash, .. } => {
            if !json {
                if let Some(flash) = flash {
                    println!("{}", flash.text);
                }
            }
            Ok(())
        }
        ActionRun::Invalid { errors } => {
            if !json {
                for (field, message) in errors.iter() {
                    eprintln!("  {field}: {message}");
                }
            }
            bail!("the form has {} invalid field(s)", errors.len())
        }
        ActionRun::NeedsConfirmation { title, content } => {
            if !json {
                eprintln!("{title}\n{content}");
            }
            bail!("confirmation required; rerun with --yes to proceed")
        }
        ActionRun::Failed { message, .. } => bail!("{message}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_values_reads_checkboxes_as_bools() {
        let values = parse_values(
            ActionKind::IssueLcid,
            &["useExistingLcid=true".to_string(), "scope=All of it".to_string()],
        )
        .unwrap();
        assert_eq!(values.get("useExistingLcid"), Some(&FieldValue::Bool(true)));
        assert_eq!(values.text("scope"), Some("All of it"));
    }

    #[test]
    fn parse_values_rejects_missing_equals() {
        assert!(parse_values(ActionKind::CloseRequest, &["oops".to_string()]).is_err());
    }

    #[test]
    fn parse_values_rejects_bad_checkbox() {
        let err = parse_values(ActionKind::IssueLcid, &["useExistingLcid=maybe".to_string()])
            .unwrap_err();
        assert!(err.to_string().contains("maybe"));
    }
}
