use crate::config::NotificationConfig;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

static EMAIL_RE: OnceLock<Regex> = OnceLock::new();

fn email_re() -> &'static Regex {
    EMAIL_RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$")
            .expect("email regex is valid")
    })
}

pub fn is_valid_email(s: &str) -> bool {
    email_re().is_match(s.trim())
}

/// Who receives the notification email for an admin action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailRecipients {
    #[serde(default)]
    pub regular_recipient_emails: Vec<String>,
    #[serde(default)]
    pub should_notify_it_governance: bool,
    #[serde(default)]
    pub should_notify_it_investment: bool,
}

impl EmailRecipients {
    /// Default selection: the requester plus the IT governance mailbox.
    pub fn for_requester(email: impl Into<String>) -> Self {
        Self {
            regular_recipient_emails: vec![email.into()],
            should_notify_it_governance: true,
            should_notify_it_investment: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.regular_recipient_emails.is_empty()
            && !self.should_notify_it_governance
            && !self.should_notify_it_investment
    }

    /// Problem with the selection, if any.
    pub fn validate(&self) -> Option<String> {
        if self.is_empty() {
            return Some("Select at least one recipient".to_string());
        }
        let invalid: Vec<&str> = self
            .regular_recipient_emails
            .iter()
            .map(String::as_str)
            .filter(|e| !is_valid_email(e))
            .collect();
        if !invalid.is_empty() {
            return Some(format!("Invalid email address: {}", invalid.join(", ")));
        }
        None
    }

    /// Concrete addresses, shared mailboxes included, without duplicates.
    pub fn resolve(&self, cfg: &NotificationConfig) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let mailboxes = [
            (self.should_notify_it_governance, &cfg.it_governance_mailbox),
            (self.should_notify_it_investment, &cfg.it_investment_mailbox),
        ];
        let candidates = self
            .regular_recipient_emails
            .iter()
            .chain(mailboxes.iter().filter(|(on, _)| *on).map(|(_, m)| *m));
        for email in candidates {
            let email = email.trim();
            if !out.iter().any(|e| e.eq_ignore_ascii_case(email)) {
                out.push(email.to_string());
            }
        }
        out
    }
}
