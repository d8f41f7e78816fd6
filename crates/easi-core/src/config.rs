use crate::action::recipients::is_valid_email;
use crate::error::{EasiError, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// NotificationConfig
// ---------------------------------------------------------------------------

/// Shared mailboxes that the "notify IT governance" / "notify IT investment"
/// recipient checkboxes expand to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default = "default_governance_mailbox")]
    pub it_governance_mailbox: String,
    #[serde(default = "default_investment_mailbox")]
    pub it_investment_mailbox: String,
}

fn default_governance_mailbox() -> String {
    "it_governance@example.gov".to_string()
}

fn default_investment_mailbox() -> String {
    "it_investments@example.gov".to_string()
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            it_governance_mailbox: default_governance_mailbox(),
            it_investment_mailbox: default_investment_mailbox(),
        }
    }
}

// ---------------------------------------------------------------------------
// LcidConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LcidConfig {
    /// Suggested lifetime of a newly issued LCID, used to prefill `expiresAt`.
    #[serde(default = "default_term_years")]
    pub default_term_years: u32,
}

fn default_term_years() -> u32 {
    5
}

impl Default for LcidConfig {
    fn default() -> Self {
        Self {
            default_term_years: default_term_years(),
        }
    }
}

// ---------------------------------------------------------------------------
// ProjectConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    pub project: ProjectConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub lcid: LcidConfig,
}

fn default_version() -> u32 {
    1
}

impl Config {
    pub fn new(project_name: impl Into<String>) -> Self {
        Self {
            version: 1,
            project: ProjectConfig {
                name: project_name.into(),
                description: None,
            },
            notifications: NotificationConfig::default(),
            lcid: LcidConfig::default(),
        }
    }

    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(EasiError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        let mailboxes = [
            ("it_governance_mailbox", &self.notifications.it_governance_mailbox),
            ("it_investment_mailbox", &self.notifications.it_investment_mailbox),
        ];
        for (key, value) in mailboxes {
            if !is_valid_email(value) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("notifications.{key} '{value}' is not a valid email address"),
                });
            }
        }

        if self.lcid.default_term_years == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "lcid.default_term_years is 0; new LCIDs will be prefilled as already expired"
                    .to_string(),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::new("governance");
        let yaml = serde_yaml::to_string(&cfg).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.project.name, "governance");
        assert_eq!(parsed.version, 1);
        assert_eq!(parsed.lcid.default_term_years, 5);
    }

    #[test]
    fn minimal_yaml_fills_defaults() {
        let yaml = "version: 1\nproject:\n  name: my-project\n";
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            cfg.notifications.it_governance_mailbox,
            "it_governance@example.gov"
        );
    }

    #[test]
    fn load_requires_init() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            Config::load(dir.path()),
            Err(EasiError::NotInitialized)
        ));
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        Config::new("p").save(dir.path()).unwrap();
        assert_eq!(Config::load(dir.path()).unwrap().project.name, "p");
    }

    #[test]
    fn validate_valid_config_no_warnings() {
        assert!(Config::new("p").validate().is_empty());
    }

    #[test]
    fn validate_flags_bad_mailbox_and_zero_term() {
        let mut cfg = Config::new("p");
        cfg.notifications.it_investment_mailbox = "not-an-email".to_string();
        cfg.lcid.default_term_years = 0;
        let warnings = cfg.validate();
        assert_eq!(warnings.len(), 2);
        assert!(warnings
            .iter()
            .any(|w| w.level == WarnLevel::Error && w.message.contains("it_investment_mailbox")));
    }
}
