use crate::error::{EasiError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const EASI_DIR: &str = ".easi";
pub const INTAKES_DIR: &str = ".easi/intakes";

pub const CONFIG_FILE: &str = ".easi/config.yaml";
pub const MANIFEST_FILE: &str = "manifest.yaml";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn easi_dir(root: &Path) -> PathBuf {
    root.join(EASI_DIR)
}

pub fn intakes_dir(root: &Path) -> PathBuf {
    root.join(INTAKES_DIR)
}

pub fn intake_dir(root: &Path, id: &str) -> PathBuf {
    intakes_dir(root).join(id)
}

pub fn intake_manifest(root: &Path, id: &str) -> PathBuf {
    intake_dir(root, id).join(MANIFEST_FILE)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

/// Path on the requester/admin UI where an intake's action list lives.
/// Successful actions redirect here.
pub fn action_list_route(id: &str) -> String {
    format!("/it-governance/{id}/actions")
}

// ---------------------------------------------------------------------------
// Intake ID validation
// ---------------------------------------------------------------------------

static INTAKE_ID_RE: OnceLock<Regex> = OnceLock::new();

fn intake_id_re() -> &'static Regex {
    INTAKE_ID_RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_\-]*$").expect("intake id regex is valid")
    })
}

/// Intake IDs name a directory under `.easi/intakes/`; anything that could
/// step outside it is rejected.
pub fn validate_intake_id(id: &str) -> Result<()> {
    if id.len() > 64 || !intake_id_re().is_match(id) {
        return Err(EasiError::InvalidValue(format!("invalid intake id '{id}'")));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
