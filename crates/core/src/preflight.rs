//! One-shot environment gate run before anything else is built.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::logger;

const LOG_PREFIX: &str = "preflight";

/// Setting this to `1` skips every check.
pub const SKIP_ENV: &str = "AFSPELEN_SKIP_PREFLIGHT";

/// A named probe. Returns the failure reason, or `None` when satisfied.
pub struct Check {
    pub name: &'static str,
    probe: Box<dyn Fn() -> Option<String>>,
}

impl Check {
    pub fn new(name: &'static str, probe: impl Fn() -> Option<String> + 'static) -> Self {
        Self { name, probe: Box::new(probe) }
    }

    pub fn file_exists(name: &'static str, path: PathBuf) -> Self {
        Self::new(name, move || {
            (!path.is_file()).then(|| format!("required file {} is missing", path.display()))
        })
    }

    /// Creates `dir` if needed and writes a throwaway file into it.
    pub fn dir_writable(name: &'static str, dir: PathBuf) -> Self {
        Self::new(name, move || probe_writable(&dir).err())
    }
}

fn probe_writable(dir: &Path) -> Result<(), String> {
    fs::create_dir_all(dir).map_err(|e| format!("cannot create {}: {}", dir.display(), e))?;
    let probe = dir.join(".write-probe");
    fs::write(&probe, b"ok").map_err(|e| format!("{} is not writable: {}", dir.display(), e))?;
    fs::remove_file(&probe).ok();
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreflightFailure {
    pub reasons: Vec<String>,
}

impl PreflightFailure {
    /// The text shown to the user before the process exits.
    pub fn report(&self) -> String {
        format!(
            "Pre-flight checks failed. This application cannot run in the current environment.\n\nReason: {}",
            self.reasons.join("; ")
        )
    }
}

impl fmt::Display for PreflightFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pre-flight failed: {}", self.reasons.join("; "))
    }
}

impl std::error::Error for PreflightFailure {}

/// Run every check, collecting all failures. `env` looks up environment
/// variables so tests need not touch the process environment.
pub fn run(checks: &[Check], env: impl Fn(&str) -> Option<String>) -> Result<(), PreflightFailure> {
    logger::register_prefix(LOG_PREFIX, logger::COLOR_BLUE);
    if env(SKIP_ENV).as_deref() == Some("1") {
        logger::warn_p(LOG_PREFIX, &format!("{}=1, skipping all checks", SKIP_ENV));
        return Ok(());
    }

    let mut reasons = Vec::new();
    for check in checks {
        match (check.probe)() {
            None => logger::info_p(LOG_PREFIX, &format!("{}: ok", check.name)),
            Some(reason) => {
                logger::error_p(LOG_PREFIX, &format!("{}: {}", check.name, reason));
                reasons.push(reason);
            }
        }
    }

    if reasons.is_empty() {
        Ok(())
    } else {
        Err(PreflightFailure { reasons })
    }
}
