use std::path::PathBuf;
use std::sync::OnceLock;

static EXE_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Template file name, looked up next to the executable.
pub const TEMPLATE_FILE: &str = "afspelen.png";

/// Directory containing the executable.
pub fn exe_dir() -> &'static PathBuf {
    EXE_DIR.get_or_init(|| {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."))
    })
}

pub fn template_path() -> PathBuf {
    exe_dir().join(TEMPLATE_FILE)
}

pub fn settings_path() -> PathBuf {
    exe_dir().join("settings.json")
}

pub fn logs_dir() -> PathBuf {
    exe_dir().join("logs")
}
