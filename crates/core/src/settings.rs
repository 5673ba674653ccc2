use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::logger;

const MAX_SCAN_INTERVAL_SECS: f64 = 86_400.0;

/// Startup configuration. Read once, never changed while the engine runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Seconds between scans
    pub scan_interval_secs: f64,
    /// Portion of the screen around the last hit to inspect
    pub region_scale: f64,
    /// Minimum match confidence counted as a detection
    pub match_threshold: f32,
    /// Consecutive misses before scanning the whole screen
    pub max_misses_before_expand: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            scan_interval_secs: 5.0,
            region_scale: 0.4,
            match_threshold: 0.85,
            max_misses_before_expand: 3,
        }
    }
}

impl Settings {
    /// Load from `path`. A missing file yields defaults; a broken one is
    /// logged and also yields defaults.
    pub fn load(path: &Path) -> Self {
        let text = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(_) => return Self::default(),
        };
        match serde_json::from_str(&text) {
            Ok(s) => s,
            Err(e) => {
                logger::warn(&format!("failed to parse {}: {}, using defaults", path.display(), e));
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        if !self.scan_interval_secs.is_finite() || self.scan_interval_secs <= 0.0 {
            bail!("scan_interval_secs must be a positive number, got {}", self.scan_interval_secs);
        }
        if self.scan_interval_secs > MAX_SCAN_INTERVAL_SECS {
            bail!(
                "scan_interval_secs must be at most {} (one day), got {}",
                MAX_SCAN_INTERVAL_SECS,
                self.scan_interval_secs
            );
        }
        if !(self.region_scale > 0.0 && self.region_scale <= 1.0) {
            bail!("region_scale must be in (0, 1], got {}", self.region_scale);
        }
        if !(self.match_threshold > 0.0 && self.match_threshold <= 1.0) {
            bail!("match_threshold must be in (0, 1], got {}", self.match_threshold);
        }
        if self.max_misses_before_expand == 0 {
            bail!("max_misses_before_expand must be at least 1");
        }
        Ok(())
    }

    /// Out-of-range values (which `validate` rejects) clamp instead of
    /// panicking.
    pub fn scan_interval(&self) -> Duration {
        let fallback = Duration::from_secs_f64(Self::default().scan_interval_secs);
        if self.scan_interval_secs.is_nan() {
            return fallback;
        }
        Duration::try_from_secs_f64(self.scan_interval_secs.min(MAX_SCAN_INTERVAL_SECS)).unwrap_or(fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let s = Settings::load(&dir.path().join("nope.json"));
        assert_eq!(s, Settings::default());
        assert_eq!(s.scan_interval(), Duration::from_secs(5));
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "match_threshold": 0.9 }"#).unwrap();

        let s = Settings::load(&path);
        assert_eq!(s.match_threshold, 0.9);
        assert_eq!(s.max_misses_before_expand, 3);
        assert_eq!(s.region_scale, 0.4);
    }

    #[test]
    fn garbage_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(Settings::load(&path), Settings::default());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let s = Settings { scan_interval_secs: 1.5, ..Settings::default() };
        s.save(&path).unwrap();
        assert_eq!(Settings::load(&path), s);
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        assert!(Settings::default().validate().is_ok());

        let bad = [
            Settings { scan_interval_secs: 0.0, ..Settings::default() },
            Settings { scan_interval_secs: f64::NAN, ..Settings::default() },
            Settings { scan_interval_secs: 1e20, ..Settings::default() },
            Settings { scan_interval_secs: f64::INFINITY, ..Settings::default() },
            Settings { region_scale: 0.0, ..Settings::default() },
            Settings { region_scale: 1.5, ..Settings::default() },
            Settings { match_threshold: 0.0, ..Settings::default() },
            Settings { match_threshold: 1.01, ..Settings::default() },
            Settings { max_misses_before_expand: 0, ..Settings::default() },
        ];
        for s in bad {
            assert!(s.validate().is_err(), "{:?} should be rejected", s);
        }
        assert!(Settings { scan_interval_secs: 86_400.0, ..Settings::default() }.validate().is_ok());
    }

    #[test]
    fn scan_interval_never_panics() {
        let huge = Settings { scan_interval_secs: 1e20, ..Settings::default() };
        assert_eq!(huge.scan_interval(), Duration::from_secs(86_400));
        let nan = Settings { scan_interval_secs: f64::NAN, ..Settings::default() };
        assert_eq!(nan.scan_interval(), Duration::from_secs(5));
        let negative = Settings { scan_interval_secs: -1.0, ..Settings::default() };
        assert_eq!(negative.scan_interval(), Duration::from_secs(5));
    }
}
