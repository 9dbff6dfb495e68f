use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::UtcOffset;

use crate::domain::OTHER_PROBLEM_TYPE;
use crate::error::AppError;

/// Engine tuning knobs. Every field has a default so partial JSON files are accepted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    pub autosave_debounce_ms: u64,
    pub search_debounce_ms: u64,
    /// How long a failed save stays in the `Error` state before reverting to idle.
    pub error_display_ms: u64,
    pub refetch_interval_ms: u64,
    pub page_size: usize,
    /// Local offset used for midnight normalization, calendar bucketing and display dates.
    pub utc_offset_minutes: i32,
    pub privileged_roles: Vec<String>,
    pub assignee_roster: Vec<String>,
    pub problem_types: Vec<String>,
    pub import_workers: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            autosave_debounce_ms: 1_000,
            search_debounce_ms: 500,
            error_display_ms: 4_000,
            refetch_interval_ms: 30_000,
            page_size: 10,
            utc_offset_minutes: 0,
            privileged_roles: vec!["admin".to_string(), "soporte".to_string()],
            assignee_roster: vec![
                "Carlos Méndez".to_string(),
                "Lucía Ramírez".to_string(),
                "Jorge Salinas".to_string(),
            ],
            problem_types: [
                "Hardware",
                "Software",
                "Red",
                "Impresora",
                "Correo",
                "Acceso",
                OTHER_PROBLEM_TYPE,
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            import_workers: 8,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, AppError> {
        let cfg: EngineConfig = serde_json::from_str(raw).map_err(|e| {
            AppError::validation("CONFIG_DECODE_FAILED", "Failed to decode engine config JSON")
                .with_details(e.to_string())
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: &Path) -> Result<Self, AppError> {
        let raw = fs::read_to_string(path).map_err(|e| {
            AppError::internal("CONFIG_READ_FAILED", "Failed to read engine config")
                .with_details(format!("path={}: {}", path.display(), e))
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        let invalid = |details: String| {
            Err(AppError::validation("CONFIG_INVALID", "Engine config is invalid").with_details(details))
        };
        if self.page_size == 0 {
            return invalid("page_size must be > 0".to_string());
        }
        if self.autosave_debounce_ms == 0 || self.search_debounce_ms == 0 {
            return invalid("debounce windows must be > 0".to_string());
        }
        if self.assignee_roster.iter().all(|a| a.trim().is_empty()) {
            return invalid("assignee_roster must name at least one technician".to_string());
        }
        if self.import_workers == 0 {
            return invalid("import_workers must be > 0".to_string());
        }
        if self.utc_offset().is_none() {
            return invalid(format!(
                "utc_offset_minutes out of range: {}",
                self.utc_offset_minutes
            ));
        }
        Ok(())
    }

    pub fn autosave_debounce(&self) -> Duration {
        Duration::from_millis(self.autosave_debounce_ms)
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    pub fn error_display(&self) -> Duration {
        Duration::from_millis(self.error_display_ms)
    }

    pub fn refetch_interval(&self) -> Duration {
        Duration::from_millis(self.refetch_interval_ms)
    }

    fn utc_offset(&self) -> Option<UtcOffset> {
        UtcOffset::from_whole_seconds(self.utc_offset_minutes.checked_mul(60)?).ok()
    }

    /// Validated configs always carry a representable offset; UTC otherwise.
    pub fn local_offset(&self) -> UtcOffset {
        self.utc_offset().unwrap_or(UtcOffset::UTC)
    }

    pub fn is_known_problem_type(&self, raw: &str) -> bool {
        self.problem_types.iter().any(|p| p == raw)
    }
}
