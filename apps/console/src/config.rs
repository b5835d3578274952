use std::fs;

use serde::Deserialize;
use tracing::warn;

/// Timing and paging tunables for a simulated ingestion run. Defaults match
/// the production behavior; a `knowledgebase.toml` next to the binary or
/// `KB_*` environment variables override them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub tick_period_ms: u64,
    pub progress_step: u8,
    pub phase_min_ms: u64,
    pub phase_span_ms: u64,
    pub page_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tick_period_ms: 200,
            progress_step: 10,
            phase_min_ms: 2000,
            phase_span_ms: 1000,
            page_size: 5,
        }
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("knowledgebase.toml") {
        match toml::from_str::<Settings>(&raw) {
            Ok(file_cfg) => settings = file_cfg,
            Err(err) => warn!(%err, "ignoring malformed knowledgebase.toml"),
        }
    }

    if let Ok(v) = std::env::var("KB_TICK_PERIOD_MS") {
        if let Ok(parsed) = v.parse() {
            settings.tick_period_ms = parsed;
        }
    }
    if let Ok(v) = std::env::var("KB_PROGRESS_STEP") {
        if let Ok(parsed) = v.parse() {
            settings.progress_step = parsed;
        }
    }
    if let Ok(v) = std::env::var("KB_PHASE_MIN_MS") {
        if let Ok(parsed) = v.parse() {
            settings.phase_min_ms = parsed;
        }
    }
    if let Ok(v) = std::env::var("KB_PHASE_SPAN_MS") {
        if let Ok(parsed) = v.parse() {
            settings.phase_span_ms = parsed;
        }
    }
    if let Ok(v) = std::env::var("KB_PAGE_SIZE") {
        if let Ok(parsed) = v.parse() {
            settings.page_size = parsed;
        }
    }

    settings
}
