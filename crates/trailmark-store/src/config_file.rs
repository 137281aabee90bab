//! Per-workspace `config.json`: a flat map of dotted keys that overlays the
//! pipeline defaults.

use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use tracing::warn;
use trailmark_core::PipelineConfig;

use crate::StoreError;

/// Keys accepted by `trailmark config set`.
pub const CONFIG_KEYS: &[&str] = &[
    "similarity_threshold",
    "max_token_budget",
    "session.session_gap_hours",
    "session.quick_restart_minutes",
    "session.min_entries_for_session",
    "session.marker_types",
    "session.continuation_markers",
    "weights",
    "weights.context_type",
    "weights.hook_source",
    "weights.rich_tags",
    "weights.recency",
    "weights.work_continuity",
    "weights.uniqueness",
];

/// Keys whose value is a comma-separated list.
const LIST_KEYS: &[&str] = &["session.marker_types", "session.continuation_markers"];

pub fn check_key(key: &str) -> Result<(), StoreError> {
    if CONFIG_KEYS.contains(&key) {
        Ok(())
    } else {
        Err(StoreError::UnknownConfigKey(key.to_string()))
    }
}

/// Read config. Returns empty map if file doesn't exist.
pub fn read_config(path: &Path) -> anyhow::Result<Map<String, Value>> {
    if !path.exists() {
        return Ok(Map::new());
    }
    let content = std::fs::read_to_string(path)?;
    let val: Value = serde_json::from_str(&content)?;
    match val {
        Value::Object(map) => Ok(map),
        _ => {
            warn!(path = %path.display(), "config is not a JSON object, ignoring");
            Ok(Map::new())
        }
    }
}

/// Replace the config file atomically: a temp file in the same directory is
/// renamed over it, so readers never see a partial write.
pub fn write_config(path: &Path, config: &Map<String, Value>) -> anyhow::Result<()> {
    let dir = match path.parent() {
        Some(d) if !d.as_os_str().is_empty() => d,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, config)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)?;
    Ok(())
}

/// Parse a string value into an appropriate JSON value (bool/number/string).
pub fn parse_value(s: &str) -> Value {
    match s {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => {
            if let Ok(n) = s.parse::<i64>() {
                Value::Number(n.into())
            } else if let Ok(f) = s.parse::<f64>() {
                serde_json::json!(f)
            } else {
                Value::String(s.to_string())
            }
        }
    }
}

/// Like [`parse_value`], but list keys split on commas and JSON objects or
/// arrays are taken literally. Weights must sum to one, so they are usually
/// set together: `weights '{"recency": 0.25, ...}'`.
pub fn parse_value_for(key: &str, s: &str) -> Value {
    let trimmed = s.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        if let Ok(v) = serde_json::from_str(s) {
            return v;
        }
    }
    if LIST_KEYS.contains(&key) {
        Value::Array(
            s.split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(|p| Value::String(p.to_string()))
                .collect(),
        )
    } else {
        parse_value(s)
    }
}

/// Overlay a flat dotted-key map on the pipeline defaults.
pub fn pipeline_config_from_map(map: &Map<String, Value>) -> Result<PipelineConfig, StoreError> {
    let mut nested = Map::new();
    // Whole sections first so dotted keys refine them.
    let (sections, dotted): (Vec<_>, Vec<_>) = map.iter().partition(|(k, _)| !k.contains('.'));
    for (key, value) in sections.into_iter().chain(dotted) {
        if check_key(key).is_err() {
            warn!(key = %key, "ignoring unknown config key");
            continue;
        }
        match key.split_once('.') {
            Some((section, field)) => {
                let slot = nested
                    .entry(section.to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
                if let Value::Object(inner) = slot {
                    inner.insert(field.to_string(), value.clone());
                }
            }
            None => {
                nested.insert(key.clone(), value.clone());
            }
        }
    }
    serde_json::from_value(Value::Object(nested)).map_err(StoreError::InvalidConfig)
}

pub fn load_pipeline_config(path: &Path) -> anyhow::Result<PipelineConfig> {
    let map = read_config(path)?;
    Ok(pipeline_config_from_map(&map)?)
}
