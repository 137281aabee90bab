use clap::Subcommand;
use serde_json::{Map, Value};
use std::path::Path;
use trailmark_store::config_file::{check_key, parse_value_for, pipeline_config_from_map, CONFIG_KEYS};
use trailmark_store::{read_config, write_config};

use crate::workspace::Workspace;

// ── CLI Schema ──

#[derive(Subcommand)]
pub enum ConfigCmd {
    /// Set a config value
    Set {
        /// Config key (e.g. max_token_budget, session.session_gap_hours)
        key: String,
        /// Config value (number/bool/string; comma-separated for lists)
        value: String,
    },
    /// Get a config value
    Get {
        /// Config key
        key: String,
    },
    /// List all config values
    List,
}

// ── Dispatch ──

pub fn run(cmd: ConfigCmd, repo_root: &Path) -> anyhow::Result<()> {
    let ws = Workspace::discover(repo_root);
    match cmd {
        ConfigCmd::Set { key, value } => set(&ws.config_json, &key, &value),
        ConfigCmd::Get { key } => get(&ws.config_json, &key),
        ConfigCmd::List => list(&ws.config_json),
    }
}

// ── Command Implementations ──

/// Overlay `key = value` on `config`, rejecting keys and values the pipeline
/// would not accept.
fn apply_setting(config: &mut Map<String, Value>, key: &str, value: &str) -> anyhow::Result<()> {
    check_key(key)?;
    let mut candidate = config.clone();
    candidate.insert(key.to_string(), parse_value_for(key, value));
    pipeline_config_from_map(&candidate)?.validate()?;
    *config = candidate;
    Ok(())
}

/// `trailmark config set <key> <value>`
pub fn set(path: &Path, key: &str, value: &str) -> anyhow::Result<()> {
    let mut config = read_config(path)?;
    apply_setting(&mut config, key, value)?;
    write_config(path, &config)?;
    println!("{key} = {value}");
    Ok(())
}

/// `trailmark config get <key>`
pub fn get(path: &Path, key: &str) -> anyhow::Result<()> {
    check_key(key)?;
    let config = read_config(path)?;
    match config.get(key) {
        Some(val) => println!("{val}"),
        None => println!("(not set)"),
    }
    Ok(())
}

/// `trailmark config list`
pub fn list(path: &Path) -> anyhow::Result<()> {
    let config = read_config(path)?;
    if config.is_empty() {
        println!("(no config set)");
        println!("keys: {}", CONFIG_KEYS.join(", "));
    } else {
        for (k, v) in &config {
            println!("{k} = {v}");
        }
    }
    Ok(())
}
