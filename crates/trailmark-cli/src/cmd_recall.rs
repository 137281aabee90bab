use std::path::Path;
use trailmark_core::clock::parse_ts;
use trailmark_core::types::ContextTypeTable;
use trailmark_core::{
    EntryFilter, EntryType, PipelineConfig, TimeWindow, WorkContext, WorkspaceScope,
};
use trailmark_intel::ContextPipeline;

use crate::render::render_digest;
use crate::workspace::Workspace;

const DEFAULT_DAYS: u32 = 7;

pub struct RecallParams<'a> {
    pub repo_root: &'a Path,
    pub days: Option<u32>,
    pub from: Option<&'a str>,
    pub to: Option<&'a str>,
    pub query: Option<&'a str>,
    pub project: Option<&'a str>,
    pub all_workspaces: bool,
    pub budget: Option<i64>,
    pub threshold: Option<f64>,
    pub active_project: Option<&'a str>,
    pub tech: &'a [String],
    pub work_type: Option<&'a str>,
    pub json: bool,
}

pub fn execute(params: &RecallParams<'_>) -> anyhow::Result<()> {
    let ws = Workspace::discover(params.repo_root);
    let config = apply_overrides(ws.pipeline_config()?, params);
    let pipeline = ContextPipeline::new(config)?;

    let filter = build_filter(params, &ws.id)?;
    let context = build_context(params)?;
    let store = ws.open_store()?;
    let digest = pipeline.recall(&store, &filter, context.as_ref())?;

    if params.json {
        println!("{}", serde_json::to_string_pretty(&digest)?);
    } else {
        print!("{}", render_digest(&digest, &ContextTypeTable::default(), true));
    }
    Ok(())
}

/// Command-line flags win over `config.json`.
fn apply_overrides(mut config: PipelineConfig, params: &RecallParams<'_>) -> PipelineConfig {
    if let Some(budget) = params.budget {
        config.max_token_budget = budget;
    }
    if let Some(threshold) = params.threshold {
        config.similarity_threshold = threshold;
    }
    config
}

fn build_filter(params: &RecallParams<'_>, workspace_id: &str) -> anyhow::Result<EntryFilter> {
    for bound in [params.from, params.to].into_iter().flatten() {
        if parse_ts(bound).is_none() {
            anyhow::bail!("invalid timestamp '{bound}' (expected RFC 3339, e.g. 2026-04-01T00:00:00Z)");
        }
    }

    let window = if params.from.is_some() || params.to.is_some() {
        TimeWindow::Range {
            from: params.from.map(str::to_string),
            to: params.to.map(str::to_string),
        }
    } else {
        TimeWindow::Days(params.days.unwrap_or(DEFAULT_DAYS))
    };
    let workspace = if params.all_workspaces {
        WorkspaceScope::All
    } else {
        WorkspaceScope::Workspace(workspace_id.to_string())
    };

    Ok(EntryFilter {
        window,
        query: params.query.map(str::to_string),
        project: params.project.map(str::to_string),
        workspace,
    })
}

fn build_context(params: &RecallParams<'_>) -> anyhow::Result<Option<WorkContext>> {
    let work_type = match params.work_type {
        Some(raw) => Some(raw.parse::<EntryType>().map_err(anyhow::Error::msg)?),
        None => None,
    };
    let context = WorkContext {
        project: params.active_project.map(str::to_string),
        tech_tags: params.tech.iter().cloned().collect(),
        work_type,
    };
    Ok((!context.is_empty()).then_some(context))
}
