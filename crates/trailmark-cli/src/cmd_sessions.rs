use std::path::Path;
use trailmark_core::{EntryFilter, EntrySource, WorkspaceScope};
use trailmark_intel::SessionSegmenter;

use crate::render::render_sessions;
use crate::workspace::Workspace;

pub fn execute(repo_root: &Path, days: u32, json: bool) -> anyhow::Result<()> {
    let ws = Workspace::discover(repo_root);
    let config = ws.pipeline_config()?;
    config.session.validate()?;

    let filter = EntryFilter {
        workspace: WorkspaceScope::Workspace(ws.id.clone()),
        ..EntryFilter::last_days(days)
    };
    let entries = ws.open_store()?.fetch_entries(&filter)?;
    let sessions = SessionSegmenter::new(&config.session).detect_sessions(&entries);

    if json {
        println!("{}", serde_json::to_string_pretty(&sessions)?);
    } else if sessions.is_empty() {
        println!("No sessions in the last {days} days.");
    } else {
        print!("{}", render_sessions(&sessions));
        println!("\n({} sessions from {} checkpoints)", sessions.len(), entries.len());
    }
    Ok(())
}
