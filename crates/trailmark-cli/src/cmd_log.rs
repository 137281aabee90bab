use std::path::Path;

use crate::render::render_entry_line;
use crate::workspace::Workspace;

pub fn execute(repo_root: &Path, limit: usize, json: bool) -> anyhow::Result<()> {
    let ws = Workspace::discover(repo_root);
    let entries = ws.open_store()?.recent(Some(&ws.id), limit)?;

    if entries.is_empty() {
        println!("No checkpoints recorded in this workspace.");
        return Ok(());
    }

    if json {
        for e in &entries {
            println!("{}", serde_json::to_string(e)?);
        }
    } else {
        for e in &entries {
            println!("{}", render_entry_line(e));
        }
        println!("\n({} checkpoints shown)", entries.len());
    }
    Ok(())
}
