//! `dossier sections`: the questionnaire navigation with saved state.

use anyhow::Result;
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;

use crate::state::AppState;

pub async fn list_sections(state: &AppState, json: bool) -> Result<()> {
    let draft = state.draft_store().load(&state.identity).await?;

    if json {
        let entries: Vec<_> = state
            .config
            .sections
            .iter()
            .map(|entry| {
                serde_json::json!({
                    "key": entry.key,
                    "title": entry.title,
                    "path": entry.resource_path(),
                    "saved": draft.section(&entry.key).is_some(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("#").fg(Color::White),
        Cell::new("Key").fg(Color::White),
        Cell::new("Title").fg(Color::White),
        Cell::new("Page").fg(Color::White),
        Cell::new("Saved").fg(Color::White),
    ]);

    for (i, entry) in state.config.sections.iter().enumerate() {
        let saved = match draft.section(&entry.key) {
            Some(record) => Cell::new(format!("{} entries", record.len())).fg(Color::Green),
            None => Cell::new("-").fg(Color::DarkGrey),
        };
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(entry.key.as_str()).fg(Color::Cyan),
            Cell::new(&entry.title),
            Cell::new(entry.resource_path()).fg(Color::DarkGrey),
            saved,
        ]);
    }

    println!();
    println!(
        "  {} Sections for {}",
        style("▸").bold(),
        style(&state.identity).cyan()
    );
    println!();
    println!("{table}");
    println!();

    Ok(())
}
