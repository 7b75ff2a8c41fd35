//! CLI presentation: text and json formatters for queue listings, records and dispatches.

use crate::canonical::format_timestamp;
use crate::config::DocketConfig;
use crate::engine::DispatchOutcome;
use crate::error::ErrorKind;
use crate::record::{CanonicalRecord, DeletionStatus, RecordStatus};
use crate::refresh::RefreshState;
use crate::types::QueueKind;
use chrono::{DateTime, Utc};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;
use serde::Serialize;

const PREVIEW_CHARS: usize = 48;

/// JSON shape of a listing
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueListing<'a> {
    pub queue: QueueKind,
    pub version: u64,
    pub last_refreshed_at: Option<DateTime<Utc>>,
    pub is_refreshing: bool,
    pub retry_attempts: usize,
    pub error: Option<ErrorKind>,
    pub records: &'a [CanonicalRecord],
}

fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold())
}

fn format_time(at: Option<DateTime<Utc>>) -> String {
    at.map(|at| format_timestamp(&at))
        .unwrap_or_else(|| "-".to_string())
}

fn colored_status(status: RecordStatus) -> String {
    let label = status.as_wire();
    if status == RecordStatus::initial(status.kind()) {
        label.yellow().to_string()
    } else if status == RecordStatus::AccountDeletion(DeletionStatus::Rejected) {
        label.red().to_string()
    } else {
        label.green().to_string()
    }
}

fn preview(text: &str) -> String {
    let line = text.lines().next().unwrap_or_default();
    if line.chars().count() > PREVIEW_CHARS {
        let cut: String = line.chars().take(PREVIEW_CHARS - 1).collect();
        format!("{cut}…")
    } else {
        line.to_string()
    }
}

pub fn format_listing_text(kind: QueueKind, state: &RefreshState, records: &[CanonicalRecord]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{} ({} shown, {} in snapshot)\n",
        format_section_heading(&format!("Queue {}", kind)),
        records.len(),
        state.snapshot.len()
    ));
    out.push_str(&format!(
        "Last refreshed: {}\n",
        format_time(state.last_refreshed_at)
    ));
    if let Some(error) = state.error {
        out.push_str(&format!(
            "{} {}\n",
            format!("[{}]", error.label()).red(),
            state.error_message.as_deref().unwrap_or("refresh failed")
        ));
    }
    out.push('\n');

    if records.is_empty() {
        out.push_str("No records.\n");
        return out;
    }

    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["ID", "Status", "Subject", "Title", "Created", "Notes"]);
    for record in records {
        table.add_row(vec![
            record.id.clone(),
            colored_status(record.status),
            record.subject_id.clone(),
            preview(&record.title),
            format_time(record.created_at),
            record.notes.len().to_string(),
        ]);
    }
    out.push_str(&format!("{}\n", table));
    out
}

pub fn format_listing_json(
    kind: QueueKind,
    state: &RefreshState,
    records: &[CanonicalRecord],
) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&QueueListing {
        queue: kind,
        version: state.snapshot.version(),
        last_refreshed_at: state.last_refreshed_at,
        is_refreshing: state.is_refreshing(),
        retry_attempts: state.retry_attempts,
        error: state.error,
        records,
    })
}

pub fn format_record_text(record: &CanonicalRecord) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{}\n\n",
        format_section_heading(&format!("{} {}", record.kind, record.id))
    ));

    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.add_row(vec!["Status".to_string(), colored_status(record.status)]);
    table.add_row(vec!["Subject".to_string(), record.subject_id.clone()]);
    table.add_row(vec!["Title".to_string(), record.title.clone()]);
    table.add_row(vec!["Created".to_string(), format_time(record.created_at)]);
    table.add_row(vec!["Updated".to_string(), format_time(record.updated_at)]);
    table.add_row(vec![
        "Reviewed by".to_string(),
        record.reviewed_by.clone().unwrap_or_else(|| "-".to_string()),
    ]);
    table.add_row(vec!["Reviewed at".to_string(), format_time(record.reviewed_at)]);
    for (key, value) in &record.extras {
        let value = value
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| value.to_string());
        table.add_row(vec![key.clone(), value]);
    }
    out.push_str(&format!("{}\n\n", table));

    if !record.body.is_empty() {
        out.push_str(&format!("{}\n{}\n\n", format_section_heading("Body"), record.body));
    }

    if !record.notes.is_empty() {
        out.push_str(&format!("{}\n\n", format_section_heading("Audit trail")));
        let mut notes = Table::new();
        notes.load_preset(UTF8_BORDERS_ONLY);
        notes.set_header(vec!["#", "Author", "Role", "At", "Text"]);
        for (index, note) in record.notes.iter().enumerate() {
            notes.add_row(vec![
                (index + 1).to_string(),
                note.author_id.clone(),
                note.author_role
                    .map(|role| role.as_str().to_string())
                    .unwrap_or_else(|| "-".to_string()),
                format_time(note.at),
                note.text.clone(),
            ]);
        }
        out.push_str(&format!("{}\n", notes));
    }
    out
}

pub fn format_dispatch_text(outcome: &DispatchOutcome) -> String {
    let mut out = format!(
        "{} {} is now {}\n",
        "✓".green(),
        outcome.record.id,
        colored_status(outcome.record.status)
    );
    for effect in &outcome.side_effects {
        out.push_str(&format!("  side effect: {}\n", effect.describe()));
    }
    out
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DispatchJson<'a> {
    record: &'a CanonicalRecord,
    side_effects: &'a [crate::review::SideEffect],
}

pub fn format_dispatch_json(outcome: &DispatchOutcome) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&DispatchJson {
        record: &outcome.record,
        side_effects: &outcome.side_effects,
    })
}

/// Effective configuration as TOML, with the store token masked
pub fn format_config(config: &DocketConfig) -> Result<String, toml::ser::Error> {
    let mut shown = config.clone();
    if shown.store.api_token.is_some() {
        shown.store.api_token = Some("********".to_string());
    }
    toml::to_string_pretty(&shown)
}
