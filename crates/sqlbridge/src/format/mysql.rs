use super::SqlWriter;
use crate::command::{Command, OnConflict};

/// `ER_LOCK_DEADLOCK`.
pub(super) const DEADLOCK_CODE: &str = "1213";

/// `INSERT INTO r SET k = ?, ...` with an optional `ON DUPLICATE KEY UPDATE`.
pub(super) fn insert(w: &mut SqlWriter, cmd: &Command) {
    if cmd.values.is_empty() {
        w.push(&format!("INSERT INTO {} () VALUES ()", cmd.resource));
    } else {
        w.push(&format!("INSERT INTO {} SET ", cmd.resource));
        w.set_list(cmd);
    }
    on_conflict(w, cmd);
}

fn on_conflict(w: &mut SqlWriter, cmd: &Command) {
    match &cmd.on_conflict {
        Some(OnConflict::Update { columns, .. }) => {
            let columns: Vec<&str> = if columns.is_empty() {
                cmd.values.columns().collect()
            } else {
                columns.iter().map(String::as_str).collect()
            };
            if columns.is_empty() {
                return;
            }
            let sets: Vec<String> = columns
                .iter()
                .map(|c| format!("{c} = VALUES({c})"))
                .collect();
            w.push(&format!(" ON DUPLICATE KEY UPDATE {}", sets.join(", ")));
        }
        Some(OnConflict::Ignore(key)) => {
            let key = if key.is_empty() || key == "true" {
                "id"
            } else {
                key.as_str()
            };
            w.push(&format!(" ON DUPLICATE KEY UPDATE {key} = {key}"));
        }
        Some(OnConflict::Error(_)) | None => {}
    }
}
