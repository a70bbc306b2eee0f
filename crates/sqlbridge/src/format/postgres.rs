use super::SqlWriter;
use crate::command::{Command, OnConflict};

/// SQLSTATE `deadlock_detected`.
pub(super) const DEADLOCK_SQLSTATE: &str = "40P01";

/// `INSERT INTO r (a, b) VALUES ($1, $2)` with an optional `ON CONFLICT`.
pub(super) fn insert(w: &mut SqlWriter, cmd: &Command) {
    if cmd.values.is_empty() {
        w.push(&format!("INSERT INTO {} DEFAULT VALUES", cmd.resource));
    } else {
        let columns: Vec<&str> = cmd.values.columns().collect();
        let placeholders: Vec<String> = cmd.values.iter().map(|(_, v)| w.assign(v)).collect();
        w.push(&format!(
            "INSERT INTO {} ({}) VALUES ({})",
            cmd.resource,
            columns.join(", "),
            placeholders.join(", ")
        ));
    }
    on_conflict(w, cmd);
}

fn on_conflict(w: &mut SqlWriter, cmd: &Command) {
    match &cmd.on_conflict {
        Some(OnConflict::Update {
            columns,
            constraint,
        }) => {
            let columns: Vec<&str> = if columns.is_empty() {
                cmd.values.columns().collect()
            } else {
                columns.iter().map(String::as_str).collect()
            };
            let target = constraint.as_deref().unwrap_or("id");
            if columns.is_empty() {
                w.push(&format!(" ON CONFLICT ({target}) DO NOTHING"));
                return;
            }
            let sets: Vec<String> = columns
                .iter()
                .map(|c| format!("{c} = EXCLUDED.{c}"))
                .collect();
            w.push(&format!(
                " ON CONFLICT ({target}) DO UPDATE SET {}",
                sets.join(", ")
            ));
        }
        Some(OnConflict::Ignore(_)) => w.push(" ON CONFLICT DO NOTHING"),
        Some(OnConflict::Error(_)) | None => {}
    }
}

/// PostgreSQL has no `DELETE ... ORDER BY ... LIMIT`; route through a ctid subquery.
pub(super) fn delete(w: &mut SqlWriter, cmd: &Command) {
    w.push(&format!("DELETE FROM {}", cmd.resource));
    narrowed_where(w, cmd);
}

pub(super) fn update(w: &mut SqlWriter, cmd: &Command) {
    w.push(&format!("UPDATE {} SET ", cmd.resource));
    w.set_list(cmd);
    narrowed_where(w, cmd);
}

fn narrowed_where(w: &mut SqlWriter, cmd: &Command) {
    if cmd.order.is_empty() && cmd.limit == 0 {
        w.where_clause(&cmd.where_);
        return;
    }
    w.push(&format!(" WHERE ctid IN (SELECT ctid FROM {}", cmd.resource));
    w.where_clause(&cmd.where_);
    w.order_by(&cmd.order);
    w.limit(cmd.limit);
    w.push(")");
}
