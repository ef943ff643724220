use std::collections::HashMap;

use anyhow::Result;
use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};

use crate::identity::score_identity;
use crate::models::{self, to_fields, DriverDoc, NameOverrideDoc};
use crate::store::{DocumentStore, WriteOp};

/// Column aliases checked in priority order, against normalized headers.
const ID_COLUMNS: &[&str] = &[
    "zustellende-id",
    "transporter id",
    "transporterid",
    "associate id",
];
const NAME_COLUMNS: &[&str] = &[
    "name des zustellenden",
    "driver name",
    "name",
    "employee name",
];

/// One CSV row keyed by normalized column name.
pub type RosterRow = HashMap<String, String>;

/// A driver identifier with the last non-empty name seen for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedName {
    pub transporter_id: String,
    pub driver_name: Option<String>,
}

/// Reads roster CSV bytes into normalized rows. Headers are lowercased with
/// collapsed whitespace and the BOM stripped; values are trimmed.
pub fn read_rows(csv_bytes: &[u8]) -> Result<Vec<RosterRow>> {
    let text = String::from_utf8_lossy(csv_bytes);
    let text = text.trim_start_matches('\u{feff}');

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(normalize_header).collect();
    let mut rows = Vec::new();

    for record in reader.records() {
        let record = record?;
        let mut row = RosterRow::new();
        for (index, header) in headers.iter().enumerate() {
            if let Some(value) = record.get(index) {
                row.insert(header.clone(), value.trim().to_string());
            }
        }
        rows.push(row);
    }

    Ok(rows)
}

fn normalize_header(header: &str) -> String {
    header
        .replace('\u{feff}', "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn pick(row: &RosterRow, aliases: &[&str]) -> Option<String> {
    aliases.iter().find_map(|alias| {
        row.get(*alias)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    })
}

/// Reduces rows to one entry per transporter ID, preserving first-seen
/// order. A later non-empty name overwrites; an empty name never clears a
/// previously seen one. Rows without a resolvable ID are skipped.
pub fn resolve_names(rows: &[RosterRow]) -> Vec<ResolvedName> {
    let mut order: Vec<String> = Vec::new();
    let mut names: HashMap<String, Option<String>> = HashMap::new();

    for row in rows {
        let Some(transporter_id) = pick(row, ID_COLUMNS) else {
            continue;
        };
        let name = pick(row, NAME_COLUMNS);

        match names.entry(transporter_id.clone()) {
            std::collections::hash_map::Entry::Occupied(mut entry) => {
                if name.is_some() {
                    entry.insert(name);
                }
            }
            std::collections::hash_map::Entry::Vacant(entry) => {
                order.push(transporter_id);
                entry.insert(name);
            }
        }
    }

    order
        .into_iter()
        .map(|transporter_id| {
            let driver_name = names.remove(&transporter_id).flatten();
            ResolvedName {
                transporter_id,
                driver_name,
            }
        })
        .collect()
}

/// Upserts resolved names into the global drivers collection. Existing
/// drivers are matched by transporter ID (legacy generated ids included);
/// new drivers are created at the transporter ID itself.
pub async fn apply_global(store: &dyn DocumentStore, resolved: &[ResolvedName]) -> Result<usize> {
    let now = Utc::now();
    let mut ops = Vec::with_capacity(resolved.len());

    for entry in resolved {
        let existing = store
            .query_by_field(models::DRIVERS, "transporterId", &entry.transporter_id, 1)
            .await?;
        let (doc_id, is_new) = match existing.first() {
            Some(found) => (found.id.clone(), false),
            None => (entry.transporter_id.clone(), true),
        };

        let doc = DriverDoc {
            transporter_id: entry.transporter_id.clone(),
            driver_name: entry.driver_name.clone(),
            created_at: is_new.then_some(now),
            updated_at: Some(now),
            ..DriverDoc::default()
        };
        ops.push(WriteOp::merge(models::DRIVERS, doc_id, to_fields(&doc)?));
    }

    let count = ops.len();
    store.batch_write(ops).await?;
    info!(drivers = count, "roster applied to global drivers");
    Ok(count)
}

/// Stores resolved names as per-report overrides, then fans the names out
/// onto that report's existing score rows. The fan-out is best effort.
pub async fn apply_for_report(
    store: &dyn DocumentStore,
    report_id: &str,
    resolved: &[ResolvedName],
) -> Result<usize> {
    let now = Utc::now();
    let mut ops = Vec::with_capacity(resolved.len());

    for entry in resolved {
        let doc = NameOverrideDoc {
            report_id: report_id.to_string(),
            transporter_id: entry.transporter_id.clone(),
            driver_name: entry.driver_name.clone().unwrap_or_default(),
            updated_at: now,
        };
        ops.push(WriteOp::merge(
            models::DRIVER_NAMES,
            score_identity(report_id, &entry.transporter_id),
            to_fields(&doc)?,
        ));
    }

    let count = ops.len();
    store.batch_write(ops).await?;
    info!(report_id, names = count, "roster names stored for report");

    match denormalize_names(store, report_id, resolved).await {
        Ok(updated) if updated > 0 => {
            info!(report_id, updated, "driver names denormalized onto scores");
        }
        Ok(_) => {}
        Err(err) => {
            warn!(report_id, error = %format!("{err:#}"), "driver name denormalization skipped");
        }
    }

    Ok(count)
}

async fn denormalize_names(
    store: &dyn DocumentStore,
    report_id: &str,
    resolved: &[ResolvedName],
) -> Result<usize> {
    let now = Utc::now();
    let mut updated = 0;

    for entry in resolved {
        let Some(name) = &entry.driver_name else {
            continue;
        };

        let matches = store
            .query_by_field(models::SCORES, "transporterId", &entry.transporter_id, 500)
            .await?;
        let mut ops = Vec::new();
        for doc in matches {
            if doc.fields.get("reportId").and_then(serde_json::Value::as_str) == Some(report_id) {
                ops.push(WriteOp::update(
                    models::SCORES,
                    doc.id,
                    json!({"driverName": name, "updatedAt": now}),
                ));
            }
        }

        if !ops.is_empty() {
            updated += ops.len();
            store.batch_write(ops).await?;
        }
    }

    Ok(updated)
}
