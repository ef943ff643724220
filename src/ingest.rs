use std::sync::Arc;

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use serde_json::json;
use tracing::{error, info};

use crate::identity::{fallback_report_id, score_identity, ReportKey};
use crate::models::{
    self, to_fields, DriverDoc, KpiScores, KpiValues, ParsedSummary, ParserResponse, ReportDoc,
    ReportStatus, ScoreDoc,
};
use crate::parser::ReportParser;
use crate::status::bucket_for;
use crate::store::{DocumentStore, WriteOp};

/// End-to-end report pipeline: parse uploaded PDF bytes, derive identities,
/// and commit report, score and driver documents in one batch.
pub struct ReportIngestor {
    store: Arc<dyn DocumentStore>,
    parser: Arc<dyn ReportParser>,
}

#[derive(Debug)]
pub struct IngestOutcome {
    pub report_id: String,
    pub scores_written: usize,
    pub rows_skipped: usize,
}

impl ReportIngestor {
    pub fn new(store: Arc<dyn DocumentStore>, parser: Arc<dyn ReportParser>) -> Self {
        Self { store, parser }
    }

    /// Ingests one uploaded report file. Re-running on the same file or the
    /// same station/week converges on the same documents. On failure the
    /// report is marked `failed` and the error is returned for the trigger's
    /// retry policy.
    pub async fn ingest(&self, storage_path: &str, bytes: Vec<u8>) -> Result<IngestOutcome> {
        let report_name = basename(storage_path);

        // A document already tracking this file keeps its id, legacy
        // generated ids included.
        let prior = self
            .store
            .query_by_field(models::REPORTS, "storagePath", storage_path, 1)
            .await?;
        let prior_id = prior.first().map(|doc| doc.id.clone());

        if let Some(id) = &prior_id {
            self.store
                .batch_write(vec![WriteOp::merge(
                    models::REPORTS,
                    id.clone(),
                    json!({"status": ReportStatus::Processing, "updatedAt": Utc::now()}),
                )])
                .await?;
        }

        let response = match self.parser.parse(bytes, report_name).await {
            Ok(response) => response,
            Err(err) => {
                self.mark_failed(prior_id.as_deref(), &err).await;
                return Err(err);
            }
        };

        let summary = response.summary.clone().unwrap_or_default();
        let key = ReportKey::new(
            summary.station_code.as_deref(),
            summary.year,
            summary.week_number,
        );
        let report_id = prior_id.unwrap_or_else(|| key.id());

        match self
            .commit(&report_id, &key, storage_path, report_name, &summary, &response)
            .await
        {
            Ok(outcome) => {
                info!(
                    report_id = %outcome.report_id,
                    station = %key.station,
                    year = key.year,
                    week = key.week,
                    scores = outcome.scores_written,
                    skipped = outcome.rows_skipped,
                    "report ingested"
                );
                Ok(outcome)
            }
            Err(err) => {
                self.mark_failed(Some(&report_id), &err).await;
                Err(err)
            }
        }
    }

    async fn commit(
        &self,
        report_id: &str,
        key: &ReportKey,
        storage_path: &str,
        report_name: &str,
        summary: &ParsedSummary,
        response: &ParserResponse,
    ) -> Result<IngestOutcome> {
        let now = Utc::now();
        let report_date = key.reference_date();
        let existing = self.store.get(models::REPORTS, report_id).await?;

        let summary = ParsedSummary {
            station_code: Some(key.station.clone()),
            year: Some(key.year),
            week_number: Some(key.week),
            ..summary.clone()
        };

        // The report becomes visible as `processing` before row writes, so a
        // re-upload of a finished week passes back through that state.
        let report = ReportDoc {
            report_name: report_name.to_string(),
            storage_path: storage_path.to_string(),
            status: ReportStatus::Processing,
            report_date,
            year: key.year,
            week_number: key.week,
            station_code: key.station.clone(),
            summary,
            created_at: existing.is_none().then_some(now),
            updated_at: now,
        };
        self.store
            .batch_write(vec![WriteOp::merge(
                models::REPORTS,
                report_id,
                to_fields(&report)?,
            )])
            .await?;

        let mut ops = Vec::new();
        let mut score_ids = std::collections::HashSet::new();
        let mut rows_skipped = 0;

        for row in &response.drivers {
            let transporter_id = row.transporter_id.trim();
            if transporter_id.is_empty() {
                rows_skipped += 1;
                continue;
            }

            let status_bucket = row
                .status_bucket
                .clone()
                .unwrap_or_else(|| bucket_for(row.final_score).to_string());

            let score = ScoreDoc {
                report_id: report_id.to_string(),
                transporter_id: transporter_id.to_string(),
                year: key.year,
                week_number: key.week,
                report_date,
                kpis: KpiValues::from_row(row),
                scores: KpiScores::from_row(row),
                rank: row.rank,
                status_bucket: status_bucket.clone(),
                computed_at: now,
            };
            let score_id = score_identity(report_id, transporter_id);
            ops.push(WriteOp::merge(models::SCORES, score_id.clone(), to_fields(&score)?));
            // Duplicate transporter rows overwrite the same document, so
            // only distinct ids count as written.
            score_ids.insert(score_id);

            ops.push(self.driver_op(transporter_id, row.final_score, &status_bucket, report_date, now).await?);
        }

        ops.push(WriteOp::merge(
            models::REPORTS,
            report_id,
            json!({
                "status": ReportStatus::Done,
                "notes": format!("Parsed: {} rows", response.count),
                "updatedAt": now,
            }),
        ));

        self.store.batch_write(ops).await?;

        Ok(IngestOutcome {
            report_id: report_id.to_string(),
            scores_written: score_ids.len(),
            rows_skipped,
        })
    }

    /// Upserts the driver sighted in a score row. KPI summary fields are only
    /// refreshed when this report is at least as recent as the last one seen.
    async fn driver_op(
        &self,
        transporter_id: &str,
        final_score: Option<f64>,
        status_bucket: &str,
        report_date: NaiveDate,
        now: chrono::DateTime<Utc>,
    ) -> Result<WriteOp> {
        let existing = self
            .store
            .query_by_field(models::DRIVERS, "transporterId", transporter_id, 1)
            .await?;

        let (doc_id, is_new, last_kpi_date) = match existing.first() {
            Some(found) => {
                let last = found
                    .fields
                    .get("lastKpiDate")
                    .and_then(serde_json::Value::as_str)
                    .and_then(|raw| raw.parse::<NaiveDate>().ok());
                (found.id.clone(), false, last)
            }
            None => (transporter_id.to_string(), true, None),
        };

        let refresh = last_kpi_date.map_or(true, |last| report_date >= last);

        let doc = DriverDoc {
            transporter_id: transporter_id.to_string(),
            driver_name: None,
            current_score: if refresh { final_score } else { None },
            status_bucket: refresh.then(|| status_bucket.to_string()),
            last_kpi_date: refresh.then_some(report_date),
            created_at: is_new.then_some(now),
            updated_at: Some(now),
        };

        Ok(WriteOp::merge(models::DRIVERS, doc_id, to_fields(&doc)?))
    }

    /// Failure fallback: record the error on the report, or on the
    /// station-less current-week document when no identity is known. Never
    /// propagates its own errors.
    async fn mark_failed(&self, report_id: Option<&str>, err: &anyhow::Error) {
        let id = report_id.map(str::to_string).unwrap_or_else(fallback_report_id);
        let notes = format!("{err:#}");
        error!(report_id = %id, error = %notes, "report ingestion failed");

        let op = WriteOp::merge(
            models::REPORTS,
            id.clone(),
            json!({
                "status": ReportStatus::Failed,
                "notes": notes,
                "updatedAt": Utc::now(),
            }),
        );
        if let Err(write_err) = self.store.batch_write(vec![op]).await {
            error!(
                report_id = %id,
                error = %format!("{write_err:#}"),
                "could not record report failure"
            );
        }
    }
}

fn basename(storage_path: &str) -> &str {
    storage_path.rsplit('/').next().unwrap_or(storage_path)
}
