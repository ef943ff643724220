use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DRIVERS: &str = "drivers";
pub const REPORTS: &str = "reports";
pub const SCORES: &str = "scores";
pub const DRIVER_NAMES: &str = "driverNames";

/// Lifecycle of a report document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Uploaded,
    Processing,
    Done,
    Failed,
}

/// Wire shape returned by the KPI parser service. Field names mirror the
/// service's JSON exactly.
#[derive(Debug, Clone, Deserialize)]
pub struct ParserResponse {
    pub drivers: Vec<ParsedRow>,
    pub count: usize,
    #[serde(default)]
    pub summary: Option<ParsedSummary>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParsedRow {
    #[serde(default, rename = "Transporter ID")]
    pub transporter_id: String,
    #[serde(default, rename = "Delivered")]
    pub delivered: Option<f64>,
    #[serde(default, rename = "POD")]
    pub pod: Option<f64>,
    #[serde(default, rename = "CC")]
    pub cc: Option<f64>,
    #[serde(default, rename = "DCR")]
    pub dcr: Option<f64>,
    #[serde(default, rename = "CE")]
    pub ce: Option<f64>,
    #[serde(default, rename = "LoR DPMO")]
    pub lor_dpmo: Option<f64>,
    #[serde(default, rename = "DNR DPMO")]
    pub dnr_dpmo: Option<f64>,
    #[serde(default, rename = "CDF DPMO")]
    pub cdf_dpmo: Option<f64>,
    #[serde(default, rename = "POD_Score")]
    pub pod_score: Option<f64>,
    #[serde(default, rename = "CC_Score")]
    pub cc_score: Option<f64>,
    #[serde(default, rename = "DCR_Score")]
    pub dcr_score: Option<f64>,
    #[serde(default, rename = "CE_Score")]
    pub ce_score: Option<f64>,
    #[serde(default, rename = "LoR_Score")]
    pub lor_score: Option<f64>,
    #[serde(default, rename = "DNR_Score")]
    pub dnr_score: Option<f64>,
    #[serde(default, rename = "CDF_Score")]
    pub cdf_score: Option<f64>,
    #[serde(default, rename = "FinalScore")]
    pub final_score: Option<f64>,
    #[serde(default)]
    pub rank: Option<i64>,
    #[serde(default, rename = "statusBucket")]
    pub status_bucket: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedSummary {
    #[serde(default)]
    pub overall_score: Option<f64>,
    #[serde(default)]
    pub reliability_score: Option<f64>,
    #[serde(default)]
    pub reliability_next_day: Option<f64>,
    #[serde(default)]
    pub reliability_same_day: Option<f64>,
    #[serde(default)]
    pub rank_at_station: Option<i64>,
    #[serde(default)]
    pub station_count: Option<i64>,
    #[serde(default, rename = "rankDeltaWoW")]
    pub rank_delta_wow: Option<i64>,
    #[serde(default)]
    pub week_text: Option<String>,
    #[serde(default)]
    pub week_number: Option<u32>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub station_code: Option<String>,
}

/// Stored report document. Optional fields are skipped when absent so merge
/// writes never clobber values set by an earlier invocation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDoc {
    pub report_name: String,
    pub storage_path: String,
    pub status: ReportStatus,
    pub report_date: NaiveDate,
    pub year: i32,
    pub week_number: u32,
    pub station_code: String,
    pub summary: ParsedSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Stored driver document. Roster runs write only identity and name;
/// report runs write only the KPI summary fields.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverDoc {
    pub transporter_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_bucket: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_kpi_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// One driver's KPI snapshot within one report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreDoc {
    pub report_id: String,
    pub transporter_id: String,
    pub year: i32,
    pub week_number: u32,
    pub report_date: NaiveDate,
    pub kpis: KpiValues,
    pub scores: KpiScores,
    pub rank: Option<i64>,
    pub status_bucket: String,
    pub computed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiValues {
    pub delivered: Option<f64>,
    pub pod: Option<f64>,
    pub cc: Option<f64>,
    pub dcr: Option<f64>,
    pub ce: Option<f64>,
    pub lor_dpmo: Option<f64>,
    pub dnr_dpmo: Option<f64>,
    pub cdf_dpmo: Option<f64>,
}

impl KpiValues {
    pub fn from_row(row: &ParsedRow) -> Self {
        Self {
            delivered: row.delivered,
            pod: row.pod,
            cc: row.cc,
            dcr: row.dcr,
            ce: row.ce,
            lor_dpmo: row.lor_dpmo,
            dnr_dpmo: row.dnr_dpmo,
            cdf_dpmo: row.cdf_dpmo,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiScores {
    pub pod_score: Option<f64>,
    pub cc_score: Option<f64>,
    pub dcr_score: Option<f64>,
    pub ce_score: Option<f64>,
    pub lor_score: Option<f64>,
    pub dnr_score: Option<f64>,
    pub cdf_score: Option<f64>,
    pub final_score: Option<f64>,
}

impl KpiScores {
    pub fn from_row(row: &ParsedRow) -> Self {
        Self {
            pod_score: row.pod_score,
            cc_score: row.cc_score,
            dcr_score: row.dcr_score,
            ce_score: row.ce_score,
            lor_score: row.lor_score,
            dnr_score: row.dnr_score,
            cdf_score: row.cdf_score,
            final_score: row.final_score,
        }
    }
}

/// Roster-supplied display name scoped to one report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NameOverrideDoc {
    pub report_id: String,
    pub transporter_id: String,
    pub driver_name: String,
    pub updated_at: DateTime<Utc>,
}

pub fn to_fields<T: Serialize>(doc: &T) -> anyhow::Result<Value> {
    serde_json::to_value(doc).context("failed to serialize document fields")
}
