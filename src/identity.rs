use chrono::{Datelike, NaiveDate, Utc, Weekday};

/// Sentinel station code used when the parser summary carries no usable station.
pub const UNKNOWN_STATION: &str = "UNK";

/// Uppercases and strips everything outside `[A-Z0-9]`. Inputs that are
/// absent or empty after stripping resolve to the sentinel station.
pub fn normalize_station_code(raw: Option<&str>) -> String {
    let cleaned: String = raw
        .unwrap_or("")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if cleaned.is_empty() {
        UNKNOWN_STATION.to_string()
    } else {
        cleaned
    }
}

/// Deterministic identity of one station's weekly report. Missing year or
/// week fall back to the current date's ISO calendar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportKey {
    pub station: String,
    pub year: i32,
    pub week: u32,
}

impl ReportKey {
    pub fn new(station: Option<&str>, year: Option<i32>, week: Option<u32>) -> Self {
        let today = Utc::now();
        Self {
            station: normalize_station_code(station),
            year: year.unwrap_or_else(|| today.iso_week().year()),
            week: week.unwrap_or_else(|| today.iso_week().week()),
        }
    }

    pub fn id(&self) -> String {
        format!("{}_{}-W{}", self.station, self.year, self.week)
    }

    /// Nominal date of the reporting period (Monday of the ISO week).
    /// Falls back to today when year/week do not form a valid ISO date.
    pub fn reference_date(&self) -> NaiveDate {
        NaiveDate::from_isoywd_opt(self.year, self.week, Weekday::Mon)
            .unwrap_or_else(|| Utc::now().date_naive())
    }
}

/// Identity of the report document used when nothing about the upload could
/// be determined: the sentinel station in the current ISO week.
pub fn fallback_report_id() -> String {
    ReportKey::new(None, None, None).id()
}

/// Deterministic identity of one driver's score row within one report.
pub fn score_identity(report_id: &str, transporter_id: &str) -> String {
    format!("{report_id}_{transporter_id}")
}
