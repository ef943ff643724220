//! Routing for object-finalized upload events. Anything that does not match
//! a known path and file type is ignored, not an error.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadKind {
    /// Roster CSV under `uploads/drivers/`, applied to the global drivers.
    GlobalRoster,
    /// Roster CSV under `uploads/drivers/byReport/{reportId}/`, scoped to
    /// one report.
    ReportRoster { report_id: String },
    /// Performance report PDF under `uploads/reports/`.
    Report,
}

const DRIVERS_PREFIX: &str = "uploads/drivers/";
const BY_REPORT_PREFIX: &str = "uploads/drivers/byReport/";
const REPORTS_PREFIX: &str = "uploads/reports/";

pub fn route(object_path: &str, content_type: &str) -> Option<UploadKind> {
    let content_type = content_type.to_lowercase();
    let path_lower = object_path.to_lowercase();

    if object_path.starts_with(DRIVERS_PREFIX) {
        // Some upload clients send rosters as text/plain or the Excel MIME.
        let csv_mime = content_type.contains("csv")
            || content_type.contains("text/plain")
            || content_type.contains("application/vnd.ms-excel");
        if !csv_mime && !path_lower.ends_with(".csv") {
            return None;
        }

        // The byReport segment matches case-insensitively; the report id
        // itself keeps its original casing.
        if path_lower.starts_with("uploads/drivers/byreport/") {
            let rest = &object_path[BY_REPORT_PREFIX.len()..];
            let mut parts = rest.splitn(2, '/');
            if let (Some(report_id), Some(_file)) = (parts.next(), parts.next()) {
                if !report_id.is_empty() {
                    return Some(UploadKind::ReportRoster {
                        report_id: report_id.to_string(),
                    });
                }
            }
        }
        return Some(UploadKind::GlobalRoster);
    }

    if object_path.starts_with(REPORTS_PREFIX) {
        if content_type.contains("pdf") || path_lower.ends_with(".pdf") {
            return Some(UploadKind::Report);
        }
        return None;
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roster_uploads_route_by_mime_or_extension() {
        assert_eq!(
            route("uploads/drivers/2024-03-18/roster.csv", "text/csv"),
            Some(UploadKind::GlobalRoster)
        );
        assert_eq!(
            route("uploads/drivers/2024-03-18/roster.csv", "application/octet-stream"),
            Some(UploadKind::GlobalRoster)
        );
        assert_eq!(
            route("uploads/drivers/2024-03-18/roster.txt", "text/plain"),
            Some(UploadKind::GlobalRoster)
        );
        assert_eq!(
            route("uploads/drivers/2024-03-18/roster.xlsx", "application/zip"),
            None
        );
    }

    #[test]
    fn per_report_roster_extracts_the_report_id() {
        assert_eq!(
            route("uploads/drivers/byReport/DXY1_2024-W12/roster.csv", "text/csv"),
            Some(UploadKind::ReportRoster {
                report_id: "DXY1_2024-W12".to_string()
            })
        );
        // A byReport path without a file segment falls back to global.
        assert_eq!(
            route("uploads/drivers/byReport/roster.csv", "text/csv"),
            Some(UploadKind::GlobalRoster)
        );
    }

    #[test]
    fn by_report_segment_matches_case_insensitively() {
        assert_eq!(
            route("uploads/drivers/byreport/DXY1_2024-W12/roster.csv", "text/csv"),
            Some(UploadKind::ReportRoster {
                report_id: "DXY1_2024-W12".to_string()
            })
        );
        assert_eq!(
            route("uploads/drivers/BYREPORT/DXY1_2024-W12/roster.csv", "text/csv"),
            Some(UploadKind::ReportRoster {
                report_id: "DXY1_2024-W12".to_string()
            })
        );
    }

    #[test]
    fn report_uploads_route_by_mime_or_extension() {
        assert_eq!(
            route("uploads/reports/week12.pdf", "application/pdf"),
            Some(UploadKind::Report)
        );
        assert_eq!(
            route("uploads/reports/week12.pdf", "application/octet-stream"),
            Some(UploadKind::Report)
        );
        assert_eq!(route("uploads/reports/week12.csv", "text/csv"), None);
    }

    #[test]
    fn unrelated_paths_are_ignored() {
        assert_eq!(route("uploads/misc/week12.pdf", "application/pdf"), None);
        assert_eq!(route("week12.pdf", "application/pdf"), None);
    }
}
