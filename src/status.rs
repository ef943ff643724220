use std::fmt;

use serde::{Deserialize, Serialize};

/// Discrete performance tier derived from a composite final score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusBucket {
    Unknown,
    Poor,
    Fair,
    Great,
    Fantastic,
}

impl fmt::Display for StatusBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StatusBucket::Unknown => "Unknown",
            StatusBucket::Poor => "Poor",
            StatusBucket::Fair => "Fair",
            StatusBucket::Great => "Great",
            StatusBucket::Fantastic => "Fantastic",
        };
        f.write_str(label)
    }
}

/// Maps a final score to its bucket. Bands are inclusive on their lower bound.
pub fn bucket_for(final_score: Option<f64>) -> StatusBucket {
    match final_score {
        None => StatusBucket::Unknown,
        Some(score) if score >= 85.0 => StatusBucket::Fantastic,
        Some(score) if score >= 70.0 => StatusBucket::Great,
        Some(score) if score >= 55.0 => StatusBucket::Fair,
        Some(_) => StatusBucket::Poor,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_score_is_unknown() {
        assert_eq!(bucket_for(None), StatusBucket::Unknown);
    }

    #[test]
    fn bands_are_inclusive_on_lower_bound() {
        assert_eq!(bucket_for(Some(85.0)), StatusBucket::Fantastic);
        assert_eq!(bucket_for(Some(84.999)), StatusBucket::Great);
        assert_eq!(bucket_for(Some(70.0)), StatusBucket::Great);
        assert_eq!(bucket_for(Some(69.999)), StatusBucket::Fair);
        assert_eq!(bucket_for(Some(55.0)), StatusBucket::Fair);
        assert_eq!(bucket_for(Some(54.999)), StatusBucket::Poor);
    }

    #[test]
    fn bands_cover_the_whole_domain() {
        assert_eq!(bucket_for(Some(0.0)), StatusBucket::Poor);
        assert_eq!(bucket_for(Some(100.0)), StatusBucket::Fantastic);
        assert_eq!(bucket_for(Some(250.0)), StatusBucket::Fantastic);
        assert_eq!(bucket_for(Some(-5.0)), StatusBucket::Poor);
    }

    #[test]
    fn labels_match_stored_strings() {
        assert_eq!(bucket_for(Some(90.0)).to_string(), "Fantastic");
        assert_eq!(bucket_for(Some(72.5)).to_string(), "Great");
        assert_eq!(bucket_for(None).to_string(), "Unknown");
    }
}
