use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

text_enum!(
    /// Project health, ordered from best to worst.
    ReportHealth {
        OnTrack => "on_track",
        AtRisk => "at_risk",
        OffTrack => "off_track",
    }
);

impl ReportHealth {
    fn severity(self) -> u8 {
        match self {
            ReportHealth::OnTrack => 0,
            ReportHealth::AtRisk => 1,
            ReportHealth::OffTrack => 2,
        }
    }

    /// The more severe of two assessments.
    pub fn worst(self, other: ReportHealth) -> ReportHealth {
        if other.severity() > self.severity() {
            other
        } else {
            self
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ReportRow {
    pub id: Uuid,
    pub project_id: Uuid,
    pub report_date: NaiveDate,
    pub summary: String,
    pub health: String,
    pub metrics: Value,
    pub blockers: Vec<String>,
    pub risks: Vec<String>,
    pub highlights: Vec<String>,
    pub generated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worst_health() {
        use ReportHealth::*;
        assert_eq!(OnTrack.worst(AtRisk), AtRisk);
        assert_eq!(OffTrack.worst(AtRisk), OffTrack);
        assert_eq!(OnTrack.worst(OnTrack), OnTrack);
    }
}
