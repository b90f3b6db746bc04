//! Per-legislator attendance figures.

use serde::{Deserialize, Serialize};

use crate::record_set::{Keyed, RecordSet};

/// Attendance totals for one legislator.
///
/// `person_id` is provider-scoped and opaque. Merged sets are keyed by
/// GovTrack person id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberKPI {
    pub person_id: String,
    pub total_votes: u32,
    pub missed_votes: u32,
    /// `1 - missed / total`, or `0.0` when no votes were recorded.
    pub attendance: f64,
}

impl MemberKPI {
    /// Build a record, clamping `missed_votes` to `total_votes`.
    pub fn new(person_id: impl Into<String>, total_votes: u32, missed_votes: u32) -> Self {
        let missed_votes = missed_votes.min(total_votes);
        Self {
            person_id: person_id.into(),
            total_votes,
            missed_votes,
            attendance: attendance(total_votes, missed_votes),
        }
    }

    /// Re-key the record under another identifier namespace.
    pub fn with_person_id(self, person_id: impl Into<String>) -> Self {
        Self::new(person_id, self.total_votes, self.missed_votes)
    }
}

fn attendance(total: u32, missed: u32) -> f64 {
    if total == 0 {
        0.0
    } else {
        1.0 - f64::from(missed) / f64::from(total)
    }
}

impl Keyed for MemberKPI {
    fn key(&self) -> &str {
        &self.person_id
    }

    /// The more complete record (more votes counted) wins.
    fn supersedes(&self, existing: &Self) -> bool {
        self.total_votes > existing.total_votes
    }
}

/// Merged attendance set keyed by person id.
pub type KpiSet = RecordSet<MemberKPI>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attendance_is_derived() {
        let kpi = MemberKPI::new("412", 140, 7);
        assert!((kpi.attendance - 0.95).abs() < 1e-9);
    }

    #[test]
    fn zero_total_has_zero_attendance() {
        let kpi = MemberKPI::new("412", 0, 0);
        assert_eq!(kpi.attendance, 0.0);
    }

    #[test]
    fn missed_is_clamped_to_total() {
        let kpi = MemberKPI::new("412", 10, 25);
        assert_eq!(kpi.missed_votes, 10);
        assert_eq!(kpi.attendance, 0.0);
    }

    #[test]
    fn larger_total_wins_within_a_source() {
        let mut set = KpiSet::new();
        set.insert_candidate(MemberKPI::new("400", 50, 1));
        set.insert_candidate(MemberKPI::new("400", 600, 12));
        set.insert_candidate(MemberKPI::new("400", 600, 40));
        let kpi = set.get("400").unwrap();
        assert_eq!(kpi.total_votes, 600);
        assert_eq!(kpi.missed_votes, 12);
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(MemberKPI::new("412", 4, 1)).unwrap();
        assert_eq!(json["personId"], "412");
        assert_eq!(json["totalVotes"], 4);
        assert_eq!(json["missedVotes"], 1);
        assert_eq!(json["attendance"], 0.75);
    }
}
