//! `congress-legislators` roster (`legislators-current.json`).
//!
//! The roster is the only document that carries both the Bioguide id used
//! by Congress.gov and the GovTrack id that merged attendance sets are keyed
//! by, so it doubles as the id map between the two namespaces.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;

use super::{parse_date, text_field};
use crate::vote::Chamber;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Legislator {
    pub bioguide: Option<String>,
    pub govtrack: Option<String>,
    pub name: String,
    pub chamber: Option<Chamber>,
    pub party: Option<String>,
    pub state: Option<String>,
}

/// Parse the roster. Entries without any id are skipped.
///
/// The current term is the one whose `end` is after `today`; when none is,
/// the last listed term is used.
pub fn parse_roster(payload: &Value, today: NaiveDate) -> Vec<Legislator> {
    let Some(members) = payload.as_array() else {
        return Vec::new();
    };
    members
        .iter()
        .filter_map(|m| legislator(m, today))
        .collect()
}

fn legislator(member: &Value, today: NaiveDate) -> Option<Legislator> {
    let ids = member.get("id")?;
    let bioguide = text_field(ids, &["bioguide"]);
    let govtrack = text_field(ids, &["govtrack"]);
    if bioguide.is_none() && govtrack.is_none() {
        return None;
    }

    let terms = ["terms", "roles"]
        .iter()
        .find_map(|k| member.get(*k).and_then(Value::as_array))
        .map(Vec::as_slice)
        .unwrap_or_default();
    let term = terms
        .iter()
        .find(|t| {
            text_field(t, &["end"])
                .and_then(|e| parse_date(&e))
                .is_some_and(|end| end > today)
        })
        .or_else(|| terms.last());

    Some(Legislator {
        bioguide,
        govtrack,
        name: display_name(member.get("name")),
        chamber: term
            .and_then(|t| text_field(t, &["type", "chamber"]))
            .and_then(|c| c.parse().ok()),
        party: term.and_then(|t| text_field(t, &["party"])),
        state: term.and_then(|t| text_field(t, &["state"])),
    })
}

fn display_name(name: Option<&Value>) -> String {
    let Some(name) = name else {
        return "Unknown".to_string();
    };
    if let Some(official) = text_field(name, &["official_full"]) {
        return official;
    }
    let parts: Vec<String> = ["first", "middle", "last", "suffix"]
        .iter()
        .filter_map(|k| text_field(name, &[*k]))
        .collect();
    if parts.is_empty() {
        "Unknown".to_string()
    } else {
        parts.join(" ")
    }
}

/// Bioguide → GovTrack id map.
#[derive(Debug, Clone, Default)]
pub struct IdMap {
    bioguide_to_govtrack: HashMap<String, String>,
}

impl IdMap {
    pub fn from_roster(roster: &[Legislator]) -> Self {
        let bioguide_to_govtrack = roster
            .iter()
            .filter_map(|l| Some((l.bioguide.clone()?, l.govtrack.clone()?)))
            .collect();
        Self {
            bioguide_to_govtrack,
        }
    }

    pub fn govtrack_for(&self, bioguide: &str) -> Option<&str> {
        self.bioguide_to_govtrack.get(bioguide).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.bioguide_to_govtrack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bioguide_to_govtrack.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    fn roster_json() -> Value {
        json!([
            {
                "id": {"bioguide": "S000522", "govtrack": 400380},
                "name": {"first": "Christopher", "middle": "H.", "last": "Smith"},
                "terms": [
                    {"type": "rep", "start": "2023-01-03", "end": "2025-01-03", "state": "NJ", "party": "Republican"},
                    {"type": "rep", "start": "2025-01-03", "end": "2027-01-03", "state": "NJ", "party": "Republican"}
                ]
            },
            {
                "id": {"bioguide": "K000367", "govtrack": "412242"},
                "name": {"official_full": "Amy Klobuchar"},
                "terms": [{"type": "sen", "start": "2019-01-03", "end": "2025-01-03", "state": "MN", "party": "Democrat"}]
            },
            {"id": {}, "name": {"first": "Nobody"}}
        ])
    }

    #[test]
    fn current_term_fields() {
        let roster = parse_roster(&roster_json(), today());
        assert_eq!(roster.len(), 2);

        let smith = &roster[0];
        assert_eq!(smith.name, "Christopher H. Smith");
        assert_eq!(smith.chamber, Some(Chamber::House));
        assert_eq!(smith.govtrack.as_deref(), Some("400380"));
        assert_eq!(smith.state.as_deref(), Some("NJ"));

        // All terms ended: fall back to the last one.
        let klobuchar = &roster[1];
        assert_eq!(klobuchar.name, "Amy Klobuchar");
        assert_eq!(klobuchar.chamber, Some(Chamber::Senate));
    }

    #[test]
    fn id_map_crosses_namespaces() {
        let roster = parse_roster(&roster_json(), today());
        let ids = IdMap::from_roster(&roster);
        assert_eq!(ids.len(), 2);
        assert_eq!(ids.govtrack_for("K000367"), Some("412242"));
        assert_eq!(ids.govtrack_for("Z999999"), None);
    }

    #[test]
    fn non_array_roster_is_empty() {
        assert!(parse_roster(&json!({"error": "rate limited"}), today()).is_empty());
    }
}
