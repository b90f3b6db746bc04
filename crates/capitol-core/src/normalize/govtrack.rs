//! GovTrack `/api/v2/role` and `/api/v2/vote` records.
//!
//! A role is one term of office. Vote totals live on the role, so a
//! legislator with several current roles produces several candidates; the
//! caller keeps the one with the most votes.

use serde_json::Value;

use super::{as_count, as_float, as_text, count_field, field, parse_instant, text_field};
use crate::kpi::MemberKPI;
use crate::urls::session_for_year;
use crate::vote::{Chamber, VoteRecord};

/// One page of a GovTrack list response.
#[derive(Debug, Clone, PartialEq)]
pub struct ListPage {
    pub objects: Vec<Value>,
    /// `meta.total_count`, when reported.
    pub total_count: Option<usize>,
    /// `meta.limit`, when reported.
    pub limit: Option<usize>,
}

/// Split a list response into its objects and paging metadata.
pub fn list_page(payload: &Value) -> ListPage {
    let objects = payload
        .get("objects")
        .and_then(Value::as_array)
        .map(|a| a.iter().filter(|v| !v.is_null()).cloned().collect())
        .unwrap_or_default();
    let meta = payload.get("meta");
    let meta_count = |name: &str| {
        meta.and_then(|m| m.get(name))
            .and_then(as_count)
            .map(|n| n as usize)
    };
    ListPage {
        objects,
        total_count: meta_count("total_count"),
        limit: meta_count("limit"),
    }
}

/// GovTrack person id of a role: `person.id`, a bare `person`, `person_id`,
/// or `person__id`.
pub fn person_id(role: &Value) -> Option<String> {
    if let Some(person) = role.get("person") {
        if let Some(id) = person.get("id").and_then(as_text) {
            return Some(id);
        }
        if let Some(id) = as_text(person) {
            return Some(id);
        }
    }
    ["person_id", "person__id"]
        .iter()
        .filter_map(|name| role.get(*name))
        .find_map(as_text)
}

/// Normalize one role into an attendance candidate.
///
/// Missed votes come from `missed_votes`, or are derived from
/// `missed_votes_pct` (a percentage of `total`) rounded to nearest.
pub fn role_to_kpi(role: &Value) -> Option<MemberKPI> {
    let pid = person_id(role)?;
    let total = count_field(role, &["total_votes", "votes"]);
    let missed = match field(role, &["missed_votes"]).and_then(as_count) {
        Some(missed) => missed,
        None => field(role, &["missed_votes_pct"])
            .and_then(as_float)
            .filter(|_| total > 0)
            .map(|pct| (f64::from(total) * pct / 100.0).round().max(0.0) as u32)
            .unwrap_or(0),
    };
    Some(MemberKPI::new(pid, total, missed))
}

/// Normalize one `/api/v2/vote` object.
///
/// GovTrack reports `present` and `not voting` together as `total_other`,
/// which lands in `not_voting`. Its `session` is a year label, so sessions
/// outside 1..=2 are derived from the vote date. `None` when no roll number
/// or creation time resolves.
pub fn vote_to_record(obj: &Value, chamber_hint: Chamber) -> Option<VoteRecord> {
    let roll = count_field(obj, &["number", "roll"]);
    if roll == 0 {
        return None;
    }
    let date = text_field(obj, &["created", "voted_at"]).and_then(|s| parse_instant(&s))?;
    let chamber = text_field(obj, &["chamber"])
        .and_then(|c| c.parse().ok())
        .unwrap_or(chamber_hint);

    let mut record = VoteRecord::new(chamber, roll, date);
    record.question = text_field(obj, &["question", "description"]).unwrap_or_default();
    record.result = text_field(obj, &["result"]).unwrap_or_default();
    record.vote_type = text_field(obj, &["vote_type", "category_label", "category"]);
    record.yea = count_field(obj, &["total_plus"]);
    record.nay = count_field(obj, &["total_minus"]);
    record.not_voting = count_field(obj, &["total_other"]);
    record.congress = Some(count_field(obj, &["congress"])).filter(|&c| c > 0);
    record.session = Some(
        Some(count_field(obj, &["session"]))
            .filter(|s| (1..=2).contains(s))
            .unwrap_or_else(|| session_for_year(record.year())),
    );
    if let Some(bill) = obj.get("related_bill").filter(|b| b.is_object()) {
        record.bill_reference = text_field(bill, &["display_number", "title"]);
        record.bill_url = text_field(bill, &["link"]);
    }
    record.source_refs = text_field(obj, &["link", "url"]).into_iter().collect();
    Some(record)
}
