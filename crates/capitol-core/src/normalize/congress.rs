//! Congress.gov v3 payloads: per-member vote histories and the vote
//! listing/detail pair.

use serde_json::Value;

use super::{count_field, field, parse_instant, text_field};
use crate::kpi::MemberKPI;
use crate::vote::{Chamber, PartyTally, VoteRecord};

/// Pull the vote array out of a list response, wherever this API version put it.
pub fn pluck_vote_array(payload: &Value) -> Vec<Value> {
    if let Some(arr) = payload.as_array() {
        return arr.clone();
    }
    for name in ["votes", "objects", "results", "data", "items"] {
        if let Some(arr) = payload.get(name).and_then(Value::as_array) {
            return arr.clone();
        }
    }
    payload
        .get("votes")
        .and_then(|v| v.get("items"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

/// Lowercased member position (`yea`, `not voting`, ...), empty when absent.
pub fn read_position(vote: &Value) -> String {
    text_field(
        vote,
        &[
            "position",
            "member_position",
            "memberPosition",
            "vote_position",
            "MemberPosition",
        ],
    )
    .unwrap_or_default()
    .to_lowercase()
}

/// `Not Voting`, `not_voting`, `NotVoting`.
pub fn is_missed_position(position: &str) -> bool {
    let p = position.to_lowercase();
    p.contains("not") && p.contains("vot")
}

/// Count a member's vote history into an attendance record.
pub fn tally_member_votes(person_id: &str, votes: &[Value]) -> MemberKPI {
    let total = votes.len() as u32;
    let missed = votes
        .iter()
        .filter(|v| is_missed_position(&read_position(v)))
        .count() as u32;
    MemberKPI::new(person_id, total, missed)
}

/// Identity of a vote in the listing, enough to build its detail URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingKey {
    pub congress: u32,
    pub session: u32,
    pub chamber: Chamber,
    pub roll: u32,
}

pub fn listing_key(item: &Value) -> Option<ListingKey> {
    let congress = count_field(item, &["congress", "congressNumber"]);
    let session = count_field(item, &["session", "sessionNumber"]);
    let roll = count_field(item, &["rollNumber", "roll", "roll_call", "rollCallNumber"]);
    if congress == 0 || session == 0 || roll == 0 {
        return None;
    }
    let chamber = text_field(item, &["chamber"])
        .and_then(|c| c.parse().ok())
        .unwrap_or(Chamber::House);
    Some(ListingKey {
        congress,
        session,
        chamber,
        roll,
    })
}

/// Merge a listing item with its (optional) detail payload into a record.
///
/// Detail fields are read from `vote` when nested, otherwise from the top
/// level. When hydration failed the listing item alone still produces a
/// record with zero totals. `None` when no roll number or date resolves.
pub fn vote_to_record(item: &Value, detail: Option<&Value>, source_refs: Vec<String>) -> Option<VoteRecord> {
    let empty = Value::Null;
    let d = detail.map(|d| d.get("vote").unwrap_or(d)).unwrap_or(&empty);
    let meta = field(d, &["meta", "voteMeta"]).unwrap_or(&empty);

    let roll = [item, d]
        .iter()
        .map(|v| count_field(v, &["rollNumber", "roll", "roll_call", "rollCallNumber"]))
        .find(|&n| n > 0)?;

    let date = text_field(item, &["voteDate", "date", "startDate"])
        .or_else(|| text_field(meta, &["date", "dateTime"]))
        .or_else(|| text_field(d, &["date", "dateTime", "startDate", "voteDate"]))
        .or_else(|| text_field(item, &["updated", "updateDate"]))
        .and_then(|s| parse_instant(&s))?;

    let chamber = text_field(item, &["chamber"])
        .or_else(|| text_field(d, &["chamber"]))
        .and_then(|c| c.parse().ok())
        .unwrap_or(Chamber::House);

    let mut record = VoteRecord::new(chamber, roll, date);
    record.question = text_field(item, &["voteQuestionText", "voteQuestion"])
        .or_else(|| text_field(d, &["question", "voteQuestion"]))
        .or_else(|| text_field(meta, &["question"]))
        .or_else(|| text_field(item, &["question"]))
        .unwrap_or_default();
    record.result = text_field(item, &["voteResultText"])
        .or_else(|| text_field(d, &["result"]))
        .or_else(|| text_field(meta, &["result"]))
        .or_else(|| text_field(item, &["result"]))
        .unwrap_or_default();
    record.bill_reference = bill_reference(item)
        .or_else(|| bill_reference(d))
        .or_else(|| field(d, &["actions"]).and_then(|a| text_field(a, &["billNumber"])));
    record.vote_type = text_field(item, &["voteType"]).or_else(|| text_field(d, &["voteType"]));

    let congress = count_field(item, &["congress", "congressNumber"]);
    let session = count_field(item, &["session", "sessionNumber"]);
    record.congress = (congress > 0).then_some(congress);
    record.session = (session > 0)
        .then_some(session)
        .or_else(|| Some(count_field(meta, &["session"])).filter(|&s| s > 0));

    let totals = field(d, &["totals", "voteTotals"]).unwrap_or(d);
    record.yea = count_field(totals, &["yea", "Yea", "Yeas", "yeas", "Aye", "Ayes", "yeaTotal"]);
    record.nay = count_field(totals, &["nay", "Nay", "Nays", "nays", "No", "no", "nayTotal"]);
    record.present = count_field(totals, &["present", "Present", "presentVotes", "presentTotal"]);
    record.not_voting = count_field(
        totals,
        &["not_voting", "NotVoting", "notVoting", "notVotingTotal"],
    );

    record.party_totals = party_totals(d);
    let counted = [record.yea, record.nay, record.present, record.not_voting];
    if counted.iter().all(|&n| n == 0) {
        for p in &record.party_totals {
            record.yea = record.yea.saturating_add(p.yea);
            record.nay = record.nay.saturating_add(p.nay);
            record.present = record.present.saturating_add(p.present);
            record.not_voting = record.not_voting.saturating_add(p.not_voting);
        }
    }

    record.source_refs = source_refs;
    Some(record)
}

fn bill_reference(obj: &Value) -> Option<String> {
    match obj.get("bill") {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(bill @ Value::Object(_)) => {
            let number = text_field(bill, &["number"])?;
            Some(match text_field(bill, &["type"]) {
                Some(kind) => format!("{kind} {number}"),
                None => number,
            })
        }
        _ => text_field(obj, &["billNumber", "legislationNumber"]),
    }
}

/// `votePartyTotal` entries of the newer house-vote detail shape.
fn party_totals(detail: &Value) -> Vec<PartyTally> {
    let Some(rows) = detail.get("votePartyTotal").and_then(Value::as_array) else {
        return Vec::new();
    };
    rows.iter()
        .map(|row| PartyTally {
            party: text_field(row, &["voteParty", "partyName"])
                .or_else(|| row.get("party").and_then(|p| text_field(p, &["name", "type"])))
                .unwrap_or_else(|| "Unknown".to_string()),
            yea: count_field(row, &["yeaTotal", "yea"]),
            nay: count_field(row, &["nayTotal", "nay"]),
            present: count_field(row, &["presentTotal", "present"]),
            not_voting: count_field(row, &["notVotingTotal", "notVoting"]),
        })
        .collect()
}
