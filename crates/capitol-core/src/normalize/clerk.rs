//! House Clerk roll-call XML (`clerk.house.gov/evs/{year}/rollNNN.xml`).
//!
//! ```text
//! rollcall-vote
//! └── vote-metadata
//!     ├── congress, session, rollcall-num, legis-num
//!     ├── vote-question, vote-type, vote-result
//!     ├── action-date, action-time[@time-etz]
//!     └── vote-totals
//!         ├── totals-by-party*  (party, yea-total, nay-total, ...)
//!         └── totals-by-vote    (yea-total, nay-total, present-total, not-voting-total)
//! ```

use chrono::{DateTime, NaiveTime, Utc};
use roxmltree::{Document, Node};
use tracing::debug;

use super::{parse_date, parse_time};
use crate::urls::congress_bill_url;
use crate::vote::{Chamber, PartyTally, VoteRecord};

/// Parse one House roll-call document. `None` for malformed XML or a
/// document without a roll number and action date.
pub fn house_vote_from_xml(xml: &str, source_url: &str) -> Option<VoteRecord> {
    let doc = match Document::parse(xml) {
        Ok(doc) => doc,
        Err(e) => {
            debug!(url = source_url, error = %e, "house roll xml did not parse");
            return None;
        }
    };
    let root = doc.root_element();
    let meta = descendant(root, "vote-metadata").unwrap_or(root);

    let roll = text_of(meta, &["rollcall-num"]).and_then(|s| s.parse::<u32>().ok())?;
    let date = action_instant(meta)?;

    let mut record = VoteRecord::new(Chamber::House, roll, date);
    record.question = text_of(meta, &["vote-question"]).unwrap_or_default();
    record.result = text_of(meta, &["vote-result"]).unwrap_or_default();
    record.vote_type = text_of(meta, &["vote-type"]);
    record.congress = text_of(meta, &["congress"]).and_then(|s| leading_number(&s));
    record.session = text_of(meta, &["session"]).and_then(|s| leading_number(&s));

    let legis = text_of(meta, &["legis-num"]).filter(|s| s != "0");
    record.bill_url = match (&legis, record.congress) {
        (Some(legis), Some(congress)) => bill_url(legis, congress),
        _ => None,
    };
    record.bill_reference = legis;

    if let Some(totals) = descendant(root, "totals-by-vote") {
        record.yea = count_of(totals, &["yea-total", "yeas", "yea"]);
        record.nay = count_of(totals, &["nay-total", "nays", "nay"]);
        record.present = count_of(totals, &["present-total", "present"]);
        record.not_voting = count_of(totals, &["not-voting-total", "not-voting", "notvoting"]);
    }
    record.party_totals = root
        .descendants()
        .filter(|n| n.has_tag_name("totals-by-party"))
        .map(|n| PartyTally {
            party: text_of(n, &["party"]).unwrap_or_else(|| "Unknown".to_string()),
            yea: count_of(n, &["yea-total", "yeas"]),
            nay: count_of(n, &["nay-total", "nays"]),
            present: count_of(n, &["present-total", "present"]),
            not_voting: count_of(n, &["not-voting-total", "not-voting"]),
        })
        .collect();

    record.source_refs.push(source_url.to_string());
    Some(record)
}

fn action_instant(meta: Node) -> Option<DateTime<Utc>> {
    let date = text_of(meta, &["action-date"]).and_then(|s| parse_date(&s))?;
    let time = child(meta, "action-time")
        .and_then(|n| {
            n.attribute("time-etz")
                .and_then(parse_time)
                .or_else(|| n.text().and_then(parse_time))
        })
        .unwrap_or(NaiveTime::MIN);
    Some(date.and_time(time).and_utc())
}

/// `H R 23` → house-bill, `H RES 5` → house-resolution, `H J RES 7` →
/// house-joint-resolution, and the Senate equivalents.
fn bill_url(legis: &str, congress: u32) -> Option<String> {
    let parts: Vec<String> = legis
        .split_whitespace()
        .map(|p| p.trim_matches('.').to_ascii_uppercase())
        .collect();
    let (number, prefix) = parts.split_last()?;
    let number: u32 = number.parse().ok()?;
    let slug = match prefix.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["H", "R"] => "house-bill",
        ["S"] => "senate-bill",
        ["H", "RES"] => "house-resolution",
        ["S", "RES"] => "senate-resolution",
        ["H", "J", "RES"] => "house-joint-resolution",
        ["S", "J", "RES"] => "senate-joint-resolution",
        ["H", "CON", "RES"] => "house-concurrent-resolution",
        ["S", "CON", "RES"] => "senate-concurrent-resolution",
        _ => return None,
    };
    Some(congress_bill_url(congress, slug, number))
}

/// `"1st"` → 1, `"119"` → 119.
fn leading_number(s: &str) -> Option<u32> {
    let digits: String = s.trim().chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

fn descendant<'a, 'input>(node: Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.descendants().find(|n| n.has_tag_name(tag))
}

fn child<'a, 'input>(node: Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| n.has_tag_name(tag))
}

fn text_of(node: Node, tags: &[&str]) -> Option<String> {
    tags.iter()
        .filter_map(|tag| child(node, tag))
        .filter_map(|n| n.text())
        .map(str::trim)
        .find(|t| !t.is_empty())
        .map(str::to_string)
}

fn count_of(node: Node, tags: &[&str]) -> u32 {
    text_of(node, tags)
        .and_then(|s| s.replace(',', "").parse().ok())
        .unwrap_or(0)
}
