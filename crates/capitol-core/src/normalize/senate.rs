//! Senate LIS roll-call XML (`vote_{congress}_{session}_{NNNNN}.xml`).

use roxmltree::{Document, Node};
use tracing::debug;

use super::parse_instant;
use crate::vote::{Chamber, VoteRecord};

/// Parse one Senate roll-call document. `None` for malformed XML or a
/// document without a vote number and date.
pub fn senate_vote_from_xml(xml: &str, source_url: &str) -> Option<VoteRecord> {
    let doc = match Document::parse(xml) {
        Ok(doc) => doc,
        Err(e) => {
            debug!(url = source_url, error = %e, "senate roll xml did not parse");
            return None;
        }
    };
    let root = doc.root_element();

    let roll: u32 = text_of(root, &["vote_number"])?.parse().ok()?;
    // LIS pads the date with doubled spaces: "January 20, 2025,  06:08 PM".
    let raw_date = text_of(root, &["vote_date"])?;
    let date = parse_instant(&raw_date.split_whitespace().collect::<Vec<_>>().join(" "))?;

    let mut record = VoteRecord::new(Chamber::Senate, roll, date);
    record.question = text_of(root, &["vote_question_text", "question"]).unwrap_or_default();
    record.result = text_of(root, &["vote_result", "vote_result_text"]).unwrap_or_default();
    record.vote_type = text_of(root, &["majority_requirement"]).map(|r| format!("{r} majority"));
    record.congress = text_of(root, &["congress"]).and_then(|s| s.parse().ok());
    record.session = text_of(root, &["session"]).and_then(|s| s.parse().ok());
    record.bill_reference = child(root, "document").and_then(|d| text_of(d, &["document_name"]));

    if let Some(count) = child(root, "count") {
        record.yea = count_of(count, "yeas");
        record.nay = count_of(count, "nays");
        record.present = count_of(count, "present");
        record.not_voting = count_of(count, "absent");
    }

    record.source_refs.push(source_url.to_string());
    Some(record)
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

fn count_of(node: Node, tag: &str) -> u32 {
    text_of(node, &[tag]).and_then(|s| s.parse().ok()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VOTE_12: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<roll_call_vote>
  <congress>119</congress>
  <session>1</session>
  <congress_year>2025</congress_year>
  <vote_number>12</vote_number>
  <vote_date>January 20, 2025,  06:08 PM</vote_date>
  <vote_question_text>On the Nomination PN11-6: Marco Rubio, of Florida, to be Secretary of State</vote_question_text>
  <vote_result_text>Nomination Confirmed (99-0)</vote_result_text>
  <question>On the Nomination</question>
  <majority_requirement>1/2</majority_requirement>
  <vote_result>Nomination Confirmed</vote_result>
  <document>
    <document_type>PN</document_type>
    <document_name>PN11-6</document_name>
  </document>
  <count>
    <yeas>99</yeas>
    <nays>0</nays>
    <present/>
    <absent>1</absent>
  </count>
</roll_call_vote>"#;

    #[test]
    fn parses_lis_layout() {
        let v = senate_vote_from_xml(VOTE_12, "https://www.senate.gov/x.xml").unwrap();
        assert_eq!(v.id, "senate-2025-01-20-12");
        assert_eq!(v.chamber, Chamber::Senate);
        assert_eq!(v.date.to_rfc3339(), "2025-01-20T18:08:00+00:00");
        assert_eq!((v.yea, v.nay, v.present, v.not_voting), (99, 0, 0, 1));
        assert_eq!(v.result, "Nomination Confirmed");
        assert!(v.question.starts_with("On the Nomination PN11-6"));
        assert_eq!(v.bill_reference.as_deref(), Some("PN11-6"));
        assert_eq!(v.vote_type.as_deref(), Some("1/2 majority"));
        assert_eq!((v.congress, v.session), (Some(119), Some(1)));
    }

    #[test]
    fn missing_vote_number_is_dropped() {
        let xml = "<roll_call_vote><vote_date>January 20, 2025, 06:08 PM</vote_date></roll_call_vote>";
        assert!(senate_vote_from_xml(xml, "u").is_none());
    }
}
