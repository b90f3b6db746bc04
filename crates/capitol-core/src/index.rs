//! Roll-call number extraction from the Clerk's yearly index page.
//!
//! The index is an HTML page with no structured listing, so numbers are
//! recovered with two independent passes and unioned:
//!
//! - **Broad**: every standalone 1-3 digit token in `1..=999`. Stray numbers
//!   (table widths, dates) are accepted false positives.
//! - **Strict**: identifiers inside known structures: `/evs/YYYY/rollNNN.xml`
//!   links, `rollnumber=NNN` query parameters, and `Roll Calls X Thru Y`
//!   range headers. Links and parameters may exceed 999; a range header is
//!   expanded only up to [`MAX_BROAD_ROLL`].
//!
//! The result is sorted descending so "recent N" is a prefix slice.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

/// Highest roll number the broad pass and range expansion accept.
pub const MAX_BROAD_ROLL: u32 = 999;

static BROAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:Roll\s*Calls\s+)?(\d{1,3})\b").expect("invalid broad roll pattern")
});

static XML_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)/evs/\d{4}/roll(\d{1,4})\.xml").expect("invalid roll link pattern")
});

static ROLL_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)rollnumber=(\d{1,4})").expect("invalid rollnumber pattern"));

static RANGE_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Roll\s*Calls\s+(\d{1,4})\s+Thru\s+(\d{1,4})").expect("invalid range pattern")
});

/// Resolve the roll numbers referenced by an index document, newest first.
pub fn resolve_roll_numbers(html: &str) -> Vec<u32> {
    let mut rolls = broad_pass(html);
    rolls.extend(strict_pass(html));
    rolls.into_iter().rev().collect()
}

fn broad_pass(html: &str) -> BTreeSet<u32> {
    BROAD
        .captures_iter(html)
        .filter_map(|c| c[1].parse::<u32>().ok())
        .filter(|n| (1..=MAX_BROAD_ROLL).contains(n))
        .collect()
}

fn strict_pass(html: &str) -> BTreeSet<u32> {
    let mut rolls: BTreeSet<u32> = XML_LINK
        .captures_iter(html)
        .chain(ROLL_PARAM.captures_iter(html))
        .filter_map(|c| c[1].parse::<u32>().ok())
        .filter(|&n| n >= 1)
        .collect();

    for caps in RANGE_HEADER.captures_iter(html) {
        let (Ok(a), Ok(b)) = (caps[1].parse::<u32>(), caps[2].parse::<u32>()) else {
            continue;
        };
        let (lo, hi) = (a.min(b).max(1), a.max(b).min(MAX_BROAD_ROLL));
        if lo <= hi {
            rolls.extend(lo..=hi);
        }
    }
    rolls
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_header_and_link_resolve_newest_first() {
        let html = r#"<h3>Roll Calls 200 Thru 205</h3>
            <a href="/evs/2025/roll203.xml">203</a>"#;
        let rolls = resolve_roll_numbers(html);

        for n in 200..=205 {
            assert!(rolls.contains(&n), "missing roll {n}");
        }
        assert!(rolls.windows(2).all(|w| w[0] > w[1]), "not strictly descending: {rolls:?}");
    }

    #[test]
    fn strict_pass_reaches_past_broad_bound() {
        let html = r#"<a href="https://clerk.house.gov/evs/2025/roll1004.xml">x</a>
            <a href="/Votes/?rollnumber=1002&amp;year=2025">y</a>"#;
        let rolls = resolve_roll_numbers(html);
        assert_eq!(&rolls[..2], &[1004, 1002]);
    }

    #[test]
    fn four_digit_years_are_not_broad_matches() {
        let rolls = resolve_roll_numbers("Votes for 2025 and 2024");
        assert!(rolls.is_empty());
    }

    #[test]
    fn broad_pass_keeps_stray_numbers() {
        let rolls = resolve_roll_numbers("<td width=\"12\">roll 7</td>");
        assert_eq!(rolls, vec![12, 7]);
    }

    #[test]
    fn zero_is_never_a_roll() {
        assert!(resolve_roll_numbers("0 000").is_empty());
    }

    #[test]
    fn range_headers_are_capped() {
        let rolls = resolve_roll_numbers("Roll Calls 995 Thru 1005");
        assert_eq!(rolls, vec![999, 998, 997, 996, 995]);

        let rolls = resolve_roll_numbers("Roll Calls 1 Thru 5000");
        assert_eq!(rolls.len(), 999);
        assert_eq!(rolls.first(), Some(&999));

        assert!(resolve_roll_numbers("Roll Calls 1001 Thru 1005").is_empty());
    }

    #[test]
    fn reversed_range_header_is_normalised() {
        let rolls = resolve_roll_numbers("ROLL CALLS 12 THRU 10");
        assert_eq!(rolls, vec![12, 11, 10]);
    }
}
