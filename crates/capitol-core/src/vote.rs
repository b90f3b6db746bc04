//! Roll-call vote records.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::record_set::{Keyed, RecordSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Chamber {
    House,
    Senate,
}

#[derive(Debug, Error)]
#[error("unknown chamber: {0}")]
pub struct UnknownChamber(pub String);

impl Chamber {
    /// Lowercase form used in record ids and provider URLs.
    pub fn slug(self) -> &'static str {
        match self {
            Chamber::House => "house",
            Chamber::Senate => "senate",
        }
    }
}

impl fmt::Display for Chamber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Chamber::House => f.write_str("House"),
            Chamber::Senate => f.write_str("Senate"),
        }
    }
}

impl FromStr for Chamber {
    type Err = UnknownChamber;

    /// Accepts `house`/`senate` in any case, plus roster term types `rep`/`sen`
    /// and the single-letter forms `H`/`S`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "house" | "rep" | "h" => Ok(Chamber::House),
            "senate" | "sen" | "s" => Ok(Chamber::Senate),
            _ => Err(UnknownChamber(s.to_string())),
        }
    }
}

/// Vote totals for one party on a roll call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartyTally {
    pub party: String,
    pub yea: u32,
    pub nay: u32,
    pub present: u32,
    pub not_voting: u32,
}

/// One recorded roll-call vote, normalized across providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRecord {
    /// `{chamber}-{YYYY-MM-DD}-{roll}`.
    pub id: String,
    pub chamber: Chamber,
    pub roll_number: u32,
    pub date: DateTime<Utc>,
    pub question: String,
    pub result: String,
    pub yea: u32,
    pub nay: u32,
    pub present: u32,
    pub not_voting: u32,
    pub bill_reference: Option<String>,
    pub source_refs: Vec<String>,
    pub congress: Option<u32>,
    pub session: Option<u32>,
    pub vote_type: Option<String>,
    pub bill_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub party_totals: Vec<PartyTally>,
}

impl VoteRecord {
    /// Start a record with its identity fields; everything else is empty.
    pub fn new(chamber: Chamber, roll_number: u32, date: DateTime<Utc>) -> Self {
        Self {
            id: vote_id(chamber, &date, roll_number),
            chamber,
            roll_number,
            date,
            question: String::new(),
            result: String::new(),
            yea: 0,
            nay: 0,
            present: 0,
            not_voting: 0,
            bill_reference: None,
            source_refs: Vec::new(),
            congress: None,
            session: None,
            vote_type: None,
            bill_url: None,
            party_totals: Vec::new(),
        }
    }

    /// Legislative year the vote was taken in.
    pub fn year(&self) -> i32 {
        self.date.year()
    }

    /// Display title: bill and question when both are known.
    pub fn title(&self) -> String {
        match (self.bill_reference.as_deref(), self.question.is_empty()) {
            (Some(bill), false) => format!("{bill} - {}", self.question),
            (Some(bill), true) => bill.to_string(),
            (None, false) => self.question.clone(),
            (None, true) => format!("{} Roll Call Vote", self.chamber),
        }
    }
}

pub fn vote_id(chamber: Chamber, date: &DateTime<Utc>, roll_number: u32) -> String {
    format!(
        "{}-{}-{}",
        chamber.slug(),
        date.format("%Y-%m-%d"),
        roll_number
    )
}

impl Keyed for VoteRecord {
    fn key(&self) -> &str {
        &self.id
    }

    /// Re-fetching a roll overwrites it with the latest payload.
    fn supersedes(&self, _existing: &Self) -> bool {
        true
    }
}

/// Votes keyed by record id.
pub type VoteSet = RecordSet<VoteRecord>;

/// Inclusive calendar-date range a vote listing covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct VoteWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl VoteWindow {
    /// `None` when `start` falls after `end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// January 1 through December 31.
    pub fn year(year: i32) -> Option<Self> {
        Self::new(
            NaiveDate::from_ymd_opt(year, 1, 1)?,
            NaiveDate::from_ymd_opt(year, 12, 31)?,
        )
    }

    /// Open-ended bounds default to their own year's: `from` alone runs to
    /// December 31, `to` alone starts on January 1. With neither, the whole
    /// of `year`.
    pub fn resolve(from: Option<NaiveDate>, to: Option<NaiveDate>, year: i32) -> Option<Self> {
        match (from, to) {
            (None, None) => Self::year(year),
            (Some(from), None) => Self::new(from, Self::year(from.year())?.end),
            (None, Some(to)) => Self::new(Self::year(to.year())?.start, to),
            (Some(from), Some(to)) => Self::new(from, to),
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Compared on the UTC calendar date.
    pub fn contains(&self, instant: &DateTime<Utc>) -> bool {
        let day = instant.date_naive();
        self.start <= day && day <= self.end
    }

    pub fn is_after(&self, day: NaiveDate) -> bool {
        self.start > day
    }

    pub fn years_newest_first(&self) -> impl Iterator<Item = i32> + use<> {
        (self.start.year()..=self.end.year()).rev()
    }
}

impl fmt::Display for VoteWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Newest first, then by descending roll number.
pub fn sort_newest_first(votes: &mut [VoteRecord]) {
    votes.sort_by(|a, b| {
        b.date
            .cmp(&a.date)
            .then_with(|| b.roll_number.cmp(&a.roll_number))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn jan(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, day, 14, 8, 0).unwrap()
    }

    #[test]
    fn id_is_chamber_date_roll() {
        let v = VoteRecord::new(Chamber::House, 42, jan(17));
        assert_eq!(v.id, "house-2025-01-17-42");
        assert_eq!(v.year(), 2025);
    }

    #[test]
    fn refetch_replaces_rather_than_appends() {
        let mut set = VoteSet::new();
        let mut first = VoteRecord::new(Chamber::House, 42, jan(17));
        first.yea = 1;
        let mut second = first.clone();
        second.yea = 210;

        set.insert_candidate(first);
        set.insert_candidate(second);

        assert_eq!(set.len(), 1);
        assert_eq!(set.get("house-2025-01-17-42").unwrap().yea, 210);
    }

    #[test]
    fn chamber_parses_synonyms() {
        assert_eq!("rep".parse::<Chamber>().unwrap(), Chamber::House);
        assert_eq!("Senate".parse::<Chamber>().unwrap(), Chamber::Senate);
        assert_eq!("H".parse::<Chamber>().unwrap(), Chamber::House);
        assert!("assembly".parse::<Chamber>().is_err());
    }

    #[test]
    fn title_prefers_bill_and_question() {
        let mut v = VoteRecord::new(Chamber::House, 5, jan(9));
        assert_eq!(v.title(), "House Roll Call Vote");
        v.question = "On Passage".into();
        assert_eq!(v.title(), "On Passage");
        v.bill_reference = Some("H R 23".into());
        assert_eq!(v.title(), "H R 23 - On Passage");
    }

    #[test]
    fn newest_first_ordering() {
        let mut votes = vec![
            VoteRecord::new(Chamber::House, 3, jan(3)),
            VoteRecord::new(Chamber::House, 9, jan(9)),
            VoteRecord::new(Chamber::House, 8, jan(9)),
        ];
        sort_newest_first(&mut votes);
        let rolls: Vec<u32> = votes.iter().map(|v| v.roll_number).collect();
        assert_eq!(rolls, vec![9, 8, 3]);
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let day = |m, d| NaiveDate::from_ymd_opt(2025, m, d).unwrap();
        let w = VoteWindow::new(day(1, 17), day(3, 1)).unwrap();
        assert!(w.contains(&jan(17)));
        assert!(!w.contains(&jan(16)));
        assert!(w.contains(&Utc.with_ymd_and_hms(2025, 3, 1, 23, 59, 0).unwrap()));
        assert_eq!(w.to_string(), "2025-01-17..2025-03-01");
        assert!(VoteWindow::new(day(3, 1), day(1, 17)).is_none());
        assert!(w.is_after(day(1, 16)));
        assert!(!w.is_after(day(1, 17)));
    }

    #[test]
    fn open_ended_windows_stay_in_their_year() {
        let day = |y, m, d| NaiveDate::from_ymd_opt(y, m, d);
        let w = VoteWindow::resolve(day(2024, 11, 5), None, 2030).unwrap();
        assert_eq!(w.to_string(), "2024-11-05..2024-12-31");
        let w = VoteWindow::resolve(None, day(2025, 2, 1), 2030).unwrap();
        assert_eq!(w.to_string(), "2025-01-01..2025-02-01");
        let w = VoteWindow::resolve(None, None, 2023).unwrap();
        assert_eq!(w.to_string(), "2023-01-01..2023-12-31");
        assert!(VoteWindow::resolve(day(2025, 3, 1), day(2025, 2, 1), 2025).is_none());
    }

    #[test]
    fn window_years_run_newest_first() {
        let w = VoteWindow::new(
            NaiveDate::from_ymd_opt(2023, 11, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 2, 1).unwrap(),
        )
        .unwrap();
        assert_eq!(w.years_newest_first().collect::<Vec<_>>(), vec![2025, 2024, 2023]);
        let y = VoteWindow::year(2025).unwrap();
        assert_eq!(y.start().to_string(), "2025-01-01");
        assert_eq!(y.end().to_string(), "2025-12-31");
    }
}
