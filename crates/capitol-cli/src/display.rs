//! Terminal rendering for roll calls, vote listings and attendance.
//!
//! A single roll call prints as a vertical card grouped by section; lists
//! print as fixed-width tables.

use capitol_core::vote::sort_newest_first;
use capitol_core::{KpiSet, MemberKPI, VoteRecord};
use capitol_sync::MergeReport;

const MAX_LIST_ITEMS: usize = 10;
const QUESTION_WIDTH: usize = 48;

/// Print one roll call as a vertical card.
pub fn print_vote_card(vote: &VoteRecord) {
    println!("=== {} ===", vote.id);
    println!("{}", vote.title());
    println!();

    println!("Identity");
    field("chamber", &vote.chamber.to_string());
    field("roll", &vote.roll_number.to_string());
    field("date", &vote.date.format("%Y-%m-%d %H:%M UTC").to_string());
    if let (Some(congress), Some(session)) = (vote.congress, vote.session) {
        field("congress / session", &format!("{congress} / {session}"));
    }
    if let Some(kind) = &vote.vote_type {
        field("vote type", kind);
    }
    if let Some(bill) = &vote.bill_reference {
        field("bill", bill);
    }
    if let Some(url) = &vote.bill_url {
        field("bill page", url);
    }
    println!();

    println!("Outcome");
    field("question", &vote.question);
    field("result", &vote.result);
    field(
        "yea / nay / present / nv",
        &format!("{} / {} / {} / {}", vote.yea, vote.nay, vote.present, vote.not_voting),
    );
    println!();

    if !vote.party_totals.is_empty() {
        println!("Party Totals");
        for p in vote.party_totals.iter().take(MAX_LIST_ITEMS) {
            field(
                &p.party,
                &format!("{} / {} / {} / {}", p.yea, p.nay, p.present, p.not_voting),
            );
        }
        println!();
    }

    if !vote.source_refs.is_empty() {
        println!("Sources");
        for url in &vote.source_refs {
            println!("  {url}");
        }
        println!();
    }
}

/// Print roll calls newest first, one per line.
pub fn print_vote_table(votes: &[VoteRecord]) {
    let mut votes = votes.to_vec();
    sort_newest_first(&mut votes);

    println!(
        "{:<10} {:>5}  {:<QUESTION_WIDTH$} {:<14} {:>4} {:>4} {:>4} {:>4}",
        "date", "roll", "question", "result", "yea", "nay", "pres", "nv"
    );
    for v in &votes {
        println!(
            "{:<10} {:>5}  {:<QUESTION_WIDTH$} {:<14} {:>4} {:>4} {:>4} {:>4}",
            v.date.format("%Y-%m-%d"),
            v.roll_number,
            truncate(&v.title(), QUESTION_WIDTH),
            truncate(&v.result, 14),
            v.yea,
            v.nay,
            v.present,
            v.not_voting,
        );
    }
    println!("({} roll calls)", votes.len());
}

/// Print attendance, lowest first, at most `limit` rows.
pub fn print_kpi_table(kpis: &KpiSet, limit: usize) {
    let mut rows: Vec<&MemberKPI> = kpis.iter().collect();
    rows.sort_by(|a, b| {
        a.attendance
            .total_cmp(&b.attendance)
            .then_with(|| a.person_id.cmp(&b.person_id))
    });

    println!("{:<12} {:>7} {:>7} {:>10}", "person", "votes", "missed", "attendance");
    for k in rows.iter().take(limit) {
        println!(
            "{:<12} {:>7} {:>7} {:>9.1}%",
            k.person_id,
            k.total_votes,
            k.missed_votes,
            k.attendance * 100.0
        );
    }
    if rows.len() > limit {
        println!("... and {} more", rows.len() - limit);
    }
}

pub fn print_report(report: &MergeReport) {
    eprintln!("  primary: {}", report.primary);
    eprintln!("  used:    {}", report.contributors.join(", "));
    if report.holes_filled > 0 {
        eprintln!("  holes filled: {}", report.holes_filled);
    }
    for e in &report.errors {
        eprintln!("  error: {e}");
    }
}

fn field(label: &str, value: &str) {
    if !value.is_empty() {
        println!("  {label:<26} {value}");
    }
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        return s.to_string();
    }
    let mut out: String = s.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}
