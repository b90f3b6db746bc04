//! URL construction for the roll-call providers.
//!
//! Roll numbers are zero-padded only below a provider-specific threshold:
//! the House Clerk pads to 3 digits below 100 (`roll007.xml`, `roll042.xml`,
//! `roll282.xml`, `roll1001.xml`); the Senate LIS pads to 5 digits always.

/// Zero-pad `roll` to `width` digits when it is below `threshold`.
pub fn pad_roll(roll: u32, width: usize, threshold: u32) -> String {
    if roll < threshold {
        format!("{roll:0width$}")
    } else {
        roll.to_string()
    }
}

/// `https://clerk.house.gov/evs/{year}/roll{NNN}.xml`
pub fn clerk_roll_url(base: &str, year: i32, roll: u32) -> String {
    format!(
        "{}/evs/{year}/roll{}.xml",
        base.trim_end_matches('/'),
        pad_roll(roll, 3, 100)
    )
}

/// `https://clerk.house.gov/evs/{year}/index.asp`
pub fn clerk_index_url(base: &str, year: i32) -> String {
    format!("{}/evs/{year}/index.asp", base.trim_end_matches('/'))
}

/// `https://www.senate.gov/legislative/LIS/roll_call_votes/vote{C}{S}/vote_{C}_{S}_{NNNNN}.xml`
pub fn senate_roll_url(base: &str, congress: u32, session: u32, roll: u32) -> String {
    format!(
        "{}/legislative/LIS/roll_call_votes/vote{congress}{session}/vote_{congress}_{session}_{}.xml",
        base.trim_end_matches('/'),
        pad_roll(roll, 5, 100_000)
    )
}

/// Congress.gov bill page for a bill slug such as `house-bill`.
pub fn congress_bill_url(congress: u32, bill_type: &str, number: u32) -> String {
    format!(
        "https://www.congress.gov/bill/{}-congress/{bill_type}/{number}",
        ordinal(congress)
    )
}

/// Congress number sitting in `year`: the 1st Congress convened in 1789 and
/// each Congress spans two years starting in an odd year.
pub fn congress_for_year(year: i32) -> u32 {
    let start = if year % 2 != 0 { year } else { year - 1 };
    ((start - 1789) / 2 + 1).max(1) as u32
}

/// Session within a Congress: 1 in the odd year, 2 in the even year.
pub fn session_for_year(year: i32) -> u32 {
    if year % 2 != 0 { 1 } else { 2 }
}

/// GovTrack current roles page: `{base}/api/v2/role?current=true&limit=L&offset=N`.
pub fn govtrack_roles_url(base: &str, limit: usize, offset: usize) -> String {
    format!(
        "{}/api/v2/role?current=true&limit={limit}&offset={offset}",
        base.trim_end_matches('/')
    )
}

/// GovTrack roll calls of one chamber created within `[from, to]`, newest first.
pub fn govtrack_votes_url(
    base: &str,
    chamber: &str,
    from: &str,
    to: &str,
    limit: usize,
    offset: usize,
) -> String {
    format!(
        "{}/api/v2/vote?chamber={chamber}&created__gte={from}&created__lte={to}T23:59:59&order_by=-created&limit={limit}&offset={offset}",
        base.trim_end_matches('/')
    )
}

/// Congress.gov vote history of one member, keyed by Bioguide id.
pub fn congress_member_votes_url(
    base: &str,
    bioguide: &str,
    congress: u32,
    limit: usize,
    offset: usize,
    api_key: &str,
) -> String {
    format!(
        "{}/member/{bioguide}/votes?api_key={api_key}&congress={congress}&limit={limit}&offset={offset}",
        base.trim_end_matches('/')
    )
}

/// Congress.gov House vote listing for a date range, newest first.
pub fn congress_vote_list_url(
    base: &str,
    from: &str,
    to: &str,
    page_size: usize,
    offset: usize,
    api_key: &str,
) -> String {
    format!(
        "{}/vote?chamber=house&fromDate={from}&toDate={to}&format=json&pageSize={page_size}&offset={offset}&api_key={api_key}",
        base.trim_end_matches('/')
    )
}

/// Congress.gov vote detail. An empty `api_key` leaves the parameter off,
/// which is the form recorded in `source_refs`.
pub fn congress_vote_detail_url(
    base: &str,
    congress: u32,
    chamber: &str,
    session: u32,
    roll: u32,
    api_key: &str,
) -> String {
    let mut url = format!(
        "{}/vote/{congress}/{chamber}/{session}/{roll}?format=json",
        base.trim_end_matches('/')
    );
    if !api_key.is_empty() {
        url.push_str("&api_key=");
        url.push_str(api_key);
    }
    url
}

fn ordinal(n: u32) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}

/// Strip the query string so credentials never reach the logs.
pub fn redact_query(url: &str) -> &str {
    url.split_once('?').map_or(url, |(path, _)| path)
}
