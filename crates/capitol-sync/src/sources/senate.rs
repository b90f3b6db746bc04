//! Senate LIS roll-call documents.

use capitol_core::VoteRecord;
use capitol_core::normalize::senate::senate_vote_from_xml;
use capitol_core::urls::senate_roll_url;

use crate::error::SyncError;
use crate::fetch::Fetch;

pub async fn fetch_senate_roll(
    fetch: &dyn Fetch,
    base: &str,
    congress: u32,
    session: u32,
    roll: u32,
) -> Result<VoteRecord, SyncError> {
    let url = senate_roll_url(base, congress, session, roll);
    let xml = fetch.get_text(&url).await?;
    senate_vote_from_xml(&xml, &url)
        .ok_or_else(|| SyncError::Schema(format!("{url} is not a roll-call document")))
}
