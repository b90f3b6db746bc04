pub mod index;
pub mod kpi;
pub mod normalize;
pub mod record_set;
pub mod urls;
pub mod vote;

pub use index::resolve_roll_numbers;
pub use kpi::{KpiSet, MemberKPI};
pub use record_set::{Keyed, RecordSet};
pub use vote::{Chamber, PartyTally, VoteRecord, VoteSet, VoteWindow};
