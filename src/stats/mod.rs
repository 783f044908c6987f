pub mod as_of;
pub mod extract;
pub mod types;
pub mod view;

pub use as_of::as_of_date;
pub use extract::{extract, extract_all, ViewOutcome, ViewSet};
pub use types::{Block, ErrorCode, RawStatsPayload, Record, StatRow, StatValue, StatsTable};
pub use view::StatsView;
