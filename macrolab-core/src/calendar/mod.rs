//! Release timing and trading-session alignment.

pub mod session;
pub mod timing;

pub use session::{
    AlignError, EventTiming, SessionAligner, TradingCalendar, WalkDirection,
    DEFAULT_MAX_WALK_DAYS,
};
pub use timing::{parse_release, parse_release_time, parse_event_date, ReleaseTime, TimingError};
