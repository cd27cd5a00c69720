use chrono::{DateTime, Utc};

use crate::config::HeartBeatLimits;
use crate::model::{HeartBeat, LAST_BRANCH_MARKER};

/// Structural check of a normalized heartbeat.
pub fn is_valid(hb: &HeartBeat) -> bool {
    let non_negative = |v: Option<i32>| v.map_or(true, |v| v >= 0);

    !hb.user_id.is_empty()
        && !hb.entity.is_empty()
        && hb.time.is_some()
        && hb.branch != LAST_BRANCH_MARKER
        && non_negative(hb.lines)
        && non_negative(hb.line_number)
        && non_negative(hb.cursor_position)
}

/// Whether the event time lies within `[now - max_age, now + max_future]`.
/// A bound beyond the representable range does not limit anything.
pub fn is_timely(hb: &HeartBeat, limits: HeartBeatLimits, now: DateTime<Utc>) -> bool {
    let t = match hb.time {
        Some(t) => t,
        None => return false,
    };

    let oldest = now.checked_sub_signed(limits.max_age);
    let newest = now.checked_add_signed(limits.max_future);

    oldest.map_or(true, |oldest| t >= oldest) && newest.map_or(true, |newest| t <= newest)
}
