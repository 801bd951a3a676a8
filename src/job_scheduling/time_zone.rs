//! Session time-zone offset, applied once at startup

use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::{OffsetComponents, Tz};

/// Offset in minutes *west* of UTC for `tz_id` at instant `at`.
///
/// The raw (standard) offset is always applied; the DST saving is added only
/// when `use_dst` is set and `at` falls inside daylight saving time.
/// Returns `None` for ids chrono-tz does not know.
pub fn session_offset_minutes(tz_id: &str, use_dst: bool, at: DateTime<Utc>) -> Option<i32> {
    let tz: Tz = tz_id.parse().ok()?;
    let local = tz.from_utc_datetime(&at.naive_utc());
    let offset = local.offset();

    let mut east_seconds = offset.base_utc_offset().num_seconds();
    if use_dst {
        east_seconds += offset.dst_offset().num_seconds();
    }

    i32::try_from(-east_seconds / 60).ok()
}
