//! Calendar-based estimate of the latest round.

use chrono::NaiveDate;

/// Date of round 1. Draws happen weekly from here on.
pub fn first_draw_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2002, 12, 7).unwrap_or_default()
}

/// `floor((today - first_draw_date) / 7) + 1`, or `None` before the first draw.
pub fn estimate_latest_round(today: NaiveDate) -> Option<u32> {
    let days = (today - first_draw_date()).num_days();
    if days < 0 {
        return None;
    }
    u32::try_from(days / 7 + 1).ok()
}
