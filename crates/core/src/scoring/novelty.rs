use chrono::{DateTime, Months, Utc};

use super::{NOVELTY_WINDOW_DAYS, NOVELTY_WINDOW_MONTHS};

pub fn invert_novelty(novelty_rate: f64) -> f64 {
    NOVELTY_WINDOW_DAYS - novelty_rate
}

/// Oldest creation time that still earns a measured novelty rate.
pub fn novelty_cutoff(as_of: DateTime<Utc>) -> DateTime<Utc> {
    as_of.checked_sub_months(Months::new(NOVELTY_WINDOW_MONTHS)).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Calendar days between the two dates, or `None` outside the novelty window.
pub fn novelty_days(as_of: DateTime<Utc>, date_created: DateTime<Utc>) -> Option<f64> {
    if date_created < novelty_cutoff(as_of) {
        return None;
    }
    Some((as_of.date_naive() - date_created.date_naive()).num_days() as f64)
}
