use baodao_common::{Language, TimeSlot};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};

/// Daily lesson start hours, one 60-minute slot each.
pub const DAILY_START_HOURS: [u32; 5] = [9, 10, 11, 12, 13];

pub const SLOT_MINUTES: i64 = 60;

/// Generate the bookable slot grid for an inclusive date range. An inverted
/// range yields an empty grid rather than an error. Every slot carries the
/// session language so the calendar UI needs no further lookup.
pub fn generate_slots(start_date: NaiveDate, end_date: NaiveDate, language: Language) -> Vec<TimeSlot> {
    let mut slots = Vec::new();
    let mut date = start_date;
    while date <= end_date {
        for hour in DAILY_START_HOURS {
            let Some(time) = NaiveTime::from_hms_opt(hour, 0, 0) else {
                continue;
            };
            let start_time: DateTime<Utc> = date.and_time(time).and_utc();
            slots.push(TimeSlot {
                start_time,
                end_time: start_time + Duration::minutes(SLOT_MINUTES),
                user_language: language,
            });
        }
        date = match date.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }
    slots
}
