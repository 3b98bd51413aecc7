use crate::core::date_code::DateCode;
use crate::domain::model::{MatchSet, Roster, UpcomingBirthday};
use chrono::{DateTime, Days, FixedOffset, NaiveDate, Utc};

/// Calendar date of `now` as seen at `offset`.
pub fn local_date(now: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    now.with_timezone(&offset).date_naive()
}

/// Today/tomorrow partitions of the roster for the instant `now`.
pub fn match_roster(now: DateTime<Utc>, roster: &Roster, offset: FixedOffset) -> MatchSet {
    match_on(local_date(now, offset), roster)
}

/// Single ordered scan. A record lands in at most one list, today first.
pub fn match_on(today: NaiveDate, roster: &Roster) -> MatchSet {
    let tomorrow = today.checked_add_days(Days::new(1));
    let mut matches = MatchSet::default();

    for record in roster {
        if record.birthday.matches_on(today) {
            matches.today.push(record.name.clone());
        } else if tomorrow.is_some_and(|date| record.birthday.matches_on(date)) {
            matches.tomorrow.push(record.name.clone());
        }
    }

    matches
}

/// Birthdays from `today` through `days_ahead` days later, nearest first.
/// Roster order is kept within the same day.
pub fn upcoming(today: NaiveDate, roster: &Roster, days_ahead: u32) -> Vec<UpcomingBirthday> {
    let mut found = Vec::new();

    for day_offset in 0..=days_ahead {
        let Some(date) = today.checked_add_days(Days::new(day_offset as u64)) else {
            break;
        };

        for record in roster {
            if record.birthday.matches_on(date) {
                found.push(UpcomingBirthday {
                    name: record.name.clone(),
                    birthday: record.birthday,
                    day_offset,
                    label: day_label(day_offset, date),
                });
            }
        }
    }

    found
}

fn day_label(day_offset: u32, date: NaiveDate) -> String {
    match day_offset {
        0 => "today".to_string(),
        1 => "tomorrow".to_string(),
        2 => "day after tomorrow".to_string(),
        _ => DateCode::from_date(&date).to_string(),
    }
}
