//! Next-fire-time resolution for alarms.
//!
//! Pure functions: no I/O, deterministic for a given `(alarm, now)`.

use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};

use rise_core::types::{Alarm, DayOfWeek};

/// Compute the next instant strictly after `now` at which `alarm` fires.
///
/// The result is in the same zone as `now`; `alarm.hour:alarm.minute` is
/// read as wall-clock time in that zone.
pub fn resolve_next_fire_time<Tz: TimeZone>(alarm: &Alarm, now: &DateTime<Tz>) -> DateTime<Tz> {
    next_occurrence(alarm.hour, alarm.minute, &alarm.repeat_days, now)
}

/// Next occurrence of `hour:minute` after `now`, restricted to `repeat_days`
/// when that set is non-empty.
pub fn next_occurrence<Tz: TimeZone>(
    hour: u8,
    minute: u8,
    repeat_days: &BTreeSet<DayOfWeek>,
    now: &DateTime<Tz>,
) -> DateTime<Tz> {
    let tz = now.timezone();
    let time = wall_clock(hour, minute);
    let mut date = now.date_naive();

    if localize(&tz, date.and_time(time)) <= *now {
        date = next_day(date);
    }

    if !repeat_days.is_empty() {
        // A non-empty set always matches within a week.
        for _ in 0..7 {
            if repeat_days.contains(&DayOfWeek::from_chrono(date.weekday())) {
                break;
            }
            date = next_day(date);
        }
    }

    localize(&tz, date.and_time(time))
}

/// Wall-clock time for an alarm; out-of-range fields are clamped.
fn wall_clock(hour: u8, minute: u8) -> NaiveTime {
    NaiveTime::from_hms_opt(u32::from(hour.min(23)), u32::from(minute.min(59)), 0)
        .unwrap_or(NaiveTime::MIN)
}

fn next_day(date: NaiveDate) -> NaiveDate {
    date.succ_opt().unwrap_or(date)
}

/// Map a local wall-clock time onto the zone.
///
/// Ambiguous times (clocks falling back) take the earlier instant. Times
/// inside a spring-forward gap move one hour later.
fn localize<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => tz
            .from_local_datetime(&(naive + Duration::hours(1)))
            .earliest()
            .unwrap_or_else(|| tz.from_utc_datetime(&naive)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Timelike, Weekday};
    use rise_core::types::{AlarmId, NewAlarm, Timestamp};

    fn tz() -> FixedOffset {
        FixedOffset::east_opt(2 * 3600).unwrap()
    }

    /// 2024-01-01 is a Monday.
    fn at(day: u32, hour: u32, minute: u32) -> DateTime<FixedOffset> {
        tz().with_ymd_and_hms(2024, 1, day, hour, minute, 0).unwrap()
    }

    fn alarm(hour: u8, minute: u8, days: &[DayOfWeek]) -> Alarm {
        Alarm::from_new(
            NewAlarm::at(hour, minute).with_repeat_days(days.iter().copied()),
            AlarmId::new(),
            Timestamp(0),
        )
    }

    #[test]
    fn test_one_time_already_passed_rolls_to_tomorrow() {
        let now = at(1, 8, 30);
        let next = resolve_next_fire_time(&alarm(7, 0, &[]), &now);
        assert_eq!(next, at(2, 7, 0));
        assert_eq!(next.weekday(), Weekday::Tue);
    }

    #[test]
    fn test_one_time_later_today() {
        let now = at(1, 8, 30);
        let next = resolve_next_fire_time(&alarm(9, 0, &[]), &now);
        assert_eq!(next, at(1, 9, 0));
    }

    #[test]
    fn test_repeating_skips_to_next_matching_weekday() {
        let now = at(1, 8, 30);
        let days = [DayOfWeek::Mon, DayOfWeek::Wed, DayOfWeek::Fri];
        let next = resolve_next_fire_time(&alarm(7, 0, &days), &now);
        assert_eq!(next, at(3, 7, 0));
        assert_eq!(next.weekday(), Weekday::Wed);
    }

    #[test]
    fn test_repeating_same_day_still_ahead() {
        let now = at(7, 23, 0);
        assert_eq!(now.weekday(), Weekday::Sun);
        let next = resolve_next_fire_time(&alarm(23, 30, &[DayOfWeek::Sun]), &now);
        assert_eq!(next, at(7, 23, 30));
    }

    #[test]
    fn test_singleton_today_passed_waits_a_full_week() {
        let now = at(1, 8, 30);
        let next = resolve_next_fire_time(&alarm(7, 0, &[DayOfWeek::Mon]), &now);
        assert_eq!(next, at(8, 7, 0));
    }

    #[test]
    fn test_rolled_day_in_set_is_not_skipped() {
        // Monday 08:30, alarm 07:00 on Tuesdays: rollover lands on Tuesday.
        let now = at(1, 8, 30);
        let next = resolve_next_fire_time(&alarm(7, 0, &[DayOfWeek::Tue]), &now);
        assert_eq!(next, at(2, 7, 0));
    }

    #[test]
    fn test_exactly_now_is_not_due() {
        let now = at(1, 7, 0);
        let next = resolve_next_fire_time(&alarm(7, 0, &[]), &now);
        assert_eq!(next, at(2, 7, 0));
    }

    #[test]
    fn test_sub_minute_before_fires_today() {
        let now = at(1, 6, 59) + Duration::milliseconds(59_500);
        let next = resolve_next_fire_time(&alarm(7, 0, &[]), &now);
        assert_eq!(next, at(1, 7, 0));
    }

    #[test]
    fn test_end_of_day_edge_values() {
        let now = at(1, 23, 59);
        let next = resolve_next_fire_time(&alarm(23, 59, &[]), &now);
        assert_eq!(next, at(2, 23, 59));

        let next = resolve_next_fire_time(&alarm(0, 0, &[]), &now);
        assert_eq!(next, at(2, 0, 0));
    }

    #[test]
    fn test_out_of_range_values_are_clamped() {
        let now = at(1, 8, 0);
        let next = resolve_next_fire_time(&alarm(99, 200, &[]), &now);
        assert_eq!(next, at(1, 23, 59));
    }

    #[test]
    fn test_week_wraparound_saturday_to_sunday() {
        // Saturday 2024-01-06 10:00, alarm Sundays at 09:00.
        let now = at(6, 10, 0);
        let next = resolve_next_fire_time(&alarm(9, 0, &[DayOfWeek::Sun]), &now);
        assert_eq!(next, at(7, 9, 0));
    }

    #[test]
    fn test_month_boundary() {
        let now = tz().with_ymd_and_hms(2024, 1, 31, 22, 0, 0).unwrap();
        let next = resolve_next_fire_time(&alarm(6, 0, &[]), &now);
        assert_eq!(next, tz().with_ymd_and_hms(2024, 2, 1, 6, 0, 0).unwrap());
    }

    #[test]
    fn test_every_day_set_behaves_like_one_time() {
        let now = at(3, 12, 0);
        let every = alarm(11, 0, &DayOfWeek::ALL);
        let once = alarm(11, 0, &[]);
        assert_eq!(
            resolve_next_fire_time(&every, &now),
            resolve_next_fire_time(&once, &now)
        );
    }

    #[test]
    fn test_one_time_is_strictly_future_and_same_or_next_day() {
        let start = at(1, 0, 0);
        for step in 0..(2 * 24 * 60 / 13) {
            let now = start + Duration::minutes(13 * step);
            for (hour, minute) in [(0, 0), (6, 30), (12, 0), (23, 59)] {
                let next = resolve_next_fire_time(&alarm(hour, minute, &[]), &now);
                assert!(next > now);
                let alarm_is_later_today =
                    (u32::from(hour), u32::from(minute)) > (now.hour(), now.minute());
                let expected_date = if alarm_is_later_today {
                    now.date_naive()
                } else {
                    now.date_naive().succ_opt().unwrap()
                };
                assert_eq!(next.date_naive(), expected_date);
            }
        }
    }

    #[test]
    fn test_repeating_result_is_member_and_minimal() {
        let start = at(1, 0, 0);
        for mask in 1u8..128 {
            let days: Vec<DayOfWeek> = DayOfWeek::ALL
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, d)| *d)
                .collect();
            let subject = alarm(7, 15, &days);

            for step in 0..9 {
                let now = start + Duration::minutes(19 * 60 * step + 7);
                let next = resolve_next_fire_time(&subject, &now);

                assert!(next > now);
                assert!(subject
                    .repeat_days
                    .contains(&DayOfWeek::from_chrono(next.weekday())));

                // No earlier qualifying day exists between now and the result.
                let mut day = now.date_naive();
                while day < next.date_naive() {
                    let candidate = localize(&tz(), day.and_time(wall_clock(7, 15)));
                    let qualifies = candidate > now
                        && subject
                            .repeat_days
                            .contains(&DayOfWeek::from_chrono(day.weekday()));
                    assert!(!qualifies, "earlier fire time {} was skipped", candidate);
                    day = day.succ_opt().unwrap();
                }
            }
        }
    }
}
