//! Calendar-week accounting windows.

use chrono::{DateTime, Datelike, Duration, FixedOffset, Local, NaiveDate, NaiveTime, TimeZone};

/// One Monday-to-Monday accounting window.
///
/// `start` is Monday 00:00:00 in the time zone of the instant the window was
/// computed from; `end` is the following Monday's midnight in the same zone,
/// which is not always 168 hours later across a DST change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekWindow {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

impl WeekWindow {
    /// Window containing `now`, in `now`'s time zone.
    pub fn containing<Tz: TimeZone>(now: &DateTime<Tz>) -> Self {
        let tz = now.timezone();
        let date = now.date_naive();
        let monday = date - Duration::days(i64::from(date.weekday().num_days_from_monday()));
        let start = local_midnight(&tz, monday);
        let end = local_midnight(&tz, monday + Duration::days(7));
        Self {
            start: start.fixed_offset(),
            end: end.fixed_offset(),
        }
    }

    /// Window containing the current instant in the process's local zone.
    pub fn current() -> Self {
        Self::containing(&Local::now())
    }

    /// Key under which usage for this window is stored.
    pub fn start_ms(&self) -> i64 {
        self.start.timestamp_millis()
    }

    pub fn contains<Tz: TimeZone>(&self, instant: &DateTime<Tz>) -> bool {
        let ms = instant.timestamp_millis();
        ms >= self.start_ms() && ms < self.end.timestamp_millis()
    }
}

/// First valid instant of `date` in `tz`.
///
/// Midnight can be skipped by a DST transition; the first existing local
/// hour after it is used instead.
fn local_midnight<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Tz> {
    let midnight = date.and_time(NaiveTime::MIN);
    (0..4)
        .find_map(|hour| {
            tz.from_local_datetime(&(midnight + Duration::hours(hour)))
                .earliest()
        })
        .unwrap_or_else(|| tz.from_utc_datetime(&midnight))
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::{Utc, Weekday};

    fn at(offset_hours: i32, y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(offset_hours * 3600)
            .unwrap()
            .with_ymd_and_hms(y, m, d, h, min, s)
            .unwrap()
    }

    #[test]
    fn window_starts_on_monday_midnight() {
        // 2024-06-13 is a Thursday.
        let window = WeekWindow::containing(&at(2, 2024, 6, 13, 15, 30, 0));
        assert_eq!(window.start, at(2, 2024, 6, 10, 0, 0, 0));
        assert_eq!(window.start.weekday(), Weekday::Mon);
        assert_eq!(window.end, at(2, 2024, 6, 17, 0, 0, 0));
    }

    #[test]
    fn same_week_yields_same_window() {
        let monday = WeekWindow::containing(&at(0, 2024, 6, 10, 0, 0, 0));
        let sunday = WeekWindow::containing(&at(0, 2024, 6, 16, 23, 59, 59));
        assert_eq!(monday, sunday);
        assert_eq!(monday, WeekWindow::containing(&at(0, 2024, 6, 10, 0, 0, 0)));
    }

    #[test]
    fn boundary_splits_windows() {
        let before = WeekWindow::containing(&at(0, 2024, 6, 9, 23, 59, 59));
        let after = WeekWindow::containing(&at(0, 2024, 6, 10, 0, 0, 0));
        assert_ne!(before.start_ms(), after.start_ms());
        assert_eq!(before.end, after.start);
    }

    #[test]
    fn week_start_follows_local_zone() {
        // Monday 01:00 in UTC+3 is still Sunday in UTC.
        let instant = at(3, 2024, 6, 10, 1, 0, 0);
        let local = WeekWindow::containing(&instant);
        let utc = WeekWindow::containing(&instant.with_timezone(&Utc));
        assert_eq!(local.start, at(3, 2024, 6, 10, 0, 0, 0));
        assert_eq!(utc.start, at(0, 2024, 6, 3, 0, 0, 0));
    }

    #[test]
    fn contains_is_half_open() {
        let window = WeekWindow::containing(&at(0, 2024, 6, 12, 8, 0, 0));
        assert!(window.contains(&window.start));
        assert!(!window.contains(&window.end));
    }

    #[test]
    fn reset_lands_on_local_midnight_across_dst() {
        use chrono::Timelike;
        use chrono_tz::Europe::Berlin;

        // Clocks go forward on Sunday 2024-03-31 and back on 2024-10-27.
        let spring = WeekWindow::containing(&Berlin.with_ymd_and_hms(2024, 3, 28, 12, 0, 0).unwrap());
        assert_eq!(spring.end, Berlin.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap());
        assert_eq!(spring.end.hour(), 0);
        assert_eq!(spring.end - spring.start, Duration::hours(167));

        let autumn = WeekWindow::containing(&Berlin.with_ymd_and_hms(2024, 10, 23, 12, 0, 0).unwrap());
        assert_eq!(autumn.end, Berlin.with_ymd_and_hms(2024, 10, 28, 0, 0, 0).unwrap());
        assert_eq!(autumn.end - autumn.start, Duration::hours(169));

        let next = WeekWindow::containing(&autumn.end);
        assert_eq!(next.start, autumn.end);
    }
}
