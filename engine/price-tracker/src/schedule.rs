//! When a tier snaps its trackers back to baseline

use crate::config::ResetSetting;
use crate::{PricingError, Result};
use chrono::{DateTime, Duration, NaiveTime, Timelike, Utc};

/// Reset cadence of a price manipulator
///
/// Daily times are wall-clock times in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResetSchedule {
    #[default]
    Never,
    /// Every `minutes` minutes, counted from the first tick
    Interval { minutes: u32 },
    /// Once a day at the given time
    Daily { at: NaiveTime },
}

impl ResetSchedule {
    pub fn from_setting(setting: Option<&ResetSetting>) -> Result<Self> {
        match setting {
            None => Ok(ResetSchedule::Never),
            Some(ResetSetting::Interval(0)) => {
                Err(PricingError::configuration("reset interval must be at least one minute"))
            }
            Some(ResetSetting::Interval(minutes)) => Ok(ResetSchedule::Interval { minutes: *minutes }),
            Some(ResetSetting::Daily(text)) => Ok(ResetSchedule::Daily { at: parse_time_of_day(text)? }),
        }
    }

    pub fn to_setting(&self) -> Option<ResetSetting> {
        match self {
            ResetSchedule::Never => None,
            ResetSchedule::Interval { minutes } => Some(ResetSetting::Interval(*minutes)),
            ResetSchedule::Daily { at } => {
                Some(ResetSetting::Daily(format!("{:02}:{:02}", at.hour(), at.minute())))
            }
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, ResetSchedule::Never)
    }

    /// First reset strictly after `now`
    pub fn next_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            ResetSchedule::Never => None,
            ResetSchedule::Interval { minutes } => Some(now + Duration::minutes(*minutes as i64)),
            ResetSchedule::Daily { at } => {
                let today = now.date_naive().and_time(*at).and_utc();
                Some(if today <= now { today + Duration::days(1) } else { today })
            }
        }
    }

    /// Most recent daily reset at or before `now`
    ///
    /// Interval schedules have no fixed anchor and return `None`.
    pub fn previous_at_or_before(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            ResetSchedule::Daily { at } => {
                let today = now.date_naive().and_time(*at).and_utc();
                Some(if today <= now { today } else { today - Duration::days(1) })
            }
            _ => None,
        }
    }
}

/// Parse `H:MM` / `HH:MM`, hour 0-24 where 24 means midnight
pub fn parse_time_of_day(text: &str) -> Result<NaiveTime> {
    let malformed = || PricingError::configuration(format!("malformed reset time '{text}', expected HH:MM"));

    let (hour, minute) = text.trim().split_once(':').ok_or_else(malformed)?;
    let digits = |part: &str| (1..=2).contains(&part.len()) && part.chars().all(|c| c.is_ascii_digit());
    if !digits(hour) || !digits(minute) {
        return Err(malformed());
    }
    let hour: u32 = hour.parse().map_err(|_| malformed())?;
    let minute: u32 = minute.parse().map_err(|_| malformed())?;
    if hour > 24 || minute > 59 {
        return Err(malformed());
    }
    NaiveTime::from_hms_opt(hour % 24, minute, 0).ok_or_else(malformed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, h, m, 0).unwrap()
    }

    #[test]
    fn test_parse_time_of_day() {
        assert_eq!(parse_time_of_day("06:30").unwrap(), NaiveTime::from_hms_opt(6, 30, 0).unwrap());
        assert_eq!(parse_time_of_day("6:05").unwrap(), NaiveTime::from_hms_opt(6, 5, 0).unwrap());
        assert_eq!(parse_time_of_day("24:00").unwrap(), NaiveTime::from_hms_opt(0, 0, 0).unwrap());

        for bad in ["25:00", "12:60", "noon", "12", "123:00", "12:5a", ""] {
            assert!(
                matches!(parse_time_of_day(bad), Err(PricingError::Configuration { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_interval_schedule() {
        let schedule = ResetSchedule::Interval { minutes: 90 };
        assert_eq!(schedule.next_after(at(10, 0)), Some(at(11, 30)));
        assert_eq!(schedule.previous_at_or_before(at(10, 0)), None);
    }

    #[test]
    fn test_daily_schedule_rolls_over() {
        let schedule = ResetSchedule::Daily { at: NaiveTime::from_hms_opt(4, 0, 0).unwrap() };
        assert_eq!(schedule.next_after(at(3, 59)), Some(at(4, 0)));
        assert_eq!(schedule.next_after(at(4, 0)), Some(at(4, 0) + Duration::days(1)));
        assert_eq!(schedule.next_after(at(12, 0)), Some(at(4, 0) + Duration::days(1)));

        assert_eq!(schedule.previous_at_or_before(at(12, 0)), Some(at(4, 0)));
        assert_eq!(schedule.previous_at_or_before(at(3, 0)), Some(at(4, 0) - Duration::days(1)));
    }

    #[test]
    fn test_setting_round_trip() {
        let daily = ResetSchedule::from_setting(Some(&ResetSetting::Daily("7:15".into()))).unwrap();
        assert_eq!(daily.to_setting(), Some(ResetSetting::Daily("07:15".into())));

        let interval = ResetSchedule::from_setting(Some(&ResetSetting::Interval(60))).unwrap();
        assert_eq!(interval, ResetSchedule::Interval { minutes: 60 });
        assert!(ResetSchedule::from_setting(Some(&ResetSetting::Interval(0))).is_err());
        assert_eq!(ResetSchedule::from_setting(None).unwrap(), ResetSchedule::Never);
        assert!(!ResetSchedule::Never.is_active());
    }
}
