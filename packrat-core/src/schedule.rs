use crate::Timestamp;
use std::fmt;
use time::{Date, Duration, PrimitiveDateTime, Time, Weekday};

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error("hour value {0} out of range [0,23]")]
    HourOutOfRange(i64),
    #[error("minute value {0} out of range [0,59]")]
    MinuteOutOfRange(i64),
    #[error("unknown schedule kind '{0}'")]
    UnknownKind(String),
    #[error("unknown day of week '{0}'")]
    UnknownDayOfWeek(String),
    #[error("invalid schedule date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("'{0}' schedule requires a {1}")]
    MissingField(&'static str, &'static str),
}

/// Wall-clock hour and minute a schedule fires at, interpreted in UTC.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TimeOfDay(Time);

impl TimeOfDay {
    pub fn new(hour: i64, minute: i64) -> Result<TimeOfDay, ScheduleError> {
        if !(0..=23).contains(&hour) {
            return Err(ScheduleError::HourOutOfRange(hour));
        }
        if !(0..=59).contains(&minute) {
            return Err(ScheduleError::MinuteOutOfRange(minute));
        }
        Time::from_hms(hour as u8, minute as u8, 0)
            .map(TimeOfDay)
            .map_err(|_| ScheduleError::HourOutOfRange(hour))
    }

    pub fn hour(&self) -> u8 {
        self.0.hour()
    }

    pub fn minute(&self) -> u8 {
        self.0.minute()
    }

    fn on(&self, date: Date) -> Timestamp {
        PrimitiveDateTime::new(date, self.0).assume_utc()
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

/// Minute past the hour an hourly schedule fires at.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Minute(u8);

impl Minute {
    pub fn new(minute: i64) -> Result<Minute, ScheduleError> {
        u8::try_from(minute)
            .ok()
            .filter(|minute| *minute <= 59)
            .map(Minute)
            .ok_or(ScheduleError::MinuteOutOfRange(minute))
    }

    pub fn get(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for Minute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// When a job runs automatically.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum Schedule {
    /// Only started on request.
    Manual,
    Daily { at: TimeOfDay },
    Hourly { minute: Minute },
    /// Fires a single time and is exhausted afterwards.
    Once { date: Date, at: TimeOfDay },
    Weekly { day: Weekday, at: TimeOfDay },
}

impl Schedule {
    pub fn is_once(&self) -> bool {
        matches!(self, Schedule::Once { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Schedule::Manual => "Manual",
            Schedule::Daily { .. } => "Daily",
            Schedule::Hourly { .. } => "Hourly",
            Schedule::Once { .. } => "Once",
            Schedule::Weekly { .. } => "Weekly",
        }
    }

    /// The first occurrence strictly after `after`, or `None` if the schedule never fires
    /// again.
    pub fn next_run_after(&self, after: Timestamp) -> Option<Timestamp> {
        let after = after.to_offset(time::UtcOffset::UTC);
        match self {
            Schedule::Manual => None,
            Schedule::Daily { at } => {
                let candidate = at.on(after.date());
                if candidate > after {
                    Some(candidate)
                } else {
                    Some(candidate + Duration::days(1))
                }
            }
            Schedule::Hourly { minute } => {
                let candidate = after.replace_time(Time::MIDNIGHT)
                    + Duration::hours(after.hour().into())
                    + Duration::minutes(minute.get().into());
                if candidate > after {
                    Some(candidate)
                } else {
                    Some(candidate + Duration::hours(1))
                }
            }
            Schedule::Once { date, at } => {
                let candidate = at.on(*date);
                (candidate > after).then_some(candidate)
            }
            Schedule::Weekly { day, at } => {
                let current = after.weekday().number_days_from_monday() as i64;
                let target = day.number_days_from_monday() as i64;
                let days_until = (target - current).rem_euclid(7);
                let candidate = at.on(after.date() + Duration::days(days_until));
                if candidate > after {
                    Some(candidate)
                } else {
                    Some(candidate + Duration::weeks(1))
                }
            }
        }
    }

    pub fn to_columns(&self) -> ScheduleColumns {
        let kind = self.kind().to_owned();
        match self {
            Schedule::Manual => ScheduleColumns {
                kind,
                ..Default::default()
            },
            Schedule::Daily { at } => ScheduleColumns {
                kind,
                hour: Some(at.hour() as i64),
                minute: Some(at.minute() as i64),
                ..Default::default()
            },
            Schedule::Hourly { minute } => ScheduleColumns {
                kind,
                hour: Some(0),
                minute: Some(minute.get().into()),
                ..Default::default()
            },
            Schedule::Once { date, at } => ScheduleColumns {
                kind,
                hour: Some(at.hour() as i64),
                minute: Some(at.minute() as i64),
                date: Some(format_date(*date)),
                day_of_week: None,
            },
            Schedule::Weekly { day, at } => ScheduleColumns {
                kind,
                hour: Some(at.hour() as i64),
                minute: Some(at.minute() as i64),
                date: None,
                day_of_week: Some(day.to_string()),
            },
        }
    }

    pub fn from_columns(columns: &ScheduleColumns) -> Result<Schedule, ScheduleError> {
        let at = || {
            TimeOfDay::new(
                columns.hour.unwrap_or_default(),
                columns.minute.unwrap_or_default(),
            )
        };
        match columns.kind.trim().to_ascii_lowercase().as_str() {
            "" | "manual" => Ok(Schedule::Manual),
            "daily" => Ok(Schedule::Daily { at: at()? }),
            "hourly" => {
                Ok(Schedule::Hourly {
                    minute: Minute::new(columns.minute.unwrap_or_default())?,
                })
            }
            "once" => {
                let date = columns
                    .date
                    .as_deref()
                    .filter(|s| !s.is_empty())
                    .ok_or(ScheduleError::MissingField("Once", "date"))?;
                Ok(Schedule::Once {
                    date: parse_date(date)?,
                    at: at()?,
                })
            }
            "weekly" => {
                let day = columns
                    .day_of_week
                    .as_deref()
                    .filter(|s| !s.is_empty())
                    .ok_or(ScheduleError::MissingField("Weekly", "day of week"))?;
                Ok(Schedule::Weekly {
                    day: parse_weekday(day)?,
                    at: at()?,
                })
            }
            _ => Err(ScheduleError::UnknownKind(columns.kind.clone())),
        }
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Schedule::Manual => write!(f, "manual"),
            Schedule::Daily { at } => write!(f, "daily at {at}"),
            Schedule::Hourly { minute } => write!(f, "hourly at :{minute:02}"),
            Schedule::Once { date, at } => write!(f, "once on {} at {at}", format_date(*date)),
            Schedule::Weekly { day, at } => write!(f, "every {day} at {at}"),
        }
    }
}

/// Flat representation of a schedule as it is stored next to a job.
#[derive(Clone, Debug, Eq, PartialEq, Default)]
pub struct ScheduleColumns {
    pub kind: String,
    pub hour: Option<i64>,
    pub minute: Option<i64>,
    pub date: Option<String>,
    pub day_of_week: Option<String>,
}

fn format_date(date: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

pub fn parse_date(s: &str) -> Result<Date, ScheduleError> {
    let format = time::macros::format_description!("[year]-[month]-[day]");
    Date::parse(s.trim(), format).map_err(|_| ScheduleError::InvalidDate(s.to_owned()))
}

pub fn parse_weekday(s: &str) -> Result<Weekday, ScheduleError> {
    use Weekday::*;
    [Monday, Tuesday, Wednesday, Thursday, Friday, Saturday, Sunday]
        .into_iter()
        .find(|day| day.to_string().eq_ignore_ascii_case(s.trim()))
        .ok_or_else(|| ScheduleError::UnknownDayOfWeek(s.to_owned()))
}
