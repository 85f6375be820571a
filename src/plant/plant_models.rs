use chrono::{DateTime, Days, Duration, LocalResult, Months, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "watering_interval", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum WateringInterval {
    Days,
    Weeks,
    Months,
    Years,
}

impl std::fmt::Display for WateringInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WateringInterval::Days => write!(f, "days"),
            WateringInterval::Weeks => write!(f, "weeks"),
            WateringInterval::Months => write!(f, "months"),
            WateringInterval::Years => write!(f, "years"),
        }
    }
}

/// Advances `last_watering` by `every` units of `interval` on the wall clock of `tz`.
///
/// Month and year steps clamp to the last day of the target month. A local time
/// that falls into a DST gap is pushed forward by an hour; an ambiguous one
/// resolves to the earlier instant. Returns `None` on overflow.
pub fn next_watering(
    last_watering: DateTime<Utc>,
    every: u32,
    interval: WateringInterval,
    tz: Tz,
) -> Option<DateTime<Utc>> {
    let local = last_watering.with_timezone(&tz).naive_local();

    let advanced = match interval {
        WateringInterval::Days => local.checked_add_days(Days::new(u64::from(every)))?,
        WateringInterval::Weeks => local.checked_add_days(Days::new(u64::from(every) * 7))?,
        WateringInterval::Months => local.checked_add_months(Months::new(every))?,
        WateringInterval::Years => local.checked_add_months(Months::new(every.checked_mul(12)?))?,
    };

    resolve_local(&tz, advanced).map(|dt| dt.with_timezone(&Utc))
}

fn resolve_local(tz: &Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => tz
            .from_local_datetime(&naive.checked_add_signed(Duration::hours(1))?)
            .earliest(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Plant {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub day_between_watering: i32,
    pub watering_interval: WateringInterval,
    pub last_watering: DateTime<Utc>,
    pub next_watering: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Plant {
    pub fn is_overdue(&self, as_of: DateTime<Utc>) -> bool {
        self.next_watering <= as_of
    }

    /// A plant counts as watered while its next watering is strictly ahead.
    pub fn is_watered(&self, now: DateTime<Utc>) -> bool {
        !self.is_overdue(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_watering_interval_display() {
        assert_eq!(WateringInterval::Days.to_string(), "days");
        assert_eq!(WateringInterval::Weeks.to_string(), "weeks");
        assert_eq!(WateringInterval::Months.to_string(), "months");
        assert_eq!(WateringInterval::Years.to_string(), "years");
    }

    #[test]
    fn test_next_watering_in_days() {
        let next = next_watering(utc("2024-03-01T08:00:00Z"), 3, WateringInterval::Days, Tz::Europe__Paris);
        assert_eq!(next, Some(utc("2024-03-04T08:00:00Z")));
    }

    #[test]
    fn test_next_watering_in_weeks() {
        let next = next_watering(utc("2024-01-10T09:00:00Z"), 2, WateringInterval::Weeks, Tz::Europe__Paris);
        assert_eq!(next, Some(utc("2024-01-24T09:00:00Z")));
    }

    #[test]
    fn test_next_watering_in_months_clamps_to_month_end() {
        let next = next_watering(utc("2024-01-31T10:00:00Z"), 1, WateringInterval::Months, Tz::Europe__Paris);
        assert_eq!(next, Some(utc("2024-02-29T10:00:00Z")));
    }

    #[test]
    fn test_next_watering_in_years_from_leap_day() {
        let next = next_watering(utc("2024-02-29T12:00:00Z"), 1, WateringInterval::Years, Tz::Europe__Paris);
        assert_eq!(next, Some(utc("2025-02-28T12:00:00Z")));
    }

    #[test]
    fn test_next_watering_keeps_wall_clock_across_dst() {
        // 09:00 CET on the day before the switch to summer time
        let next = next_watering(utc("2024-03-30T08:00:00Z"), 1, WateringInterval::Days, Tz::Europe__Paris);
        assert_eq!(next, Some(utc("2024-03-31T07:00:00Z")));
    }

    #[test]
    fn test_next_watering_skips_forward_out_of_dst_gap() {
        // 02:30 local does not exist on 2024-03-31 in Paris
        let next = next_watering(utc("2024-03-30T01:30:00Z"), 1, WateringInterval::Days, Tz::Europe__Paris);
        assert_eq!(next, Some(utc("2024-03-31T01:30:00Z")));
    }

    #[test]
    fn test_next_watering_overflow_is_none() {
        let next = next_watering(utc("2024-01-01T00:00:00Z"), u32::MAX, WateringInterval::Years, Tz::UTC);
        assert_eq!(next, None);
    }

    #[test]
    fn test_overdue_and_watered_are_complementary() {
        let now = utc("2024-05-10T12:00:00Z");
        let mut plant = Plant {
            id: Uuid::new_v4(),
            user_id: "user_1".into(),
            name: "Fern".into(),
            description: None,
            image_url: None,
            day_between_watering: 3,
            watering_interval: WateringInterval::Days,
            last_watering: utc("2024-05-07T12:00:00Z"),
            next_watering: now,
            created_at: now,
            updated_at: now,
        };
        assert!(plant.is_overdue(now));
        assert!(!plant.is_watered(now));

        plant.next_watering = now + Duration::seconds(1);
        assert!(!plant.is_overdue(now));
        assert!(plant.is_watered(now));
    }
}
