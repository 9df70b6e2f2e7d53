use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const BOOKING_CONFIRMED: &str = "confirmed";
pub const BOOKING_CANCELLED: &str = "cancelled";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ClassType {
    Yoga,
    Zumba,
    Hiit,
}

impl ClassType {
    pub const ALL: [ClassType; 3] = [ClassType::Yoga, ClassType::Zumba, ClassType::Hiit];

    pub fn as_str(&self) -> &'static str {
        match self {
            ClassType::Yoga => "yoga",
            ClassType::Zumba => "zumba",
            ClassType::Hiit => "hiit",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ClassType::Yoga => "Yoga",
            ClassType::Zumba => "Zumba",
            ClassType::Hiit => "HIIT",
        }
    }
}

impl fmt::Display for ClassType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClassType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ClassType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| {
                format!(
                    "Invalid class type '{s}'. Must be one of: {}",
                    ClassType::ALL.map(|t| t.as_str()).join(", ")
                )
            })
    }
}

/// Lifecycle state of a class. Variant order is the only direction a class
/// may move in: `Upcoming < Active < Completed`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum ClassStatus {
    Upcoming,
    Active,
    Completed,
}

impl ClassStatus {
    pub const ALL: [ClassStatus; 3] = [
        ClassStatus::Upcoming,
        ClassStatus::Active,
        ClassStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ClassStatus::Upcoming => "upcoming",
            ClassStatus::Active => "active",
            ClassStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for ClassStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClassStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ClassStatus::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| {
                format!(
                    "Invalid status '{s}'. Must be one of: {}",
                    ClassStatus::ALL.map(|t| t.as_str()).join(", ")
                )
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct FitnessClass {
    pub id: i64,
    pub name: String,
    pub class_type: ClassType,
    pub instructor: String,
    #[schema(value_type = String, format = "date-time", example = "2025-11-24T06:00:00+05:30")]
    pub start_time: DateTime<FixedOffset>,
    #[schema(value_type = String, format = "date-time", example = "2025-11-24T07:00:00+05:30")]
    pub end_time: DateTime<FixedOffset>,
    pub capacity: u32,
    pub available_slots: u32,
    pub status: ClassStatus,
    pub timezone: String,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
    #[schema(value_type = String, format = "date-time")]
    pub updated_at: DateTime<Utc>,
}

impl FitnessClass {
    /// Status derived purely from the schedule.
    pub fn effective_status(&self, now: DateTime<Utc>) -> ClassStatus {
        if now >= self.end_time {
            ClassStatus::Completed
        } else if now >= self.start_time {
            ClassStatus::Active
        } else {
            ClassStatus::Upcoming
        }
    }

    /// Half-open interval overlap: touching endpoints do not overlap.
    pub fn overlaps(&self, start: &DateTime<FixedOffset>, end: &DateTime<FixedOffset>) -> bool {
        self.start_time < *end && self.end_time > *start
    }
}

/// A class timestamp as sent by a client. Naive values carry no offset and are
/// interpreted in the studio's default timezone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClassTime {
    Aware(DateTime<FixedOffset>),
    Naive(NaiveDateTime),
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ClassDraft {
    pub name: String,
    #[schema(example = "yoga")]
    pub class_type: String,
    pub instructor: String,
    #[schema(value_type = String, format = "date-time", example = "2025-11-24T06:00:00Z")]
    pub start_time: ClassTime,
    #[schema(value_type = String, format = "date-time", example = "2025-11-24T07:00:00Z")]
    pub end_time: ClassTime,
    pub capacity: u32,
    #[schema(example = "Asia/Kolkata")]
    pub timezone: Option<String>,
    #[schema(example = "upcoming")]
    pub status: Option<String>,
}

/// A validated class ready to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewClass {
    pub name: String,
    pub class_type: ClassType,
    pub instructor: String,
    pub start_time: DateTime<FixedOffset>,
    pub end_time: DateTime<FixedOffset>,
    pub capacity: u32,
    pub status: ClassStatus,
    pub timezone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct Booking {
    pub id: i64,
    pub class_id: i64,
    pub client_name: String,
    pub client_email: String,
    #[schema(value_type = String, format = "date-time")]
    pub booking_time: DateTime<Utc>,
    #[schema(example = "confirmed")]
    pub status: String,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
    #[schema(value_type = String, format = "date-time")]
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Only confirmed bookings keep a slot reserved on their class.
    pub fn holds_slot(&self) -> bool {
        holds_slot(&self.status)
    }
}

pub fn holds_slot(status: &str) -> bool {
    status == BOOKING_CONFIRMED
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewBooking {
    pub class_id: i64,
    pub client_name: String,
    pub client_email: String,
    pub booking_time: DateTime<Utc>,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BookingRequest {
    pub class_id: i64,
    pub client_name: String,
    #[schema(example = "client@example.com")]
    pub client_email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BookingStatusUpdate {
    #[schema(example = "cancelled")]
    pub status: String,
}

/// A booking joined with the display fields of its class.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct BookingDetails {
    pub id: i64,
    pub class_id: i64,
    pub client_name: String,
    pub client_email: String,
    #[schema(value_type = String, format = "date-time")]
    pub booking_time: DateTime<Utc>,
    pub status: String,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
    #[schema(value_type = String, format = "date-time")]
    pub updated_at: DateTime<Utc>,
    pub class_name: String,
    pub class_type: ClassType,
    pub instructor: String,
    #[schema(value_type = String, format = "date-time")]
    pub start_time: DateTime<FixedOffset>,
    #[schema(value_type = String, format = "date-time")]
    pub end_time: DateTime<FixedOffset>,
    pub timezone: String,
}

impl BookingDetails {
    pub fn new(booking: Booking, class: &FitnessClass) -> Self {
        Self {
            id: booking.id,
            class_id: booking.class_id,
            client_name: booking.client_name,
            client_email: booking.client_email,
            booking_time: booking.booking_time,
            status: booking.status,
            created_at: booking.created_at,
            updated_at: booking.updated_at,
            class_name: class.name.clone(),
            class_type: class.class_type,
            instructor: class.instructor.clone(),
            start_time: class.start_time,
            end_time: class.end_time,
            timezone: class.timezone.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn class_at(start_hour: u32, end_hour: u32) -> FitnessClass {
        let utc = FixedOffset::east_opt(0).unwrap();
        FitnessClass {
            id: 1,
            name: "Yoga AM".to_string(),
            class_type: ClassType::Yoga,
            instructor: "Asha".to_string(),
            start_time: utc.with_ymd_and_hms(2024, 1, 1, start_hour, 0, 0).unwrap(),
            end_time: utc.with_ymd_and_hms(2024, 1, 1, end_hour, 0, 0).unwrap(),
            capacity: 10,
            available_slots: 10,
            status: ClassStatus::Upcoming,
            timezone: "UTC".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_effective_status_follows_clock() {
        let class = class_at(10, 11);
        let at = |h, m| Utc.with_ymd_and_hms(2024, 1, 1, h, m, 0).unwrap();
        assert_eq!(class.effective_status(at(9, 0)), ClassStatus::Upcoming);
        assert_eq!(class.effective_status(at(10, 0)), ClassStatus::Active);
        assert_eq!(class.effective_status(at(10, 30)), ClassStatus::Active);
        assert_eq!(class.effective_status(at(11, 0)), ClassStatus::Completed);
    }

    #[test]
    fn test_overlap_is_half_open() {
        let class = class_at(10, 11);
        let other = class_at(11, 12);
        assert!(!class.overlaps(&other.start_time, &other.end_time));
        let inside = class_at(10, 12);
        assert!(class.overlaps(&inside.start_time, &inside.end_time));
    }

    #[test]
    fn test_enum_parsing() {
        assert_eq!("hiit".parse::<ClassType>().unwrap(), ClassType::Hiit);
        assert!("pilates".parse::<ClassType>().is_err());
        assert_eq!("active".parse::<ClassStatus>().unwrap(), ClassStatus::Active);
        assert!("Active".parse::<ClassStatus>().is_err());
        assert!(ClassStatus::Upcoming < ClassStatus::Completed);
    }

    #[test]
    fn test_class_time_accepts_naive_and_aware() {
        let aware: ClassTime = serde_json::from_str(r#""2024-01-01T10:00:00+02:00""#).unwrap();
        assert!(matches!(aware, ClassTime::Aware(_)));
        let naive: ClassTime = serde_json::from_str(r#""2024-01-01T10:00:00""#).unwrap();
        assert!(matches!(naive, ClassTime::Naive(_)));
    }
}
