//! Domain types for base and custom schedules.

use crate::directory::{Employee, Organization, Subject};
use chrono::{Datelike, TimeZone, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Validity window as epoch-millisecond instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: i64,
    pub to: i64,
}

impl TimeRange {
    pub fn new(from: i64, to: i64) -> Self {
        Self { from, to }
    }

    /// True when this range overlaps the queried window:
    /// `to >= q_from && from <= q_to`.
    pub fn overlaps(&self, q_from: i64, q_to: i64) -> bool {
        self.to >= q_from && self.from <= q_to
    }

    pub fn contains(&self, instant: i64) -> bool {
        self.overlaps(instant, instant)
    }

    /// Compares both endpoints.
    pub fn time_equals(&self, other: &TimeRange) -> bool {
        self.from == other.from && self.to == other.to
    }

    pub fn duration_millis(&self) -> i64 {
        self.to - self.from
    }
}

/// Two-valued tag distinguishing alternating-week recurring schedules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WeekParity {
    Odd,
    Even,
}

impl WeekParity {
    pub fn as_tag(&self) -> &'static str {
        match self {
            WeekParity::Odd => "odd",
            WeekParity::Even => "even",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "odd" => Some(WeekParity::Odd),
            "even" => Some(WeekParity::Even),
            _ => None,
        }
    }
}

pub fn weekday_tag(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

pub fn parse_weekday_tag(tag: &str) -> Option<Weekday> {
    match tag {
        "monday" => Some(Weekday::Mon),
        "tuesday" => Some(Weekday::Tue),
        "wednesday" => Some(Weekday::Wed),
        "thursday" => Some(Weekday::Thu),
        "friday" => Some(Weekday::Fri),
        "saturday" => Some(Weekday::Sat),
        "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

/// Weekday of an epoch-millisecond instant, in UTC. `None` only for instants
/// outside chrono's representable range.
pub fn weekday_of_millis(millis: i64) -> Option<Weekday> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .map(|dt| dt.weekday())
}

pub(crate) mod weekday_serde {
    use chrono::Weekday;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(weekday: &Weekday, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(super::weekday_tag(*weekday))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Weekday, D::Error> {
        let tag = String::deserialize(deserializer)?;
        super::parse_weekday_tag(&tag)
            .ok_or_else(|| D::Error::custom(format!("unknown weekday tag: {tag}")))
    }
}

/// A single class within a schedule. References are joined at read time into
/// [`ClassDetails`]; the organization reference is required, the rest are
/// optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Class {
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub schedule_id: String,
    pub organization_id: String,
    #[serde(default)]
    pub subject_id: Option<String>,
    #[serde(default)]
    pub teacher_id: Option<String>,
    #[serde(default)]
    pub office: String,
    #[serde(default)]
    pub location: Option<String>,
    pub time_range: TimeRange,
}

/// A recurring weekly schedule template: applies on `day_of_week`, on weeks
/// of `week` parity, while `date_version` is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseSchedule {
    #[serde(default)]
    pub uid: String,
    pub date_version: TimeRange,
    pub week: WeekParity,
    #[serde(with = "weekday_serde")]
    pub day_of_week: Weekday,
    #[serde(default)]
    pub classes: Vec<Class>,
}

/// A date-pinned override replacing the base schedule's classes for one
/// specific day. `date_version.to` orders multiple override versions for the
/// same date; the most recent wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomSchedule {
    #[serde(default)]
    pub uid: String,
    pub date: i64,
    pub date_version: TimeRange,
    #[serde(default)]
    pub classes: Vec<Class>,
}

/// A subject joined with its assigned teacher.
#[derive(Debug, Clone, PartialEq)]
pub struct SubjectDetails {
    pub subject: Subject,
    pub teacher: Option<Employee>,
}

/// A class with its foreign references joined in. Computed per fetch, never
/// persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDetails {
    pub uid: String,
    pub schedule_id: String,
    pub organization: Organization,
    pub subject: Option<SubjectDetails>,
    pub teacher: Option<Employee>,
    pub office: String,
    pub location: Option<String>,
    pub time_range: TimeRange,
}

/// Presentation numbering: classes grouped by organization UID, each group
/// numbered 1-indexed in input order. Depends on the data layer returning
/// classes in stable order.
pub fn number_classes_by_organization(classes: &[Class]) -> Vec<(Class, usize)> {
    let mut counters: HashMap<&str, usize> = HashMap::new();
    classes
        .iter()
        .map(|class| {
            let counter = counters.entry(class.organization_id.as_str()).or_insert(0);
            *counter += 1;
            (class.clone(), *counter)
        })
        .collect()
}
