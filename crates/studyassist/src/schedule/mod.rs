//! Schedule data sources: local embedded SQL and remote document store.
//!
//! Both sources expose the same operations with identical semantics; fetches
//! are reactive streams that re-emit the full current state on every
//! underlying change.

mod error;
mod local;
mod remote;
mod types;

pub use error::ScheduleError;
pub use local::LocalStorage;
pub use remote::RemoteScheduleSource;
pub use types::{
    number_classes_by_organization, parse_weekday_tag, weekday_of_millis, weekday_tag,
    BaseSchedule, Class, ClassDetails, CustomSchedule, SubjectDetails, TimeRange, WeekParity,
};
