//! Local embedded-SQL storage for schedules and directory records.
//!
//! Schedule rows carry their classes as an inline JSON column; class
//! enrichment joins against the directory tables per fetch. Every mutation
//! signals the matching change notifier so open fetch streams re-emit.

use super::error::ScheduleError;
use super::types::{
    parse_weekday_tag, weekday_of_millis, weekday_tag, BaseSchedule, Class, ClassDetails,
    CustomSchedule, SubjectDetails, TimeRange, WeekParity,
};
use crate::directory::{Employee, Organization, Subject};
use crate::watch::{observe, ChangeNotifier};
use futures::Stream;
use rusqlite::{params, Connection};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

const SCHEMA_SQL: &str = include_str!("../../../../sql/init_schedules.sql");

const BASE_COLUMNS: &str = "uid, ver_from, ver_to, week, day_of_week, classes";
const CUSTOM_COLUMNS: &str = "uid, date, ver_from, ver_to, classes";

const BASE_UPSERT_SQL: &str = "INSERT INTO base_schedules (uid, ver_from, ver_to, week, day_of_week, classes)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
     ON CONFLICT(uid) DO UPDATE SET
         ver_from = excluded.ver_from,
         ver_to = excluded.ver_to,
         week = excluded.week,
         day_of_week = excluded.day_of_week,
         classes = excluded.classes";

const CUSTOM_UPSERT_SQL: &str = "INSERT INTO custom_schedules (uid, date, ver_from, ver_to, classes)
     VALUES (?1, ?2, ?3, ?4, ?5)
     ON CONFLICT(uid) DO UPDATE SET
         date = excluded.date,
         ver_from = excluded.ver_from,
         ver_to = excluded.ver_to,
         classes = excluded.classes";

struct Inner {
    db: Mutex<Connection>,
    base_changes: ChangeNotifier,
    custom_changes: ChangeNotifier,
    directory_changes: ChangeNotifier,
}

/// Local schedule storage backed by embedded SQLite.
#[derive(Clone)]
pub struct LocalStorage {
    inner: Arc<Inner>,
}

impl LocalStorage {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ScheduleError> {
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, ScheduleError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, ScheduleError> {
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            inner: Arc::new(Inner {
                db: Mutex::new(conn),
                base_changes: ChangeNotifier::new(),
                custom_changes: ChangeNotifier::new(),
                directory_changes: ChangeNotifier::new(),
            }),
        })
    }

    // ---- base schedules ----

    /// Upserts a base schedule, assigning a fresh UID when empty. Returns the
    /// resolved UID.
    pub fn add_or_update_base(&self, mut schedule: BaseSchedule) -> Result<String, ScheduleError> {
        assign_uids_base(&mut schedule);
        let classes_json = serde_json::to_string(&schedule.classes)?;
        {
            let db = self.inner.db.lock().unwrap();
            db.execute(
                BASE_UPSERT_SQL,
                params![
                    schedule.uid,
                    schedule.date_version.from,
                    schedule.date_version.to,
                    schedule.week.as_tag(),
                    weekday_tag(schedule.day_of_week),
                    classes_json,
                ],
            )?;
        }
        self.inner.base_changes.notify();
        Ok(schedule.uid)
    }

    /// Reactive lookup by UID; emits `None` for an empty or unknown UID.
    pub fn fetch_base_by_id(
        &self,
        uid: &str,
    ) -> impl Stream<Item = Result<Option<BaseSchedule>, ScheduleError>> {
        let inner = Arc::clone(&self.inner);
        let uid = uid.to_string();
        observe(self.inner.base_changes.watch(), move || {
            let inner = Arc::clone(&inner);
            let uid = uid.clone();
            async move {
                if uid.is_empty() {
                    return Ok(None);
                }
                base_by_id(&inner, &uid)
            }
        })
    }

    /// The base schedule in effect on `date` for the given week parity: the
    /// matching weekday/parity row whose version range covers `date`, most
    /// recently superseding version first.
    pub fn fetch_base_by_date(
        &self,
        date: i64,
        parity: WeekParity,
    ) -> impl Stream<Item = Result<Option<BaseSchedule>, ScheduleError>> {
        let inner = Arc::clone(&self.inner);
        observe(self.inner.base_changes.watch(), move || {
            let inner = Arc::clone(&inner);
            async move { base_by_date(&inner, date, parity) }
        })
    }

    /// All base schedules whose version range overlaps `[from, to]`,
    /// optionally narrowed to one week parity, ordered by `to` descending.
    pub fn fetch_base_by_version_range(
        &self,
        from: i64,
        to: i64,
        parity: Option<WeekParity>,
    ) -> impl Stream<Item = Result<Vec<BaseSchedule>, ScheduleError>> {
        let inner = Arc::clone(&self.inner);
        observe(self.inner.base_changes.watch(), move || {
            let inner = Arc::clone(&inner);
            async move { base_by_version_range(&inner, from, to, parity) }
        })
    }

    // ---- custom schedules ----

    pub fn add_or_update_custom(
        &self,
        mut schedule: CustomSchedule,
    ) -> Result<String, ScheduleError> {
        assign_uids_custom(&mut schedule);
        {
            let db = self.inner.db.lock().unwrap();
            apply_custom_upsert(&db, &schedule)?;
        }
        self.inner.custom_changes.notify();
        Ok(schedule.uid)
    }

    /// Batched upsert inside one transaction: either every schedule in the
    /// group lands or none does.
    pub fn add_or_update_custom_group(
        &self,
        schedules: Vec<CustomSchedule>,
    ) -> Result<Vec<String>, ScheduleError> {
        let mut uids = Vec::with_capacity(schedules.len());
        {
            let mut db = self.inner.db.lock().unwrap();
            let tx = db.transaction()?;
            for mut schedule in schedules {
                assign_uids_custom(&mut schedule);
                apply_custom_upsert(&tx, &schedule)?;
                uids.push(schedule.uid);
            }
            tx.commit()?;
        }
        self.inner.custom_changes.notify();
        Ok(uids)
    }

    pub fn fetch_custom_by_id(
        &self,
        uid: &str,
    ) -> impl Stream<Item = Result<Option<CustomSchedule>, ScheduleError>> {
        let inner = Arc::clone(&self.inner);
        let uid = uid.to_string();
        observe(self.inner.custom_changes.watch(), move || {
            let inner = Arc::clone(&inner);
            let uid = uid.clone();
            async move {
                if uid.is_empty() {
                    return Ok(None);
                }
                custom_by_id(&inner, &uid)
            }
        })
    }

    /// The override pinned to exactly `date`; when several override versions
    /// exist for one date, the most recent wins.
    pub fn fetch_custom_by_date(
        &self,
        date: i64,
    ) -> impl Stream<Item = Result<Option<CustomSchedule>, ScheduleError>> {
        let inner = Arc::clone(&self.inner);
        observe(self.inner.custom_changes.watch(), move || {
            let inner = Arc::clone(&inner);
            async move { custom_by_date(&inner, date) }
        })
    }

    /// All overrides pinned to dates within `[from, to]`.
    pub fn fetch_custom_by_date_range(
        &self,
        from: i64,
        to: i64,
    ) -> impl Stream<Item = Result<Vec<CustomSchedule>, ScheduleError>> {
        let inner = Arc::clone(&self.inner);
        observe(self.inner.custom_changes.watch(), move || {
            let inner = Arc::clone(&inner);
            async move { custom_by_date_range(&inner, from, to) }
        })
    }

    /// Deletes one override; returns whether a row was removed.
    pub fn delete_custom_by_id(&self, uid: &str) -> Result<bool, ScheduleError> {
        let affected = {
            let db = self.inner.db.lock().unwrap();
            db.execute("DELETE FROM custom_schedules WHERE uid = ?1", [uid])?
        };
        if affected > 0 {
            self.inner.custom_changes.notify();
        }
        Ok(affected > 0)
    }

    /// Sweep-delete of every override pinned within `[from, to]`.
    pub fn delete_custom_by_time_range(&self, from: i64, to: i64) -> Result<usize, ScheduleError> {
        let affected = {
            let db = self.inner.db.lock().unwrap();
            db.execute(
                "DELETE FROM custom_schedules WHERE date >= ?1 AND date <= ?2",
                params![from, to],
            )?
        };
        if affected > 0 {
            self.inner.custom_changes.notify();
        }
        Ok(affected)
    }

    // ---- directory ----

    pub fn put_organization(&self, mut org: Organization) -> Result<String, ScheduleError> {
        if org.uid.is_empty() {
            org.uid = Uuid::new_v4().to_string();
        }
        let data = serde_json::to_string(&org)?;
        {
            let db = self.inner.db.lock().unwrap();
            db.execute(
                "INSERT INTO organizations (uid, data) VALUES (?1, ?2)
                 ON CONFLICT(uid) DO UPDATE SET data = excluded.data",
                params![org.uid, data],
            )?;
        }
        self.inner.directory_changes.notify();
        Ok(org.uid)
    }

    pub fn put_subject(&self, mut subject: Subject) -> Result<String, ScheduleError> {
        if subject.uid.is_empty() {
            subject.uid = Uuid::new_v4().to_string();
        }
        let data = serde_json::to_string(&subject)?;
        {
            let db = self.inner.db.lock().unwrap();
            db.execute(
                "INSERT INTO subjects (uid, organization_id, data) VALUES (?1, ?2, ?3)
                 ON CONFLICT(uid) DO UPDATE SET
                     organization_id = excluded.organization_id,
                     data = excluded.data",
                params![subject.uid, subject.organization_id, data],
            )?;
        }
        self.inner.directory_changes.notify();
        Ok(subject.uid)
    }

    pub fn put_employee(&self, mut employee: Employee) -> Result<String, ScheduleError> {
        if employee.uid.is_empty() {
            employee.uid = Uuid::new_v4().to_string();
        }
        let data = serde_json::to_string(&employee)?;
        {
            let db = self.inner.db.lock().unwrap();
            db.execute(
                "INSERT INTO employees (uid, organization_id, data) VALUES (?1, ?2, ?3)
                 ON CONFLICT(uid) DO UPDATE SET
                     organization_id = excluded.organization_id,
                     data = excluded.data",
                params![employee.uid, employee.organization_id, data],
            )?;
        }
        self.inner.directory_changes.notify();
        Ok(employee.uid)
    }

    // ---- class enrichment ----

    /// Loads the parent schedule (base first, then custom), finds the class,
    /// and joins its organization (required), subject (optional, with the
    /// subject's assigned teacher) and teacher (optional) records.
    pub fn fetch_class_by_id(
        &self,
        class_uid: &str,
        schedule_uid: &str,
    ) -> impl Stream<Item = Result<Option<ClassDetails>, ScheduleError>> {
        let inner = Arc::clone(&self.inner);
        let class_uid = class_uid.to_string();
        let schedule_uid = schedule_uid.to_string();
        let trigger = futures::stream::select(
            futures::stream::select(
                self.inner.base_changes.watch(),
                self.inner.custom_changes.watch(),
            ),
            self.inner.directory_changes.watch(),
        );
        observe(trigger, move || {
            let inner = Arc::clone(&inner);
            let class_uid = class_uid.clone();
            let schedule_uid = schedule_uid.clone();
            async move { class_by_id(&inner, &class_uid, &schedule_uid) }
        })
    }
}

fn assign_uids_base(schedule: &mut BaseSchedule) {
    if schedule.uid.is_empty() {
        schedule.uid = Uuid::new_v4().to_string();
    }
    for class in &mut schedule.classes {
        if class.uid.is_empty() {
            class.uid = Uuid::new_v4().to_string();
        }
        class.schedule_id = schedule.uid.clone();
    }
}

fn assign_uids_custom(schedule: &mut CustomSchedule) {
    if schedule.uid.is_empty() {
        schedule.uid = Uuid::new_v4().to_string();
    }
    for class in &mut schedule.classes {
        if class.uid.is_empty() {
            class.uid = Uuid::new_v4().to_string();
        }
        class.schedule_id = schedule.uid.clone();
    }
}

fn apply_custom_upsert(conn: &Connection, schedule: &CustomSchedule) -> Result<(), ScheduleError> {
    let classes_json = serde_json::to_string(&schedule.classes)?;
    conn.execute(
        CUSTOM_UPSERT_SQL,
        params![
            schedule.uid,
            schedule.date,
            schedule.date_version.from,
            schedule.date_version.to,
            classes_json,
        ],
    )?;
    Ok(())
}

fn base_from_row(row: &rusqlite::Row<'_>) -> Result<BaseSchedule, ScheduleError> {
    let uid: String = row.get(0)?;
    let ver_from: i64 = row.get(1)?;
    let ver_to: i64 = row.get(2)?;
    let week_tag: String = row.get(3)?;
    let day_tag: String = row.get(4)?;
    let classes_json: String = row.get(5)?;

    let week = WeekParity::from_tag(&week_tag).ok_or_else(|| ScheduleError::Corrupt {
        message: format!("unknown week parity tag: {week_tag}"),
    })?;
    let day_of_week = parse_weekday_tag(&day_tag).ok_or_else(|| ScheduleError::Corrupt {
        message: format!("unknown weekday tag: {day_tag}"),
    })?;
    let classes: Vec<Class> = serde_json::from_str(&classes_json)?;

    Ok(BaseSchedule {
        uid,
        date_version: TimeRange::new(ver_from, ver_to),
        week,
        day_of_week,
        classes,
    })
}

fn custom_from_row(row: &rusqlite::Row<'_>) -> Result<CustomSchedule, ScheduleError> {
    let uid: String = row.get(0)?;
    let date: i64 = row.get(1)?;
    let ver_from: i64 = row.get(2)?;
    let ver_to: i64 = row.get(3)?;
    let classes_json: String = row.get(4)?;
    let classes: Vec<Class> = serde_json::from_str(&classes_json)?;

    Ok(CustomSchedule {
        uid,
        date,
        date_version: TimeRange::new(ver_from, ver_to),
        classes,
    })
}

fn base_by_id(inner: &Inner, uid: &str) -> Result<Option<BaseSchedule>, ScheduleError> {
    let db = inner.db.lock().unwrap();
    let mut stmt = db.prepare(&format!(
        "SELECT {BASE_COLUMNS} FROM base_schedules WHERE uid = ?1"
    ))?;
    let mut rows = stmt.query([uid])?;
    match rows.next()? {
        Some(row) => Ok(Some(base_from_row(row)?)),
        None => Ok(None),
    }
}

fn base_by_date(
    inner: &Inner,
    date: i64,
    parity: WeekParity,
) -> Result<Option<BaseSchedule>, ScheduleError> {
    let weekday = weekday_of_millis(date).ok_or(ScheduleError::InvalidDate { millis: date })?;
    let db = inner.db.lock().unwrap();
    let mut stmt = db.prepare(&format!(
        "SELECT {BASE_COLUMNS} FROM base_schedules
         WHERE day_of_week = ?1 AND week = ?2 AND ver_to >= ?3 AND ver_from <= ?3
         ORDER BY ver_to DESC LIMIT 1"
    ))?;
    let mut rows = stmt.query(params![weekday_tag(weekday), parity.as_tag(), date])?;
    match rows.next()? {
        Some(row) => Ok(Some(base_from_row(row)?)),
        None => Ok(None),
    }
}

fn base_by_version_range(
    inner: &Inner,
    from: i64,
    to: i64,
    parity: Option<WeekParity>,
) -> Result<Vec<BaseSchedule>, ScheduleError> {
    let db = inner.db.lock().unwrap();
    let mut schedules = Vec::new();
    match parity {
        Some(parity) => {
            let mut stmt = db.prepare(&format!(
                "SELECT {BASE_COLUMNS} FROM base_schedules
                 WHERE ver_to >= ?1 AND ver_from <= ?2 AND week = ?3
                 ORDER BY ver_to DESC"
            ))?;
            let mut rows = stmt.query(params![from, to, parity.as_tag()])?;
            while let Some(row) = rows.next()? {
                schedules.push(base_from_row(row)?);
            }
        }
        None => {
            let mut stmt = db.prepare(&format!(
                "SELECT {BASE_COLUMNS} FROM base_schedules
                 WHERE ver_to >= ?1 AND ver_from <= ?2
                 ORDER BY ver_to DESC"
            ))?;
            let mut rows = stmt.query(params![from, to])?;
            while let Some(row) = rows.next()? {
                schedules.push(base_from_row(row)?);
            }
        }
    }
    Ok(schedules)
}

fn custom_by_id(inner: &Inner, uid: &str) -> Result<Option<CustomSchedule>, ScheduleError> {
    let db = inner.db.lock().unwrap();
    let mut stmt = db.prepare(&format!(
        "SELECT {CUSTOM_COLUMNS} FROM custom_schedules WHERE uid = ?1"
    ))?;
    let mut rows = stmt.query([uid])?;
    match rows.next()? {
        Some(row) => Ok(Some(custom_from_row(row)?)),
        None => Ok(None),
    }
}

fn custom_by_date(inner: &Inner, date: i64) -> Result<Option<CustomSchedule>, ScheduleError> {
    let db = inner.db.lock().unwrap();
    let mut stmt = db.prepare(&format!(
        "SELECT {CUSTOM_COLUMNS} FROM custom_schedules
         WHERE date = ?1 ORDER BY ver_to DESC LIMIT 1"
    ))?;
    let mut rows = stmt.query([date])?;
    match rows.next()? {
        Some(row) => Ok(Some(custom_from_row(row)?)),
        None => Ok(None),
    }
}

fn custom_by_date_range(
    inner: &Inner,
    from: i64,
    to: i64,
) -> Result<Vec<CustomSchedule>, ScheduleError> {
    let db = inner.db.lock().unwrap();
    let mut stmt = db.prepare(&format!(
        "SELECT {CUSTOM_COLUMNS} FROM custom_schedules
         WHERE date >= ?1 AND date <= ?2
         ORDER BY date ASC, ver_to DESC"
    ))?;
    let mut rows = stmt.query(params![from, to])?;
    let mut schedules = Vec::new();
    while let Some(row) = rows.next()? {
        schedules.push(custom_from_row(row)?);
    }
    Ok(schedules)
}

fn record_by_id<T: DeserializeOwned>(
    inner: &Inner,
    table: &str,
    uid: &str,
) -> Result<Option<T>, ScheduleError> {
    let db = inner.db.lock().unwrap();
    let mut stmt = db.prepare(&format!("SELECT data FROM {table} WHERE uid = ?1"))?;
    let mut rows = stmt.query([uid])?;
    match rows.next()? {
        Some(row) => {
            let data: String = row.get(0)?;
            Ok(Some(serde_json::from_str(&data)?))
        }
        None => Ok(None),
    }
}

fn class_by_id(
    inner: &Inner,
    class_uid: &str,
    schedule_uid: &str,
) -> Result<Option<ClassDetails>, ScheduleError> {
    if class_uid.is_empty() || schedule_uid.is_empty() {
        return Ok(None);
    }

    let classes = match base_by_id(inner, schedule_uid)? {
        Some(schedule) => schedule.classes,
        None => match custom_by_id(inner, schedule_uid)? {
            Some(schedule) => schedule.classes,
            None => return Ok(None),
        },
    };

    match classes.into_iter().find(|class| class.uid == class_uid) {
        Some(class) => Ok(Some(enrich_class(inner, &class)?)),
        None => Ok(None),
    }
}

/// Joins a class's references. The organization is a hard invariant: its
/// absence is corrupted state, not a soft null. Subject and teacher lookups
/// are soft; a present subject triggers a secondary lookup of its assigned
/// teacher, independent of the class's own teacher reference.
fn enrich_class(inner: &Inner, class: &Class) -> Result<ClassDetails, ScheduleError> {
    let organization: Organization = record_by_id(inner, "organizations", &class.organization_id)?
        .ok_or_else(|| ScheduleError::MissingJoin {
            entity: "organization",
            uid: class.organization_id.clone(),
            class_uid: class.uid.clone(),
        })?;

    let subject = match &class.subject_id {
        Some(subject_id) => match record_by_id::<Subject>(inner, "subjects", subject_id)? {
            Some(subject) => {
                let teacher = match subject.teacher_id.as_deref() {
                    Some(teacher_id) => record_by_id(inner, "employees", teacher_id)?,
                    None => None,
                };
                Some(SubjectDetails { subject, teacher })
            }
            None => None,
        },
        None => None,
    };

    let teacher = match &class.teacher_id {
        Some(teacher_id) => record_by_id(inner, "employees", teacher_id)?,
        None => None,
    };

    Ok(ClassDetails {
        uid: class.uid.clone(),
        schedule_id: class.schedule_id.clone(),
        organization,
        subject,
        teacher,
        office: class.office.clone(),
        location: class.location.clone(),
        time_range: class.time_range,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc, Weekday};
    use futures::StreamExt;

    fn millis(year: i32, month: u32, day: u32) -> i64 {
        Utc.with_ymd_and_hms(year, month, day, 12, 0, 0)
            .unwrap()
            .timestamp_millis()
    }

    fn storage() -> LocalStorage {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        LocalStorage::open_in_memory().unwrap()
    }

    fn base_schedule(uid: &str, from: i64, to: i64, week: WeekParity, day: Weekday) -> BaseSchedule {
        BaseSchedule {
            uid: uid.to_string(),
            date_version: TimeRange::new(from, to),
            week,
            day_of_week: day,
            classes: vec![],
        }
    }

    fn custom_schedule(uid: &str, date: i64, ver_to: i64) -> CustomSchedule {
        CustomSchedule {
            uid: uid.to_string(),
            date,
            date_version: TimeRange::new(date, ver_to),
            classes: vec![],
        }
    }

    fn sample_class(uid: &str, organization_id: &str) -> Class {
        Class {
            uid: uid.to_string(),
            schedule_id: String::new(),
            organization_id: organization_id.to_string(),
            subject_id: None,
            teacher_id: None,
            office: "201".to_string(),
            location: None,
            time_range: TimeRange::new(0, 1),
        }
    }

    async fn first<S: Stream>(stream: S) -> S::Item {
        Box::pin(stream).next().await.unwrap()
    }

    #[tokio::test]
    async fn test_add_assigns_uid_when_empty() {
        let storage = storage();
        let uid = storage
            .add_or_update_base(base_schedule("", 0, 100, WeekParity::Odd, Weekday::Mon))
            .unwrap();
        assert!(!uid.is_empty());

        let fetched = first(storage.fetch_base_by_id(&uid)).await.unwrap();
        assert_eq!(fetched.unwrap().uid, uid);
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent_per_uid() {
        let storage = storage();
        let mut schedule = base_schedule("sched-1", 0, 100, WeekParity::Odd, Weekday::Mon);
        storage.add_or_update_base(schedule.clone()).unwrap();

        schedule.week = WeekParity::Even;
        schedule.date_version = TimeRange::new(0, 200);
        storage.add_or_update_base(schedule).unwrap();

        let all = first(storage.fetch_base_by_version_range(0, 1_000, None))
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].week, WeekParity::Even);
        assert_eq!(all[0].date_version.to, 200);
    }

    #[tokio::test]
    async fn test_fetch_by_id_with_empty_uid_is_none() {
        let storage = storage();
        assert!(first(storage.fetch_base_by_id("")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_base_by_date_matches_weekday_and_parity() {
        let storage = storage();
        // Version range around January 2024; 2024-01-15 was a Monday.
        let from = millis(2023, 12, 25);
        let to = millis(2024, 1, 31);
        storage
            .add_or_update_base(base_schedule("sched-1", from, to, WeekParity::Odd, Weekday::Mon))
            .unwrap();

        let monday = millis(2024, 1, 15);
        let hit = first(storage.fetch_base_by_date(monday, WeekParity::Odd))
            .await
            .unwrap();
        assert_eq!(hit.unwrap().uid, "sched-1");

        let miss = first(storage.fetch_base_by_date(monday, WeekParity::Even))
            .await
            .unwrap();
        assert!(miss.is_none());

        // Outside the version range.
        let later_monday = millis(2024, 2, 5);
        let expired = first(storage.fetch_base_by_date(later_monday, WeekParity::Odd))
            .await
            .unwrap();
        assert!(expired.is_none());
    }

    #[tokio::test]
    async fn test_most_recent_version_wins() {
        let storage = storage();
        let monday = millis(2024, 1, 15);
        storage
            .add_or_update_base(base_schedule(
                "old",
                millis(2023, 9, 1),
                millis(2024, 1, 31),
                WeekParity::Odd,
                Weekday::Mon,
            ))
            .unwrap();
        storage
            .add_or_update_base(base_schedule(
                "new",
                millis(2024, 1, 1),
                millis(2024, 6, 30),
                WeekParity::Odd,
                Weekday::Mon,
            ))
            .unwrap();

        let hit = first(storage.fetch_base_by_date(monday, WeekParity::Odd))
            .await
            .unwrap();
        assert_eq!(hit.unwrap().uid, "new");
    }

    #[tokio::test]
    async fn test_version_range_overlap_boundaries() {
        let storage = storage();
        storage
            .add_or_update_base(base_schedule("sched-1", 100, 200, WeekParity::Odd, Weekday::Mon))
            .unwrap();

        // Overlap iff ver_to >= from && ver_from <= to.
        for (from, to, expected) in [
            (150i64, 160i64, 1usize),
            (0, 100, 1),
            (200, 300, 1),
            (0, 99, 0),
            (201, 300, 0),
        ] {
            let matches = first(storage.fetch_base_by_version_range(from, to, None))
                .await
                .unwrap();
            assert_eq!(matches.len(), expected, "window [{from}, {to}]");
        }

        let wrong_parity =
            first(storage.fetch_base_by_version_range(0, 300, Some(WeekParity::Even)))
                .await
                .unwrap();
        assert!(wrong_parity.is_empty());
    }

    #[tokio::test]
    async fn test_stream_reemits_after_mutation() {
        let storage = storage();
        let mut stream = Box::pin(storage.fetch_base_by_id("sched-1"));
        assert!(stream.next().await.unwrap().unwrap().is_none());

        storage
            .add_or_update_base(base_schedule("sched-1", 0, 100, WeekParity::Odd, Weekday::Mon))
            .unwrap();
        let updated = stream.next().await.unwrap().unwrap();
        assert_eq!(updated.unwrap().uid, "sched-1");
    }

    #[tokio::test]
    async fn test_custom_by_date_picks_latest_override() {
        let storage = storage();
        let date = millis(2024, 3, 8);
        storage
            .add_or_update_custom(custom_schedule("v1", date, millis(2024, 3, 1)))
            .unwrap();
        storage
            .add_or_update_custom(custom_schedule("v2", date, millis(2024, 3, 7)))
            .unwrap();

        let hit = first(storage.fetch_custom_by_date(date)).await.unwrap();
        assert_eq!(hit.unwrap().uid, "v2");

        let miss = first(storage.fetch_custom_by_date(millis(2024, 3, 9)))
            .await
            .unwrap();
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn test_custom_delete_by_time_range_sweeps_window() {
        let storage = storage();
        for day in [1u32, 5, 10, 20] {
            let date = millis(2024, 4, day);
            storage
                .add_or_update_custom(custom_schedule(&format!("d{day}"), date, date))
                .unwrap();
        }

        let removed = storage
            .delete_custom_by_time_range(millis(2024, 4, 2), millis(2024, 4, 15))
            .unwrap();
        assert_eq!(removed, 2);

        let remaining = first(
            storage.fetch_custom_by_date_range(millis(2024, 4, 1), millis(2024, 4, 30)),
        )
        .await
        .unwrap();
        let uids: Vec<&str> = remaining.iter().map(|s| s.uid.as_str()).collect();
        assert_eq!(uids, vec!["d1", "d20"]);
    }

    #[tokio::test]
    async fn test_group_upsert_persists_all_members() {
        let storage = storage();
        let uids = storage
            .add_or_update_custom_group(vec![
                custom_schedule("", millis(2024, 5, 1), millis(2024, 5, 1)),
                custom_schedule("", millis(2024, 5, 2), millis(2024, 5, 2)),
                custom_schedule("", millis(2024, 5, 3), millis(2024, 5, 3)),
            ])
            .unwrap();
        assert_eq!(uids.len(), 3);
        assert!(uids.iter().all(|uid| !uid.is_empty()));

        let stored = first(
            storage.fetch_custom_by_date_range(millis(2024, 5, 1), millis(2024, 5, 31)),
        )
        .await
        .unwrap();
        assert_eq!(stored.len(), 3);
    }

    #[tokio::test]
    async fn test_delete_custom_by_id() {
        let storage = storage();
        let date = millis(2024, 6, 1);
        storage
            .add_or_update_custom(custom_schedule("gone", date, date))
            .unwrap();
        assert!(storage.delete_custom_by_id("gone").unwrap());
        assert!(!storage.delete_custom_by_id("gone").unwrap());
    }

    #[tokio::test]
    async fn test_class_enrichment_joins_all_references() {
        let storage = storage();
        storage
            .put_organization(Organization {
                uid: "org1".to_string(),
                short_name: "TSU".to_string(),
                full_name: None,
                avatar: None,
            })
            .unwrap();
        storage
            .put_employee(Employee {
                uid: "emp-assigned".to_string(),
                organization_id: "org1".to_string(),
                first_name: "Vera".to_string(),
                second_name: None,
                post: Some("lecturer".to_string()),
            })
            .unwrap();
        storage
            .put_employee(Employee {
                uid: "emp-override".to_string(),
                organization_id: "org1".to_string(),
                first_name: "Pavel".to_string(),
                second_name: None,
                post: None,
            })
            .unwrap();
        storage
            .put_subject(Subject {
                uid: "sub1".to_string(),
                organization_id: "org1".to_string(),
                name: "Mathematics".to_string(),
                teacher_id: Some("emp-assigned".to_string()),
            })
            .unwrap();

        let mut class = sample_class("class-1", "org1");
        class.subject_id = Some("sub1".to_string());
        class.teacher_id = Some("emp-override".to_string());
        let mut schedule = base_schedule("sched-1", 0, 100, WeekParity::Odd, Weekday::Mon);
        schedule.classes = vec![class];
        storage.add_or_update_base(schedule).unwrap();

        let details = first(storage.fetch_class_by_id("class-1", "sched-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(details.organization.short_name, "TSU");
        let subject = details.subject.unwrap();
        assert_eq!(subject.subject.name, "Mathematics");
        assert_eq!(subject.teacher.unwrap().uid, "emp-assigned");
        assert_eq!(details.teacher.unwrap().uid, "emp-override");
    }

    #[tokio::test]
    async fn test_missing_organization_is_fatal() {
        let storage = storage();
        let mut schedule = base_schedule("sched-1", 0, 100, WeekParity::Odd, Weekday::Mon);
        schedule.classes = vec![sample_class("class-1", "missing-org")];
        storage.add_or_update_base(schedule).unwrap();

        let result = first(storage.fetch_class_by_id("class-1", "sched-1")).await;
        let error = result.unwrap_err();
        assert!(error.is_invariant_violation());
        assert!(matches!(
            error,
            ScheduleError::MissingJoin { entity: "organization", .. }
        ));
    }

    #[tokio::test]
    async fn test_missing_subject_is_soft() {
        let storage = storage();
        storage
            .put_organization(Organization {
                uid: "org1".to_string(),
                short_name: "TSU".to_string(),
                full_name: None,
                avatar: None,
            })
            .unwrap();

        let mut class = sample_class("class-1", "org1");
        class.subject_id = Some("missing-subject".to_string());
        let mut schedule = base_schedule("sched-1", 0, 100, WeekParity::Odd, Weekday::Mon);
        schedule.classes = vec![class];
        storage.add_or_update_base(schedule).unwrap();

        let details = first(storage.fetch_class_by_id("class-1", "sched-1"))
            .await
            .unwrap()
            .unwrap();
        assert!(details.subject.is_none());
    }

    #[tokio::test]
    async fn test_class_lookup_in_custom_schedule() {
        let storage = storage();
        storage
            .put_organization(Organization {
                uid: "org1".to_string(),
                short_name: "TSU".to_string(),
                full_name: None,
                avatar: None,
            })
            .unwrap();

        let date = millis(2024, 9, 2);
        let mut schedule = custom_schedule("day-off-makeup", date, date);
        schedule.classes = vec![sample_class("class-9", "org1")];
        storage.add_or_update_custom(schedule).unwrap();

        let details = first(storage.fetch_class_by_id("class-9", "day-off-makeup"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(details.schedule_id, "day-off-makeup");
    }
}
