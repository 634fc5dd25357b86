//! Remote schedule source over the backend document store.
//!
//! Mirrors the local source's operations: the same selection rules are
//! expressed as serialized query operations evaluated server-side, and fetch
//! streams re-emit when a realtime event lands on the watched collections.
//! Every mutation publishes a realtime event so sibling fetch streams in the
//! same process converge without a round trip to the server.

use super::error::ScheduleError;
use super::types::{
    parse_weekday_tag, weekday_of_millis, weekday_tag, BaseSchedule, Class, ClassDetails,
    CustomSchedule, SubjectDetails, TimeRange, WeekParity,
};
use crate::api::{ApiClient, ApiError, DocumentList, RemoteErrorKind};
use crate::directory::{Employee, Organization, Subject};
use crate::permission::{Permission, Role};
use crate::query::Query;
use crate::realtime::{Channel, RealtimeEvent, RealtimeHub};
use crate::watch::observe;
use chrono::Weekday;
use futures::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

const DATABASE_ID: &str = "main";
const BASE_COLLECTION: &str = "baseSchedules";
const CUSTOM_COLLECTION: &str = "customSchedules";
const ORGANIZATIONS_COLLECTION: &str = "organizations";
const SUBJECTS_COLLECTION: &str = "subjects";
const EMPLOYEES_COLLECTION: &str = "employees";

/// Wire form of a base schedule document. Version endpoints are flattened to
/// scalar attributes so the query operators can filter on them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BaseScheduleDocument {
    #[serde(rename = "$id", default, skip_serializing)]
    id: String,
    target_user: String,
    date_version_from: i64,
    date_version_to: i64,
    week: String,
    day_of_week: String,
    #[serde(default)]
    classes: Vec<Class>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CustomScheduleDocument {
    #[serde(rename = "$id", default, skip_serializing)]
    id: String,
    target_user: String,
    date: i64,
    date_version_from: i64,
    date_version_to: i64,
    #[serde(default)]
    classes: Vec<Class>,
}

impl BaseScheduleDocument {
    fn from_domain(schedule: &BaseSchedule, target_user: &str) -> Self {
        Self {
            id: schedule.uid.clone(),
            target_user: target_user.to_string(),
            date_version_from: schedule.date_version.from,
            date_version_to: schedule.date_version.to,
            week: schedule.week.as_tag().to_string(),
            day_of_week: weekday_tag(schedule.day_of_week).to_string(),
            classes: schedule.classes.clone(),
        }
    }

    fn into_domain(self) -> Result<BaseSchedule, ScheduleError> {
        let week = WeekParity::from_tag(&self.week).ok_or_else(|| ScheduleError::Corrupt {
            message: format!("unknown week parity tag: {}", self.week),
        })?;
        let day_of_week =
            parse_weekday_tag(&self.day_of_week).ok_or_else(|| ScheduleError::Corrupt {
                message: format!("unknown weekday tag: {}", self.day_of_week),
            })?;
        Ok(BaseSchedule {
            uid: self.id,
            date_version: TimeRange::new(self.date_version_from, self.date_version_to),
            week,
            day_of_week,
            classes: self.classes,
        })
    }
}

impl CustomScheduleDocument {
    fn from_domain(schedule: &CustomSchedule, target_user: &str) -> Self {
        Self {
            id: schedule.uid.clone(),
            target_user: target_user.to_string(),
            date: schedule.date,
            date_version_from: schedule.date_version.from,
            date_version_to: schedule.date_version.to,
            classes: schedule.classes.clone(),
        }
    }

    fn into_domain(self) -> CustomSchedule {
        CustomSchedule {
            uid: self.id,
            date: self.date,
            date_version: TimeRange::new(self.date_version_from, self.date_version_to),
            classes: self.classes,
        }
    }
}

/// Directory documents reuse the domain field names; only the ID attribute
/// differs on the wire.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrganizationDocument {
    #[serde(rename = "$id", default)]
    id: String,
    short_name: String,
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    avatar: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubjectDocument {
    #[serde(rename = "$id", default)]
    id: String,
    organization_id: String,
    name: String,
    #[serde(default)]
    teacher_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmployeeDocument {
    #[serde(rename = "$id", default)]
    id: String,
    organization_id: String,
    first_name: String,
    #[serde(default)]
    second_name: Option<String>,
    #[serde(default)]
    post: Option<String>,
}

impl From<OrganizationDocument> for Organization {
    fn from(doc: OrganizationDocument) -> Self {
        Organization {
            uid: doc.id,
            short_name: doc.short_name,
            full_name: doc.full_name,
            avatar: doc.avatar,
        }
    }
}

impl From<SubjectDocument> for Subject {
    fn from(doc: SubjectDocument) -> Self {
        Subject {
            uid: doc.id,
            organization_id: doc.organization_id,
            name: doc.name,
            teacher_id: doc.teacher_id,
        }
    }
}

impl From<EmployeeDocument> for Employee {
    fn from(doc: EmployeeDocument) -> Self {
        Employee {
            uid: doc.id,
            organization_id: doc.organization_id,
            first_name: doc.first_name,
            second_name: doc.second_name,
            post: doc.post,
        }
    }
}

/// Owner-scoped document permissions for user-created schedules.
fn user_permissions(user: &str) -> Vec<String> {
    let role = Role::user(user);
    vec![
        Permission::read(&role),
        Permission::update(&role),
        Permission::delete(&role),
    ]
}

fn base_by_date_queries(user: &str, date: i64, weekday: Weekday, parity: WeekParity) -> Vec<String> {
    vec![
        Query::equal("targetUser", user),
        Query::equal("dayOfWeek", weekday_tag(weekday)),
        Query::equal("week", parity.as_tag()),
        Query::greater_than_equal("dateVersionTo", date),
        Query::less_than_equal("dateVersionFrom", date),
        Query::order_desc("dateVersionTo"),
        Query::limit(1),
    ]
}

fn base_by_range_queries(
    user: &str,
    from: i64,
    to: i64,
    parity: Option<WeekParity>,
) -> Vec<String> {
    let mut queries = vec![
        Query::equal("targetUser", user),
        Query::greater_than_equal("dateVersionTo", from),
        Query::less_than_equal("dateVersionFrom", to),
    ];
    if let Some(parity) = parity {
        queries.push(Query::equal("week", parity.as_tag()));
    }
    queries.push(Query::order_desc("dateVersionTo"));
    queries
}

fn custom_by_date_queries(user: &str, date: i64) -> Vec<String> {
    vec![
        Query::equal("targetUser", user),
        Query::equal("date", date),
        Query::order_desc("dateVersionTo"),
        Query::limit(1),
    ]
}

fn custom_by_range_queries(user: &str, from: i64, to: i64) -> Vec<String> {
    vec![
        Query::equal("targetUser", user),
        Query::between("date", from, to),
        Query::order_asc("date"),
    ]
}

fn assign_uids(uid: &mut String, classes: &mut [Class]) {
    if uid.is_empty() {
        *uid = Uuid::new_v4().to_string();
    }
    for class in classes {
        if class.uid.is_empty() {
            class.uid = Uuid::new_v4().to_string();
        }
        class.schedule_id = uid.clone();
    }
}

fn document_data<T: Serialize>(document: &T) -> Result<Map<String, Value>, ScheduleError> {
    match serde_json::to_value(document)? {
        Value::Object(map) => Ok(map),
        other => Err(ScheduleError::Corrupt {
            message: format!("document did not serialize to an object: {other}"),
        }),
    }
}

async fn get_document_opt<T: DeserializeOwned>(
    client: &ApiClient,
    collection_id: &str,
    document_id: &str,
) -> Result<Option<T>, ScheduleError> {
    match client
        .get_document(DATABASE_ID, collection_id, document_id)
        .await
    {
        Ok(document) => Ok(Some(document)),
        Err(ApiError::Remote {
            kind: RemoteErrorKind::NotFound,
            ..
        }) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Remote schedule source scoped to one target user.
#[derive(Clone)]
pub struct RemoteScheduleSource {
    client: Arc<ApiClient>,
    hub: Arc<RealtimeHub>,
    target_user: String,
}

impl RemoteScheduleSource {
    pub fn new(client: Arc<ApiClient>, hub: Arc<RealtimeHub>, target_user: impl Into<String>) -> Self {
        Self {
            client,
            hub,
            target_user: target_user.into(),
        }
    }

    fn require_user(&self) -> Result<&str, ScheduleError> {
        if self.target_user.is_empty() {
            return Err(ScheduleError::EmptyUser);
        }
        Ok(&self.target_user)
    }

    fn collection_trigger(&self, collection_ids: &[&str]) -> impl Stream<Item = ()> {
        let patterns = collection_ids
            .iter()
            .map(|collection_id| Channel::documents(DATABASE_ID, collection_id))
            .collect();
        self.hub.subscribe(patterns).map(|_| ())
    }

    fn publish_document_event(
        &self,
        collection_id: &str,
        document_id: &str,
        event: &str,
        payload: Value,
    ) {
        self.hub.publish(RealtimeEvent {
            channels: vec![
                Channel::documents(DATABASE_ID, collection_id),
                Channel::document_event(DATABASE_ID, collection_id, document_id, event),
            ],
            payload,
        });
    }

    // ---- base schedules ----

    pub async fn add_or_update_base(
        &self,
        mut schedule: BaseSchedule,
    ) -> Result<String, ScheduleError> {
        let user = self.require_user()?.to_string();
        assign_uids(&mut schedule.uid, &mut schedule.classes);
        let document = BaseScheduleDocument::from_domain(&schedule, &user);
        let stored: Value = self
            .client
            .upsert_document(
                DATABASE_ID,
                BASE_COLLECTION,
                &schedule.uid,
                document_data(&document)?,
                user_permissions(&user),
            )
            .await?;
        debug!(uid = %schedule.uid, "Upserted base schedule");
        self.publish_document_event(BASE_COLLECTION, &schedule.uid, "update", stored);
        Ok(schedule.uid)
    }

    pub fn fetch_base_by_id(
        &self,
        uid: &str,
    ) -> impl Stream<Item = Result<Option<BaseSchedule>, ScheduleError>> {
        let client = Arc::clone(&self.client);
        let uid = uid.to_string();
        observe(self.collection_trigger(&[BASE_COLLECTION]), move || {
            let client = Arc::clone(&client);
            let uid = uid.clone();
            async move {
                if uid.is_empty() {
                    return Ok(None);
                }
                match get_document_opt::<BaseScheduleDocument>(&client, BASE_COLLECTION, &uid)
                    .await?
                {
                    Some(document) => Ok(Some(document.into_domain()?)),
                    None => Ok(None),
                }
            }
        })
    }

    /// The base schedule in effect on `date` for the given parity, resolved
    /// server-side with the same weekday/parity/version-window selection as
    /// local storage.
    pub fn fetch_base_by_date(
        &self,
        date: i64,
        parity: WeekParity,
    ) -> impl Stream<Item = Result<Option<BaseSchedule>, ScheduleError>> {
        let client = Arc::clone(&self.client);
        let user = self.target_user.clone();
        observe(self.collection_trigger(&[BASE_COLLECTION]), move || {
            let client = Arc::clone(&client);
            let user = user.clone();
            async move {
                if user.is_empty() {
                    return Err(ScheduleError::EmptyUser);
                }
                let weekday =
                    weekday_of_millis(date).ok_or(ScheduleError::InvalidDate { millis: date })?;
                let list: DocumentList<BaseScheduleDocument> = client
                    .list_documents(
                        DATABASE_ID,
                        BASE_COLLECTION,
                        base_by_date_queries(&user, date, weekday, parity),
                    )
                    .await?;
                match list.documents.into_iter().next() {
                    Some(document) => Ok(Some(document.into_domain()?)),
                    None => Ok(None),
                }
            }
        })
    }

    pub fn fetch_base_by_version_range(
        &self,
        from: i64,
        to: i64,
        parity: Option<WeekParity>,
    ) -> impl Stream<Item = Result<Vec<BaseSchedule>, ScheduleError>> {
        let client = Arc::clone(&self.client);
        let user = self.target_user.clone();
        observe(self.collection_trigger(&[BASE_COLLECTION]), move || {
            let client = Arc::clone(&client);
            let user = user.clone();
            async move {
                if user.is_empty() {
                    return Err(ScheduleError::EmptyUser);
                }
                let list: DocumentList<BaseScheduleDocument> = client
                    .list_documents(
                        DATABASE_ID,
                        BASE_COLLECTION,
                        base_by_range_queries(&user, from, to, parity),
                    )
                    .await?;
                list.documents
                    .into_iter()
                    .map(BaseScheduleDocument::into_domain)
                    .collect()
            }
        })
    }

    // ---- custom schedules ----

    pub async fn add_or_update_custom(
        &self,
        mut schedule: CustomSchedule,
    ) -> Result<String, ScheduleError> {
        let user = self.require_user()?.to_string();
        assign_uids(&mut schedule.uid, &mut schedule.classes);
        let document = CustomScheduleDocument::from_domain(&schedule, &user);
        let stored: Value = self
            .client
            .upsert_document(
                DATABASE_ID,
                CUSTOM_COLLECTION,
                &schedule.uid,
                document_data(&document)?,
                user_permissions(&user),
            )
            .await?;
        debug!(uid = %schedule.uid, date = schedule.date, "Upserted custom schedule");
        self.publish_document_event(CUSTOM_COLLECTION, &schedule.uid, "update", stored);
        Ok(schedule.uid)
    }

    /// Sequential fail-fast upsert. Unlike local storage there is no
    /// transaction to lean on; a mid-group failure leaves the already-sent
    /// members in place and surfaces the error.
    pub async fn add_or_update_custom_group(
        &self,
        schedules: Vec<CustomSchedule>,
    ) -> Result<Vec<String>, ScheduleError> {
        let mut uids = Vec::with_capacity(schedules.len());
        for schedule in schedules {
            uids.push(self.add_or_update_custom(schedule).await?);
        }
        Ok(uids)
    }

    pub fn fetch_custom_by_id(
        &self,
        uid: &str,
    ) -> impl Stream<Item = Result<Option<CustomSchedule>, ScheduleError>> {
        let client = Arc::clone(&self.client);
        let uid = uid.to_string();
        observe(self.collection_trigger(&[CUSTOM_COLLECTION]), move || {
            let client = Arc::clone(&client);
            let uid = uid.clone();
            async move {
                if uid.is_empty() {
                    return Ok(None);
                }
                Ok(
                    get_document_opt::<CustomScheduleDocument>(&client, CUSTOM_COLLECTION, &uid)
                        .await?
                        .map(CustomScheduleDocument::into_domain),
                )
            }
        })
    }

    pub fn fetch_custom_by_date(
        &self,
        date: i64,
    ) -> impl Stream<Item = Result<Option<CustomSchedule>, ScheduleError>> {
        let client = Arc::clone(&self.client);
        let user = self.target_user.clone();
        observe(self.collection_trigger(&[CUSTOM_COLLECTION]), move || {
            let client = Arc::clone(&client);
            let user = user.clone();
            async move {
                if user.is_empty() {
                    return Err(ScheduleError::EmptyUser);
                }
                let list: DocumentList<CustomScheduleDocument> = client
                    .list_documents(
                        DATABASE_ID,
                        CUSTOM_COLLECTION,
                        custom_by_date_queries(&user, date),
                    )
                    .await?;
                Ok(list
                    .documents
                    .into_iter()
                    .next()
                    .map(CustomScheduleDocument::into_domain))
            }
        })
    }

    pub fn fetch_custom_by_date_range(
        &self,
        from: i64,
        to: i64,
    ) -> impl Stream<Item = Result<Vec<CustomSchedule>, ScheduleError>> {
        let client = Arc::clone(&self.client);
        let user = self.target_user.clone();
        observe(self.collection_trigger(&[CUSTOM_COLLECTION]), move || {
            let client = Arc::clone(&client);
            let user = user.clone();
            async move {
                if user.is_empty() {
                    return Err(ScheduleError::EmptyUser);
                }
                let list: DocumentList<CustomScheduleDocument> = client
                    .list_documents(
                        DATABASE_ID,
                        CUSTOM_COLLECTION,
                        custom_by_range_queries(&user, from, to),
                    )
                    .await?;
                Ok(list
                    .documents
                    .into_iter()
                    .map(CustomScheduleDocument::into_domain)
                    .collect())
            }
        })
    }

    /// Deletes one override; a document already gone counts as not removed.
    pub async fn delete_custom_by_id(&self, uid: &str) -> Result<bool, ScheduleError> {
        self.require_user()?;
        match self
            .client
            .delete_document(DATABASE_ID, CUSTOM_COLLECTION, uid)
            .await
        {
            Ok(()) => {
                self.publish_document_event(CUSTOM_COLLECTION, uid, "delete", Value::Null);
                Ok(true)
            }
            Err(ApiError::Remote {
                kind: RemoteErrorKind::NotFound,
                ..
            }) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    /// Sweep-delete of every override pinned within `[from, to]`: lists the
    /// matching IDs, then deletes them one by one, fail-fast.
    pub async fn delete_custom_by_time_range(
        &self,
        from: i64,
        to: i64,
    ) -> Result<usize, ScheduleError> {
        let user = self.require_user()?.to_string();
        let list: DocumentList<CustomScheduleDocument> = self
            .client
            .list_documents(
                DATABASE_ID,
                CUSTOM_COLLECTION,
                custom_by_range_queries(&user, from, to),
            )
            .await?;
        let mut removed = 0;
        for document in &list.documents {
            self.client
                .delete_document(DATABASE_ID, CUSTOM_COLLECTION, &document.id)
                .await?;
            self.publish_document_event(CUSTOM_COLLECTION, &document.id, "delete", Value::Null);
            removed += 1;
        }
        debug!(from, to, removed, "Deleted custom schedules in window");
        Ok(removed)
    }

    // ---- class enrichment ----

    /// Loads the parent schedule (base first, then custom) and joins the
    /// class's directory references with the same rules as local storage:
    /// organization required, subject and teacher soft.
    pub fn fetch_class_by_id(
        &self,
        class_uid: &str,
        schedule_uid: &str,
    ) -> impl Stream<Item = Result<Option<ClassDetails>, ScheduleError>> {
        let client = Arc::clone(&self.client);
        let class_uid = class_uid.to_string();
        let schedule_uid = schedule_uid.to_string();
        let trigger = self.collection_trigger(&[
            BASE_COLLECTION,
            CUSTOM_COLLECTION,
            ORGANIZATIONS_COLLECTION,
            SUBJECTS_COLLECTION,
            EMPLOYEES_COLLECTION,
        ]);
        observe(trigger, move || {
            let client = Arc::clone(&client);
            let class_uid = class_uid.clone();
            let schedule_uid = schedule_uid.clone();
            async move { class_by_id(&client, &class_uid, &schedule_uid).await }
        })
    }
}

async fn schedule_classes(
    client: &ApiClient,
    schedule_uid: &str,
) -> Result<Option<Vec<Class>>, ScheduleError> {
    if let Some(document) =
        get_document_opt::<BaseScheduleDocument>(client, BASE_COLLECTION, schedule_uid).await?
    {
        return Ok(Some(document.into_domain()?.classes));
    }
    Ok(
        get_document_opt::<CustomScheduleDocument>(client, CUSTOM_COLLECTION, schedule_uid)
            .await?
            .map(|document| document.into_domain().classes),
    )
}

async fn class_by_id(
    client: &ApiClient,
    class_uid: &str,
    schedule_uid: &str,
) -> Result<Option<ClassDetails>, ScheduleError> {
    if class_uid.is_empty() || schedule_uid.is_empty() {
        return Ok(None);
    }
    let classes = match schedule_classes(client, schedule_uid).await? {
        Some(classes) => classes,
        None => return Ok(None),
    };
    match classes.into_iter().find(|class| class.uid == class_uid) {
        Some(class) => Ok(Some(enrich_class(client, &class).await?)),
        None => Ok(None),
    }
}

async fn enrich_class(client: &ApiClient, class: &Class) -> Result<ClassDetails, ScheduleError> {
    let organization: Organization = get_document_opt::<OrganizationDocument>(
        client,
        ORGANIZATIONS_COLLECTION,
        &class.organization_id,
    )
    .await?
    .map(Into::into)
    .ok_or_else(|| ScheduleError::MissingJoin {
        entity: "organization",
        uid: class.organization_id.clone(),
        class_uid: class.uid.clone(),
    })?;

    let subject = match &class.subject_id {
        Some(subject_id) => {
            match get_document_opt::<SubjectDocument>(client, SUBJECTS_COLLECTION, subject_id)
                .await?
                .map(Subject::from)
            {
                Some(subject) => {
                    let teacher = match subject.teacher_id.as_deref() {
                        Some(teacher_id) => {
                            get_document_opt::<EmployeeDocument>(
                                client,
                                EMPLOYEES_COLLECTION,
                                teacher_id,
                            )
                            .await?
                            .map(Employee::from)
                        }
                        None => None,
                    };
                    Some(SubjectDetails { subject, teacher })
                }
                None => None,
            }
        }
        None => None,
    };

    let teacher = match &class.teacher_id {
        Some(teacher_id) => {
            get_document_opt::<EmployeeDocument>(client, EMPLOYEES_COLLECTION, teacher_id)
                .await?
                .map(Employee::from)
        }
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
    use crate::api::ApiConfig;
    use futures::StreamExt;
    use serde_json::json;

    fn source(target_user: &str) -> RemoteScheduleSource {
        let client = ApiClient::new(ApiConfig::new(
            "https://backend.example.com/v1",
            "study-assistant",
        ))
        .unwrap();
        RemoteScheduleSource::new(Arc::new(client), Arc::new(RealtimeHub::new()), target_user)
    }

    fn parsed(queries: &[String]) -> Vec<Query> {
        queries.iter().map(|q| Query::parse(q).unwrap()).collect()
    }

    #[test]
    fn test_base_by_date_query_shape() {
        let queries = parsed(&base_by_date_queries("u1", 1_000, Weekday::Mon, WeekParity::Odd));
        let methods: Vec<&str> = queries.iter().map(|q| q.method.as_str()).collect();
        assert_eq!(
            methods,
            vec![
                "equal",
                "equal",
                "equal",
                "greaterThanEqual",
                "lessThanEqual",
                "orderDesc",
                "limit"
            ]
        );
        assert_eq!(queries[0].attribute.as_deref(), Some("targetUser"));
        assert_eq!(queries[0].values, Some(vec![json!("u1")]));
        assert_eq!(queries[1].values, Some(vec![json!("monday")]));
        assert_eq!(queries[2].values, Some(vec![json!("odd")]));
        assert_eq!(queries[3].attribute.as_deref(), Some("dateVersionTo"));
        assert_eq!(queries[3].values, Some(vec![json!(1_000)]));
        assert_eq!(queries[4].attribute.as_deref(), Some("dateVersionFrom"));
        assert_eq!(queries[5].attribute.as_deref(), Some("dateVersionTo"));
        assert_eq!(queries[6].values, Some(vec![json!(1)]));
    }

    #[test]
    fn test_base_range_query_parity_is_optional() {
        let without = parsed(&base_by_range_queries("u1", 0, 100, None));
        assert!(without.iter().all(|q| {
            q.values != Some(vec![json!("even")]) && q.values != Some(vec![json!("odd")])
        }));

        let with = parsed(&base_by_range_queries("u1", 0, 100, Some(WeekParity::Even)));
        assert!(with
            .iter()
            .any(|q| q.attribute.as_deref() == Some("week")
                && q.values == Some(vec![json!("even")])));
    }

    #[test]
    fn test_custom_range_uses_between() {
        let queries = parsed(&custom_by_range_queries("u1", 10, 20));
        let between = queries.iter().find(|q| q.method == "between").unwrap();
        assert_eq!(between.attribute.as_deref(), Some("date"));
        assert_eq!(between.values, Some(vec![json!(10), json!(20)]));
    }

    #[test]
    fn test_owner_permissions() {
        assert_eq!(
            user_permissions("u1"),
            vec![
                r#"read("user:u1")"#,
                r#"update("user:u1")"#,
                r#"delete("user:u1")"#
            ]
        );
    }

    #[test]
    fn test_base_document_round_trip() {
        let schedule = BaseSchedule {
            uid: "s1".to_string(),
            date_version: TimeRange::new(10, 20),
            week: WeekParity::Even,
            day_of_week: Weekday::Fri,
            classes: vec![],
        };
        let document = BaseScheduleDocument::from_domain(&schedule, "u1");
        assert_eq!(document.week, "even");
        assert_eq!(document.day_of_week, "friday");
        assert_eq!(document.into_domain().unwrap(), schedule);
    }

    #[test]
    fn test_document_data_omits_id() {
        let schedule = BaseSchedule {
            uid: "s1".to_string(),
            date_version: TimeRange::new(10, 20),
            week: WeekParity::Odd,
            day_of_week: Weekday::Mon,
            classes: vec![],
        };
        let data = document_data(&BaseScheduleDocument::from_domain(&schedule, "u1")).unwrap();
        assert!(!data.contains_key("$id"));
        assert_eq!(data["targetUser"], json!("u1"));
        assert_eq!(data["dateVersionFrom"], json!(10));
    }

    #[test]
    fn test_corrupt_tag_is_rejected() {
        let document = BaseScheduleDocument {
            id: "s1".to_string(),
            target_user: "u1".to_string(),
            date_version_from: 0,
            date_version_to: 1,
            week: "thirds".to_string(),
            day_of_week: "monday".to_string(),
            classes: vec![],
        };
        let error = document.into_domain().unwrap_err();
        assert!(error.is_invariant_violation());
    }

    #[tokio::test]
    async fn test_empty_user_fails_before_any_network() {
        let source = source("");
        let result = Box::pin(source.fetch_base_by_date(1_000, WeekParity::Odd))
            .next()
            .await
            .unwrap();
        assert!(matches!(result, Err(ScheduleError::EmptyUser)));

        let upsert = source
            .add_or_update_custom(CustomSchedule {
                uid: String::new(),
                date: 0,
                date_version: TimeRange::new(0, 0),
                classes: vec![],
            })
            .await;
        assert!(matches!(upsert, Err(ScheduleError::EmptyUser)));
    }

    #[tokio::test]
    async fn test_empty_uid_fetch_is_none() {
        let source = source("u1");
        let result = Box::pin(source.fetch_base_by_id("")).next().await.unwrap();
        assert!(result.unwrap().is_none());
    }
}
