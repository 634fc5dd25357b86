//! Directory records joined into class details at read time.

use serde::{Deserialize, Serialize};

/// A school/university/section the student attends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    #[serde(default)]
    pub uid: String,
    pub short_name: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

/// A taught subject. `teacher_id` is the subject's assigned teacher, which a
/// class may override with its own teacher reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    #[serde(default)]
    pub uid: String,
    pub organization_id: String,
    pub name: String,
    #[serde(default)]
    pub teacher_id: Option<String>,
}

/// A teacher or other employee of an organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    #[serde(default)]
    pub uid: String,
    pub organization_id: String,
    pub first_name: String,
    #[serde(default)]
    pub second_name: Option<String>,
    #[serde(default)]
    pub post: Option<String>,
}
