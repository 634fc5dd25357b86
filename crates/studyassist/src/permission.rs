//! Permission and role string templates for the backend's access-control
//! evaluator.
//!
//! These are opaque tokens on the wire; the exact string formats must be
//! preserved byte for byte.

/// Builders for permission strings such as `read("user:u1")`.
pub struct Permission;

impl Permission {
    pub fn read(role: impl AsRef<str>) -> String {
        format!("read(\"{}\")", role.as_ref())
    }

    pub fn write(role: impl AsRef<str>) -> String {
        format!("write(\"{}\")", role.as_ref())
    }

    pub fn create(role: impl AsRef<str>) -> String {
        format!("create(\"{}\")", role.as_ref())
    }

    pub fn update(role: impl AsRef<str>) -> String {
        format!("update(\"{}\")", role.as_ref())
    }

    pub fn delete(role: impl AsRef<str>) -> String {
        format!("delete(\"{}\")", role.as_ref())
    }
}

/// Builders for role strings such as `user:<id>` or `team:<id>/<role>`.
pub struct Role;

impl Role {
    pub fn any() -> String {
        "any".to_string()
    }

    pub fn guests() -> String {
        "guests".to_string()
    }

    pub fn users() -> String {
        "users".to_string()
    }

    pub fn users_with_status(status: &str) -> String {
        format!("users/{status}")
    }

    pub fn user(id: &str) -> String {
        format!("user:{id}")
    }

    pub fn user_with_status(id: &str, status: &str) -> String {
        format!("user:{id}/{status}")
    }

    pub fn team(id: &str) -> String {
        format!("team:{id}")
    }

    pub fn team_with_role(id: &str, role: &str) -> String {
        format!("team:{id}/{role}")
    }

    pub fn member(id: &str) -> String {
        format!("member:{id}")
    }

    pub fn label(name: &str) -> String {
        format!("label:{name}")
    }
}
