//! Client configuration and session header derivation.

use std::collections::BTreeMap;

const DEFAULT_USER_AGENT: &str = concat!("StudyAssistant/", env!("CARGO_PKG_VERSION"));

/// Immutable configuration for the backend client.
///
/// The transport factory compares configurations by value: any field change
/// yields a fresh transport, an unchanged configuration reuses the cached
/// one. There is no dirty flag to forget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub endpoint: String,
    pub project: String,
    pub key: Option<String>,
    pub jwt: Option<String>,
    pub locale: Option<String>,
    pub session: Option<String>,
    pub user_agent: String,
}

impl ApiConfig {
    pub fn new(endpoint: impl Into<String>, project: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            project: project.into(),
            key: None,
            jwt: None,
            locale: None,
            session: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_jwt(mut self, jwt: impl Into<String>) -> Self {
        self.jwt = Some(jwt.into());
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    pub fn with_session(mut self, session: impl Into<String>) -> Self {
        self.session = Some(session.into());
        self
    }

    /// Derives the session headers attached to every request.
    pub fn headers(&self) -> BTreeMap<String, String> {
        let mut headers = BTreeMap::new();
        headers.insert("x-appwrite-project".to_string(), self.project.clone());
        if let Some(key) = &self.key {
            headers.insert("x-appwrite-key".to_string(), key.clone());
        }
        if let Some(jwt) = &self.jwt {
            headers.insert("x-appwrite-jwt".to_string(), jwt.clone());
        }
        if let Some(locale) = &self.locale {
            headers.insert("x-appwrite-locale".to_string(), locale.clone());
        }
        if let Some(session) = &self.session {
            headers.insert("x-appwrite-session".to_string(), session.clone());
        }
        headers
    }
}
