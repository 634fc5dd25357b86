//! Authenticated call plumbing for the backend client.

use super::config::ApiConfig;
use super::error::{ApiError, ErrorEnvelope};
use super::params::{scalar_to_string, to_json_body, to_query_pairs, Param, Params};
use rand::Rng;
use reqwest::multipart::{Form, Part};
use reqwest::Method;
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Transfer-progress hook invoked with `(bytes_transferred, total_bytes)`
/// for the request body: once before the body goes out and once after the
/// server acknowledges the request.
pub type TransferProgress<'a> = &'a (dyn Fn(u64, u64) + Send + Sync);

/// Pluggable connectivity probe consulted before any network attempt.
pub trait ConnectionChecker: Send + Sync {
    fn is_online(&self) -> bool;
}

/// Default checker for environments with assumed connectivity.
pub struct AlwaysOnline;

impl ConnectionChecker for AlwaysOnline {
    fn is_online(&self) -> bool {
        true
    }
}

struct CachedTransport {
    config: ApiConfig,
    client: reqwest::Client,
}

/// Client for the remote backend (REST, document store, file storage).
///
/// The underlying transport is memoized by configuration value: repeated
/// calls with an unchanged configuration reuse the same instance, which keeps
/// connection pools and the cookie/session store alive across calls.
pub struct ApiClient {
    config: ApiConfig,
    transport: Mutex<Option<CachedTransport>>,
    transport_generation: AtomicU64,
    connectivity: Arc<dyn ConnectionChecker>,
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        Url::parse(&config.endpoint)?;
        Ok(Self {
            config,
            transport: Mutex::new(None),
            transport_generation: AtomicU64::new(0),
            connectivity: Arc::new(AlwaysOnline),
        })
    }

    pub fn with_connectivity(mut self, checker: Arc<dyn ConnectionChecker>) -> Self {
        self.connectivity = checker;
        self
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Replaces the configuration. The transport is rebuilt lazily on the
    /// next call; callers must serialize this relative to in-flight requests.
    pub fn set_config(&mut self, config: ApiConfig) {
        self.config = config;
    }

    /// Returns the memoized transport, rebuilding it only when the
    /// configuration changed since the last call.
    fn transport(&self) -> Result<reqwest::Client, ApiError> {
        let mut cached = self.transport.lock().unwrap();
        if let Some(entry) = cached.as_ref() {
            if entry.config == self.config {
                return Ok(entry.client.clone());
            }
        }

        let client = reqwest::Client::builder()
            .user_agent(&self.config.user_agent)
            .cookie_store(true)
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| ApiError::Network {
                message: format!("failed to build transport: {e}"),
            })?;
        *cached = Some(CachedTransport {
            config: self.config.clone(),
            client: client.clone(),
        });
        self.transport_generation.fetch_add(1, Ordering::Relaxed);
        Ok(client)
    }

    /// Number of transport rebuilds so far; stays flat while the
    /// configuration is unchanged.
    #[cfg(test)]
    pub(crate) fn transport_generation(&self) -> u64 {
        self.transport_generation.load(Ordering::Relaxed)
    }

    /// Issues an authenticated request and decodes the response against `T`.
    ///
    /// GET requests encode `params` as query pairs; other methods send
    /// multipart form data when the supplied content type says so, otherwise
    /// a JSON body. Fails with [`ApiError::Offline`] before any network
    /// attempt when connectivity is absent.
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        params: &Params,
        headers: &[(String, String)],
    ) -> Result<T, ApiError> {
        self.call_with_progress(method, path, params, headers, None)
            .await
    }

    /// [`Self::call`] with a transfer-progress hook: the callback receives
    /// `(bytes_transferred, total_bytes)` for the request body, zero before
    /// the transfer and the full size once the server has acknowledged it.
    pub async fn call_with_progress<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        params: &Params,
        headers: &[(String, String)],
        on_progress: Option<TransferProgress<'_>>,
    ) -> Result<T, ApiError> {
        if !self.connectivity.is_online() {
            return Err(ApiError::Offline);
        }

        let correlation_id = generate_correlation_id();
        let url = format!("{}{}", self.config.endpoint.trim_end_matches('/'), path);
        debug!(
            correlation_id = %correlation_id,
            method = %method,
            url = %url,
            "Issuing backend call"
        );

        let multipart = headers.iter().any(|(key, value)| {
            key.eq_ignore_ascii_case("content-type") && value.starts_with("multipart/form-data")
        });

        let client = self.transport()?;
        let mut builder = client.request(method.clone(), &url);
        for (key, value) in self.config.headers() {
            builder = builder.header(&key, &value);
        }
        // The transport sets its own content type (with the multipart
        // boundary or application/json), so that header is routing-only.
        for (key, value) in headers {
            if !key.eq_ignore_ascii_case("content-type") {
                builder = builder.header(key, value);
            }
        }

        if method == Method::GET {
            builder = builder.query(&to_query_pairs(params));
        } else if multipart {
            builder = builder.multipart(build_form(params)?);
        } else {
            builder = builder.json(&to_json_body(params));
        }

        let body_size = request_body_size(&method, params, multipart);
        if let Some(progress) = on_progress {
            progress(0, body_size);
        }

        let response = builder.send().await?;
        if let Some(progress) = on_progress {
            progress(body_size, body_size);
        }
        let status = response.status();
        debug!(
            correlation_id = %correlation_id,
            status = status.as_u16(),
            "Backend call completed"
        );

        if status.is_success() {
            let text = response.text().await?;
            let body = if text.is_empty() { "null" } else { text.as_str() };
            serde_json::from_str(body).map_err(|e| ApiError::Decode {
                message: e.to_string(),
            })
        } else {
            let envelope: ErrorEnvelope = response.json().await.unwrap_or_default();
            warn!(
                correlation_id = %correlation_id,
                status = status.as_u16(),
                error_type = %envelope.error_type,
                "Backend call failed"
            );
            Err(ApiError::remote(status.as_u16(), envelope))
        }
    }
}

/// Request-body size in bytes for the given encoding mode. GET carries no
/// body; multipart counts the file and text parts, excluding boundary
/// overhead.
fn request_body_size(method: &Method, params: &Params, multipart: bool) -> u64 {
    if *method == Method::GET {
        return 0;
    }
    if multipart {
        params
            .values()
            .map(|param| match param {
                Param::File(file) => file.data.len() as u64,
                Param::String(value) => value.len() as u64,
                Param::List(values) => values
                    .iter()
                    .map(|value| scalar_to_string(value).len() as u64)
                    .sum(),
                Param::Map(_) => 0,
            })
            .sum()
    } else {
        serde_json::to_vec(&to_json_body(params))
            .map(|body| body.len() as u64)
            .unwrap_or(0)
    }
}

fn build_form(params: &Params) -> Result<Form, ApiError> {
    let mut form = Form::new();
    for (key, param) in params {
        match param {
            Param::File(file) => {
                let part = Part::bytes(file.data.clone())
                    .file_name(file.filename.clone())
                    .mime_str(&file.mime_type)
                    .map_err(|e| ApiError::InvalidArgument {
                        message: format!("invalid mime type {}: {e}", file.mime_type),
                    })?;
                form = form.part(key.clone(), part);
            }
            Param::String(value) => {
                form = form.text(key.clone(), value.clone());
            }
            Param::List(values) => {
                for value in values {
                    let text = match value {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    form = form.text(format!("{key}[]"), text);
                }
            }
            // Maps only exist in JSON body mode.
            Param::Map(_) => {}
        }
    }
    Ok(form)
}

/// Generates a unique correlation ID for request tracing.
fn generate_correlation_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros();
    let random: u32 = rand::thread_rng().gen();
    format!("{:x}-{:08x}", timestamp & 0xFFFFFFFF, random)
}
