//! Resumable chunked upload for large binary payloads.
//!
//! Payloads are sent in fixed 5 MiB chunks with `Content-Range` headers. The
//! server tracks `chunksUploaded`, so an interrupted upload resumes from the
//! last completed chunk instead of byte zero.

use super::client::ApiClient;
use super::error::ApiError;
use super::params::{InputFile, Param, Params};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

/// Fixed chunk size: 5 MiB.
pub const CHUNK_SIZE: u64 = 5 * 1024 * 1024;

/// Progress snapshot reported after each chunk, computed from the server's
/// response fields.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadProgress {
    /// Server-assigned upload session ID.
    pub id: String,
    /// Percentage of bytes the server has acknowledged, 0..=100.
    pub progress: f64,
    pub bytes_uploaded: u64,
    pub chunks_total: u64,
    pub chunks_uploaded: u64,
}

/// Inclusive byte ranges still to be sent for a payload of `size` bytes with
/// `chunks_uploaded` chunks already on the server. Bounds never exceed
/// `size - 1`.
fn remaining_ranges(size: u64, chunks_uploaded: u64, chunk_size: u64) -> Vec<(u64, u64)> {
    let mut ranges = Vec::new();
    let mut offset = chunks_uploaded * chunk_size;
    while offset < size {
        ranges.push((offset, (offset + chunk_size).min(size) - 1));
        offset += chunk_size;
    }
    ranges
}

fn content_range(start: u64, end: u64, total: u64) -> String {
    format!("bytes {start}-{end}/{total}")
}

/// Reads a numeric field that the server may encode as a string.
fn field_u64(value: &Value, key: &str) -> u64 {
    match value.get(key) {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::String(s)) => s.parse().unwrap_or(0),
        _ => 0,
    }
}

/// Decodes the probed upload record as the final result when the server
/// already holds every chunk; `None` while chunks remain to be sent.
fn resumed_complete<T: DeserializeOwned>(
    existing: Option<Value>,
    size: u64,
    chunks_uploaded: u64,
    chunk_size: u64,
) -> Option<Result<T, ApiError>> {
    if !remaining_ranges(size, chunks_uploaded, chunk_size).is_empty() {
        return None;
    }
    let record = existing.unwrap_or(Value::Null);
    Some(serde_json::from_value(record).map_err(|e| ApiError::Decode {
        message: e.to_string(),
    }))
}

fn multipart_headers() -> Vec<(String, String)> {
    vec![(
        "content-type".to_string(),
        "multipart/form-data".to_string(),
    )]
}

impl ApiClient {
    /// Uploads the file parameter in `params` chunk by chunk, resuming from
    /// the server-reported progress for a known file ID.
    ///
    /// `id_param` names the string parameter carrying the file ID. Missing
    /// file or ID parameters are caller-contract violations raised before any
    /// I/O. Payloads smaller than one chunk go out as a single plain call.
    pub async fn chunked_upload<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &Params,
        id_param: &str,
        on_progress: Option<&(dyn Fn(UploadProgress) + Send + Sync)>,
    ) -> Result<T, ApiError> {
        let (file_key, file) = params
            .iter()
            .find_map(|(key, param)| match param {
                Param::File(file) => Some((key.clone(), file.clone())),
                _ => None,
            })
            .ok_or_else(|| ApiError::InvalidArgument {
                message: "chunked upload requires a file parameter".to_string(),
            })?;
        let file_id = match params.get(id_param) {
            Some(Param::String(id)) if !id.is_empty() => id.clone(),
            _ => {
                return Err(ApiError::InvalidArgument {
                    message: format!("chunked upload requires a {id_param} string parameter"),
                })
            }
        };

        let size = file.data.len() as u64;
        if size <= CHUNK_SIZE {
            return self
                .call(Method::POST, path, params, &multipart_headers())
                .await;
        }

        // Resume: ask the server how many chunks it already has. A missing
        // upload record means a fresh start.
        let mut chunks_uploaded = 0u64;
        let mut existing_record = None;
        if file_id != "unique()" {
            if let Ok(existing) = self
                .call::<Value>(
                    Method::GET,
                    &format!("{path}/{file_id}"),
                    &Params::new(),
                    &[],
                )
                .await
            {
                chunks_uploaded = field_u64(&existing, "chunksUploaded");
                existing_record = Some(existing);
            }
        }

        // Every chunk already on the server: the existing record is the
        // final result, nothing left to send.
        if let Some(result) = resumed_complete(existing_record, size, chunks_uploaded, CHUNK_SIZE) {
            return result;
        }

        let mut session_id = if chunks_uploaded > 0 {
            file_id.clone()
        } else {
            String::new()
        };
        let mut params = params.clone();
        let mut result = Value::Null;

        for (start, end) in remaining_ranges(size, chunks_uploaded, CHUNK_SIZE) {
            // The chunk buffer is rebuilt in place each iteration; callers
            // must not retain it beyond the chunk's upload.
            let chunk = file.data[start as usize..=end as usize].to_vec();
            params.insert(
                file_key.clone(),
                Param::File(InputFile {
                    filename: file.filename.clone(),
                    mime_type: file.mime_type.clone(),
                    data: chunk,
                }),
            );

            let mut headers = multipart_headers();
            headers.push(("content-range".to_string(), content_range(start, end, size)));
            if !session_id.is_empty() {
                headers.push(("x-appwrite-id".to_string(), session_id.clone()));
            }

            let response: Value = self.call(Method::POST, path, &params, &headers).await?;
            if session_id.is_empty() {
                session_id = response
                    .get("$id")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
            }

            if let Some(callback) = on_progress {
                let acked_chunks = field_u64(&response, "chunksUploaded");
                let bytes_uploaded = (acked_chunks * CHUNK_SIZE).min(size);
                callback(UploadProgress {
                    id: session_id.clone(),
                    progress: bytes_uploaded as f64 / size as f64 * 100.0,
                    bytes_uploaded,
                    chunks_total: field_u64(&response, "chunksTotal"),
                    chunks_uploaded: acked_chunks,
                });
            }

            debug!(start, end, size, "Uploaded chunk");
            result = response;
        }

        serde_json::from_value(result).map_err(|e| ApiError::Decode {
            message: e.to_string(),
        })
    }
}
