//! File upload handshake.
//!
//! After the user accepts a file consent card, the platform sends an invoke
//! activity whose value carries the upload destination and the context we
//! attached to the card. This module validates that payload, transfers the
//! regenerated output to the destination and builds the file info card that
//! tells the user the upload finished.

use crate::error::{Result, UploadError};
use crate::Attachment;

use axum::http::{StatusCode, header};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;

pub const FILE_INFO_CONTENT_TYPE: &str = "application/vnd.microsoft.teams.card.file.info";

/// Upload destination supplied by the platform on accept.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadInfo {
    #[serde(default)]
    pub name: String,
    /// URL-escaped destination for the PUT.
    pub upload_url: String,
    #[serde(default)]
    pub content_url: String,
    #[serde(default)]
    pub unique_id: String,
    #[serde(default)]
    pub file_type: String,
}

/// Context attached to the consent card and echoed back on accept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadContext {
    pub command: String,
}

/// A consent the user accepted, decoded from the invoke value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedUpload {
    pub info: UploadInfo,
    pub context: UploadContext,
}

/// Decode an accepted file upload from an invoke value.
///
/// Returns `Ok(None)` when the invoke is not an accepted file upload: other
/// invoke types, declined consents and missing context are ignored.
pub fn accepted_upload(value: Option<&Value>) -> Result<Option<AcceptedUpload>> {
    let Some(value) = value else {
        return Ok(None);
    };
    if value.get("type").and_then(Value::as_str) != Some("fileUpload") {
        return Ok(None);
    }
    if value.get("action").and_then(Value::as_str) != Some("accept") {
        return Ok(None);
    }
    let Some(context) = value.get("context").filter(|context| !context.is_null()) else {
        return Ok(None);
    };

    let info = UploadInfo::deserialize(value.get("uploadInfo").unwrap_or(&Value::Null))
        .map_err(|source| UploadError::Decode {
            field: "uploadInfo",
            source,
        })?;
    let context = UploadContext::deserialize(context).map_err(|source| UploadError::Decode {
        field: "context",
        source,
    })?;

    Ok(Some(AcceptedUpload { info, context }))
}

/// Card telling the user the upload completed.
pub fn file_info_attachment(info: &UploadInfo) -> Attachment {
    Attachment {
        content_type: FILE_INFO_CONTENT_TYPE.into(),
        name: Some(info.name.clone()),
        content_url: Some(info.content_url.clone()),
        content: Some(json!({
            "uniqueId": info.unique_id,
            "fileType": info.file_type,
        })),
    }
}

/// Transfers response files to platform-provided upload URLs.
#[derive(Clone)]
pub struct Uploader {
    http: reqwest::Client,
}

impl Uploader {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }

    /// PUT `data` as a single full range to the escaped `upload_url`.
    pub async fn put(&self, upload_url: &str, data: Vec<u8>) -> Result<()> {
        let url = decode_upload_url(upload_url)?;
        let size = data.len();

        let mut request = self
            .http
            .put(&url)
            .header(header::CONTENT_TYPE, "text/plain")
            .header(header::CONTENT_LENGTH, size);
        if let Some(range) = content_range(size) {
            request = request.header(header::CONTENT_RANGE, range);
        }
        let response = request.body(data).send().await.map_err(UploadError::from)?;

        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::CREATED {
            return Err(UploadError::Status(status.as_u16()).into());
        }
        tracing::debug!(size, "response file uploaded");
        Ok(())
    }
}

/// Percent-decode the upload URL. `+` is kept as is: it is a literal in URL
/// paths, and only query strings use it for spaces.
fn decode_upload_url(upload_url: &str) -> Result<String> {
    urlencoding::decode(upload_url)
        .map(|url| url.into_owned())
        .map_err(|error| UploadError::InvalidUrl(error.to_string()).into())
}

/// `Content-Range` for a single full-body upload. An empty body has no
/// satisfiable byte range, so none is sent.
fn content_range(size: usize) -> Option<String> {
    size.checked_sub(1)
        .map(|last| format!("bytes 0-{last}/{size}"))
}
