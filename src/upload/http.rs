use std::time::Duration;

use reqwest::blocking::{
    Client,
    multipart::{Form, Part},
};

use crate::{
    config::UploadConfig,
    encode::mime::{Container, extension_for_mime},
    foundation::error::{BoothError, BoothResult},
    record::recorder::ClipBlob,
    upload::port::{UploadPort, unix_ms_now, upload_filename},
};

/// Header identifying this client to the upload endpoint.
pub const CLIENT_SOURCE_HEADER: &str = "X-Client-Source";

/// Uploads clips as `multipart/form-data` and reads the URL from the JSON reply.
#[derive(Debug, Clone)]
pub struct HttpUpload {
    client: Client,
    endpoint: String,
    field_name: String,
    client_source: String,
}

impl HttpUpload {
    pub fn new(cfg: &UploadConfig) -> BoothResult<Self> {
        if cfg.endpoint.trim().is_empty() {
            return Err(BoothError::validation("upload endpoint must be non-empty"));
        }
        if cfg.field_name.is_empty() {
            return Err(BoothError::validation("upload field name must be non-empty"));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs.max(1)))
            .build()
            .map_err(|e| BoothError::transport(format!("build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: cfg.endpoint.clone(),
            field_name: cfg.field_name.clone(),
            client_source: cfg.client_source.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn file_part(&self, clip: &ClipBlob) -> BoothResult<Part> {
        let filename = upload_filename(&clip.mime, unix_ms_now());
        let bare = if extension_for_mime(&clip.mime) == Container::Mp4.extension() {
            Container::Mp4.mime()
        } else {
            Container::Webm.mime()
        };
        let content_type = if clip.mime.is_empty() {
            bare
        } else {
            clip.mime.as_str()
        };
        match Part::bytes(clip.bytes.clone())
            .file_name(filename.clone())
            .mime_str(content_type)
        {
            Ok(p) => Ok(p),
            Err(_) => Part::bytes(clip.bytes.clone())
                .file_name(filename)
                .mime_str(bare)
                .map_err(|e| BoothError::transport(format!("build upload part: {e}"))),
        }
    }
}

impl UploadPort for HttpUpload {
    #[tracing::instrument(skip_all, fields(endpoint = %self.endpoint, bytes = clip.bytes.len()))]
    fn upload(&self, clip: &ClipBlob) -> BoothResult<String> {
        let form = Form::new().part(self.field_name.clone(), self.file_part(clip)?);
        let response = self
            .client
            .post(&self.endpoint)
            .header(CLIENT_SOURCE_HEADER, &self.client_source)
            .multipart(form)
            .send()
            .map_err(|e| BoothError::transport(format!("Upload failed: {e}")))?;

        let status = response.status();
        let body = response.text().map_err(|e| {
            BoothError::transport(format!(
                "Upload failed ({}): could not read response: {e}",
                status.as_u16()
            ))
        })?;
        parse_upload_response(status.as_u16(), status.canonical_reason(), &body)
    }
}

/// Interpret the endpoint's reply: a 2xx JSON object carrying a non-empty `url`.
pub fn parse_upload_response(status: u16, reason: Option<&str>, body: &str) -> BoothResult<String> {
    if !(200..300).contains(&status) {
        let detail = if body.trim().is_empty() {
            reason.unwrap_or_default()
        } else {
            body
        };
        return Err(BoothError::transport(format!(
            "Upload failed ({status}): {detail}"
        )));
    }

    let url = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("url").and_then(|u| u.as_str()).map(str::to_string))
        .filter(|u| !u.is_empty());
    url.ok_or_else(|| BoothError::transport("Server did not return a URL."))
}

#[cfg(test)]
#[path = "../../tests/unit/upload/http.rs"]
mod tests;
