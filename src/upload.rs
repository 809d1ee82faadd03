//! File upload encoding
//!
//! Decides how an invocation's body goes on the wire. Declared upload
//! slots are inspected for local files (`file://` URIs or existing
//! absolute paths); remote URLs and platform file ids pass through
//! untouched. When local files are present the body becomes
//! multipart/form-data with nested media descriptors rewritten to
//! `attach://` tokens; otherwise it is the canonical JSON of the
//! parameters.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

use crate::api::Encoding;
use crate::methods::{self, UploadShape};

static FILE_ID_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{20,}$").expect("file id regex"));

/// Extension → MIME table for file parts.
const MIME_TYPES: &[(&str, &str)] = &[
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("bmp", "image/bmp"),
    ("mp4", "video/mp4"),
    ("mov", "video/quicktime"),
    ("webm", "video/webm"),
    ("mp3", "audio/mpeg"),
    ("m4a", "audio/mp4"),
    ("ogg", "audio/ogg"),
    ("oga", "audio/ogg"),
    ("wav", "audio/wav"),
    ("pdf", "application/pdf"),
    ("zip", "application/zip"),
    ("txt", "text/plain"),
    ("json", "application/json"),
    ("tgs", "application/x-tgsticker"),
];

fn mime_for(path: &Path) -> &'static str {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .and_then(|ext| {
            MIME_TYPES
                .iter()
                .find(|(e, _)| *e == ext)
                .map(|(_, mime)| *mime)
        })
        .unwrap_or("application/octet-stream")
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("file not found: {0}")]
    NotFound(String),
    #[error("not a regular file: {0}")]
    NotAFile(String),
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Fully encoded request body.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub encoding: Encoding,
    pub body: Vec<u8>,
    pub content_type: String,
    /// Parameters after `attach://` rewriting; what a JSON body carries.
    pub params: Value,
}

/// One detected local file, scheduled as a multipart part.
#[derive(Debug)]
struct FilePart {
    name: String,
    path: PathBuf,
}

/// How a single slot value should be treated.
enum Slot {
    /// Local file to upload.
    Local(PathBuf),
    /// Remote URL, platform file id, or anything else: leave alone.
    PassThrough,
}

fn inspect_value(value: &Value) -> Result<Slot, UploadError> {
    let s = match value.as_str() {
        Some(s) => s,
        None => return Ok(Slot::PassThrough),
    };

    if let Some(stripped) = s.strip_prefix("file://") {
        return check_local(stripped).map(Slot::Local);
    }

    if s.starts_with("http://") || s.starts_with("https://") {
        return Ok(Slot::PassThrough);
    }

    if FILE_ID_SHAPE.is_match(s) {
        return Ok(Slot::PassThrough);
    }

    if Path::new(s).is_absolute() && Path::new(s).exists() {
        return check_local(s).map(Slot::Local);
    }

    Ok(Slot::PassThrough)
}

fn check_local(raw: &str) -> Result<PathBuf, UploadError> {
    let path = PathBuf::from(raw);
    if !path.exists() {
        return Err(UploadError::NotFound(raw.to_string()));
    }
    if !path.is_file() {
        return Err(UploadError::NotAFile(raw.to_string()));
    }
    Ok(path)
}

/// Encode the invocation body for `method`.
pub async fn prepare(method: &str, params: &Value) -> Result<Prepared, UploadError> {
    let descriptor = methods::get(method);
    let slots = descriptor.map(|d| d.uploads.as_slice()).unwrap_or(&[]);

    let mut normalised = params.clone();
    let mut files: Vec<FilePart> = Vec::new();

    if let Value::Object(map) = &mut normalised {
        for slot in slots {
            match slot.shape {
                UploadShape::Direct => {
                    let value = match map.get(slot.param) {
                        Some(v) => v,
                        None => continue,
                    };
                    if let Slot::Local(path) = inspect_value(value)? {
                        files.push(FilePart {
                            name: slot.param.to_string(),
                            path,
                        });
                        // The slot becomes a multipart file part; drop it
                        // from the textual parameter set.
                        map.remove(slot.param);
                    }
                }
                UploadShape::Object(fields) => {
                    if let Some(value) = map.get_mut(slot.param) {
                        collect_object(value, slot.param, fields, &mut files)?;
                    }
                }
                UploadShape::Array(fields) => {
                    if let Some(Value::Array(items)) = map.get_mut(slot.param) {
                        for (i, item) in items.iter_mut().enumerate() {
                            let base = format!("{}_{}", slot.param, i);
                            collect_object(item, &base, fields, &mut files)?;
                        }
                    }
                }
            }
        }
    }

    if files.is_empty() {
        let body = normalised.to_string().into_bytes();
        return Ok(Prepared {
            encoding: Encoding::Json,
            body,
            content_type: "application/json".to_string(),
            params: normalised,
        });
    }

    let boundary = format!("----GatewayBoundary{}", Uuid::new_v4().simple());
    let body = assemble_multipart(&boundary, &normalised, &files).await?;

    Ok(Prepared {
        encoding: Encoding::Multipart,
        content_type: format!("multipart/form-data; boundary={}", boundary),
        body,
        params: normalised,
    })
}

/// Descend one level into a media descriptor object, rewriting local
/// paths to `attach://` tokens. The first file-bearing field takes the
/// base name; further fields are suffixed to stay unique.
fn collect_object(
    value: &mut Value,
    base: &str,
    fields: &[&str],
    files: &mut Vec<FilePart>,
) -> Result<(), UploadError> {
    let map = match value.as_object_mut() {
        Some(map) => map,
        None => return Ok(()),
    };

    let mut named_first = false;
    for field in fields {
        let inner = match map.get_mut(*field) {
            Some(v) => v,
            None => continue,
        };

        if let Slot::Local(path) = inspect_value(inner)? {
            let name = if named_first {
                format!("{}_{}", base, field)
            } else {
                named_first = true;
                base.to_string()
            };
            *inner = Value::String(format!("attach://{}", name));
            files.push(FilePart { name, path });
        }
    }

    Ok(())
}

async fn assemble_multipart(
    boundary: &str,
    params: &Value,
    files: &[FilePart],
) -> Result<Vec<u8>, UploadError> {
    let mut body: Vec<u8> = Vec::new();

    if let Value::Object(map) = params {
        for (key, value) in map {
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
            body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", key).as_bytes(),
            );
            body.extend_from_slice(text.as_bytes());
            body.extend_from_slice(b"\r\n");
        }
    }

    for part in files {
        let filename = part
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("file");
        let mime = mime_for(&part.path);
        let contents =
            tokio::fs::read(&part.path)
                .await
                .map_err(|source| UploadError::Read {
                    path: part.path.display().to_string(),
                    source,
                })?;

        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                part.name, filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", mime).as_bytes());
        body.extend_from_slice(&contents);
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());
    Ok(body)
}
