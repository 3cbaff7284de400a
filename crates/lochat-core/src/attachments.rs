//! Attachments
//!
//! Images are sent to the model as base64 payloads; documents (PDF or plain
//! text) are reduced to their text, which is prepended to the prompt.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use base64::Engine;
use thiserror::Error;
use tracing::{debug, warn};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp"];

const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "markdown", "csv", "tsv", "json", "yaml", "yml", "toml", "xml", "html", "log",
    "rs", "py", "js", "ts", "c", "h", "cpp", "java", "go", "sh",
];

#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("unsupported file type: {}", .0.display())]
    Unsupported(PathBuf),

    #[error("failed to extract text from {}: {reason}", path.display())]
    ExtractionFailed { path: PathBuf, reason: String },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Image,
    Document,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentPayload {
    /// Base64-encoded file bytes
    Base64(String),
    /// Extracted plain text
    Text(String),
}

/// A file attached to a user message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub kind: AttachmentKind,
    pub payload: AttachmentPayload,
}

fn io_error(path: &Path, source: std::io::Error) -> AttachmentError {
    AttachmentError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

fn read_header(path: &Path) -> Result<Vec<u8>, AttachmentError> {
    let mut header = Vec::with_capacity(16);
    fs::File::open(path)
        .and_then(|f| f.take(16).read_to_end(&mut header))
        .map_err(|e| io_error(path, e))?;
    Ok(header)
}

fn is_pdf(path: &Path) -> Result<bool, AttachmentError> {
    if extension(path).as_deref() == Some("pdf") {
        return Ok(true);
    }
    Ok(read_header(path)?.starts_with(b"%PDF-"))
}

/// Work out the kind of a file: extension first, then magic bytes
pub fn detect_kind(path: &Path) -> Result<AttachmentKind, AttachmentError> {
    if let Some(ext) = extension(path) {
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            return Ok(AttachmentKind::Image);
        }
        if ext == "pdf" || TEXT_EXTENSIONS.contains(&ext.as_str()) {
            return Ok(AttachmentKind::Document);
        }
    }

    let header = read_header(path)?;
    if header.starts_with(b"%PDF-") {
        Ok(AttachmentKind::Document)
    } else if image::guess_format(&header).is_ok() {
        Ok(AttachmentKind::Image)
    } else {
        Err(AttachmentError::Unsupported(path.to_path_buf()))
    }
}

impl Attachment {
    /// Load a file, detecting its kind
    pub fn load(path: &Path) -> Result<Self, AttachmentError> {
        let kind = detect_kind(path)?;
        Self::from_file(path, kind)
    }

    /// Load a file as the given kind
    pub fn from_file(path: &Path, kind: AttachmentKind) -> Result<Self, AttachmentError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let payload = match kind {
            AttachmentKind::Image => {
                let bytes = fs::read(path).map_err(|e| io_error(path, e))?;
                AttachmentPayload::Base64(base64::engine::general_purpose::STANDARD.encode(bytes))
            }
            AttachmentKind::Document => AttachmentPayload::Text(extract_document(path)?),
        };

        debug!("Attached {} ({:?})", name, kind);
        Ok(Self {
            name,
            kind,
            payload,
        })
    }

    /// Short label shown in the transcript instead of the payload
    pub fn marker(&self) -> String {
        format!("📎 {}", self.name)
    }

    pub fn image_data(&self) -> Option<&str> {
        match &self.payload {
            AttachmentPayload::Base64(data) if self.kind == AttachmentKind::Image => Some(data),
            _ => None,
        }
    }

    pub fn document_text(&self) -> Option<&str> {
        match &self.payload {
            AttachmentPayload::Text(text) => Some(text),
            AttachmentPayload::Base64(_) => None,
        }
    }
}

fn extract_document(path: &Path) -> Result<String, AttachmentError> {
    let text = if is_pdf(path)? {
        extract_pdf(path)?
    } else {
        let bytes = fs::read(path).map_err(|e| io_error(path, e))?;
        String::from_utf8(bytes).map_err(|_| AttachmentError::ExtractionFailed {
            path: path.to_path_buf(),
            reason: "not valid UTF-8 text".to_string(),
        })?
    };

    if text.trim().is_empty() {
        return Err(AttachmentError::ExtractionFailed {
            path: path.to_path_buf(),
            reason: "no extractable text".to_string(),
        });
    }
    Ok(text.trim().to_string())
}

#[cfg(feature = "pdf")]
fn extract_pdf(path: &Path) -> Result<String, AttachmentError> {
    let bytes = fs::read(path).map_err(|e| io_error(path, e))?;

    // The parser panics on some malformed files
    match std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(&bytes)) {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(AttachmentError::ExtractionFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }),
        Err(_) => {
            warn!("PDF parser panicked on {}", path.display());
            Err(AttachmentError::ExtractionFailed {
                path: path.to_path_buf(),
                reason: "malformed PDF".to_string(),
            })
        }
    }
}

#[cfg(not(feature = "pdf"))]
fn extract_pdf(path: &Path) -> Result<String, AttachmentError> {
    warn!("PDF attachment without the `pdf` feature: {}", path.display());
    Err(AttachmentError::ExtractionFailed {
        path: path.to_path_buf(),
        reason: "PDF text extraction is not available in this build".to_string(),
    })
}

/// Prepend the text of any document attachments to `prompt`
pub fn compose_prompt(prompt: &str, attachments: &[Attachment]) -> String {
    let mut out = String::new();
    for attachment in attachments {
        if let Some(text) = attachment.document_text() {
            out.push_str(&format!("[Document: {}]\n{}\n\n", attachment.name, text));
        }
    }
    out.push_str(prompt);
    out
}
