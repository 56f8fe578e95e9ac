use thiserror::Error;

/// Source types the service agrees to transform.
pub const ALLOWED_CONTENT_TYPES: [&str; 2] = ["image/png", "image/jpeg"];

const UNKNOWN: &str = "application/octet-stream";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid content type {0}")]
pub struct ContentTypeError(pub String);

/// Detects the MIME type from the leading bytes, ignoring any file name.
pub fn sniff(data: &[u8]) -> &'static str {
  image::guess_format(data)
    .map(|format| format.to_mime_type())
    .unwrap_or(UNKNOWN)
}

pub fn ensure_allowed(data: &[u8]) -> Result<&'static str, ContentTypeError> {
  let mime = sniff(data);
  if ALLOWED_CONTENT_TYPES.contains(&mime) {
    Ok(mime)
  } else {
    Err(ContentTypeError(mime.to_owned()))
  }
}
