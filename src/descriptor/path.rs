use std::path::Path;

use super::ParseError;

const ALLOWED_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Resolves `.` and `..`, drops empty segments (and with them any leading
/// slash). Climbing above the storage root is an error.
pub(super) fn clean(raw: &str) -> Result<String, ParseError> {
  if raw.contains('\0') || raw.contains('\\') {
    return Err(ParseError::InvalidPath(raw.to_owned()));
  }

  let mut segments: Vec<&str> = Vec::new();
  for segment in raw.split('/') {
    match segment {
      "" | "." => {}
      ".." => {
        if segments.pop().is_none() {
          return Err(ParseError::InvalidPath(raw.to_owned()));
        }
      }
      s => segments.push(s),
    }
  }

  if segments.is_empty() {
    return Err(ParseError::InvalidPath(raw.to_owned()));
  }

  Ok(segments.join("/"))
}

pub(super) fn check_extension(path: &str) -> Result<(), ParseError> {
  let allowed = Path::new(path)
    .extension()
    .and_then(|ext| ext.to_str())
    .map(|ext| {
      ALLOWED_EXTENSIONS
        .iter()
        .any(|allowed| ext.eq_ignore_ascii_case(allowed))
    })
    .unwrap_or(false);

  if !allowed {
    return Err(ParseError::InvalidExtension(path.to_owned()));
  }

  Ok(())
}
