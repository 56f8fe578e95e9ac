//! Geometry descriptors embedded in request paths, e.g. `78x110/north/photo.jpg`.

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::fmt;
use thiserror::Error;

use crate::geometry::{Dimensions, Gravity, Offset};

mod path;

lazy_static! {
  static ref RESIZE_REGEX: Regex =
    Regex::new(r"^(?P<width>[0-9]+)x(?P<height>[0-9]+)/(?P<path>.+)$").unwrap();
  static ref CROP_REGEX: Regex = Regex::new(concat!(
    r"^(?P<width>[0-9]+)x(?P<height>[0-9]+)",
    r"(?:\+(?P<x>-?[0-9]+)\+(?P<y>-?[0-9]+))?",
    r"(?:/(?P<direction>northwest|northeast|southwest|southeast|north|south|center|west|east))?",
    r"/(?P<path>.+)$"
  ))
  .unwrap();
  static ref THUMBNAIL_REGEX: Regex = Regex::new(concat!(
    r"^(?P<width>[0-9]+)x(?P<height>[0-9]+)",
    r"(?:/(?P<direction>northwest|northeast|southwest|southeast|north|south|center|west|east))?",
    r"/(?P<path>.+)$"
  ))
  .unwrap();
}

/// Direction words a leading path segment is compared against when no
/// direction was matched.
const DIRECTION_WORDS: [&str; 10] = [
  "northwest",
  "northeast",
  "southwest",
  "southeast",
  "north",
  "south",
  "center",
  "centre",
  "west",
  "east",
];

/// Shortest truncation of a direction word still read as that word.
const MIN_TRUNCATED_LEN: usize = 4;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
  #[error("descriptor does not match the {0} grammar")]
  Mismatch(OperationKind),
  #[error("invalid dimension {value:?}: {reason}")]
  InvalidDimension { value: String, reason: String },
  #[error("invalid offset {value:?}: {reason}")]
  InvalidOffset { value: String, reason: String },
  #[error("invalid direction {0:?}")]
  InvalidDirection(String),
  #[error("invalid path {0:?}")]
  InvalidPath(String),
  #[error("invalid extension {0:?}, expected jpg, jpeg or png")]
  InvalidExtension(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
  Resize,
  Crop,
  Thumbnail,
}

impl fmt::Display for OperationKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      OperationKind::Resize => "resize",
      OperationKind::Crop => "crop",
      OperationKind::Thumbnail => "thumbnail",
    })
  }
}

/// An operation with exactly the fields it consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
  Resize {
    size: Dimensions,
  },
  Crop {
    size: Dimensions,
    offset: Offset,
    gravity: Gravity,
  },
  Thumbnail {
    size: Dimensions,
    gravity: Gravity,
  },
}

/// A parsed descriptor. Width and height are non-zero and the source path is
/// relative, cleaned and carries an allowed extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeometryRequest {
  pub kind: OperationKind,
  pub width: u32,
  pub height: u32,
  pub gravity: Gravity,
  pub offset: Offset,
  pub source_path: String,
}

impl GeometryRequest {
  pub fn size(&self) -> Dimensions {
    Dimensions::new(self.width, self.height)
  }

  pub fn operation(&self) -> Operation {
    let size = self.size();
    match self.kind {
      OperationKind::Resize => Operation::Resize { size },
      OperationKind::Crop => Operation::Crop {
        size,
        offset: self.offset,
        gravity: self.gravity,
      },
      OperationKind::Thumbnail => Operation::Thumbnail {
        size,
        gravity: self.gravity,
      },
    }
  }
}

pub fn parse(kind: OperationKind, raw: &str) -> Result<GeometryRequest, ParseError> {
  let regex: &Regex = match kind {
    OperationKind::Resize => &*RESIZE_REGEX,
    OperationKind::Crop => &*CROP_REGEX,
    OperationKind::Thumbnail => &*THUMBNAIL_REGEX,
  };

  let captures = regex.captures(raw).ok_or(ParseError::Mismatch(kind))?;

  let width = dimension(&captures["width"])?;
  let height = dimension(&captures["height"])?;

  let offset = Offset {
    x: offset(captures.name("x").map(|m| m.as_str()))?,
    y: offset(captures.name("y").map(|m| m.as_str()))?,
  };

  let source_path = path::clean(&captures["path"])?;
  path::check_extension(&source_path)?;

  let gravity = gravity(kind, &captures, &source_path)?;

  Ok(GeometryRequest {
    kind,
    width,
    height,
    gravity,
    offset,
    source_path,
  })
}

fn dimension(value: &str) -> Result<u32, ParseError> {
  let parsed = value
    .parse::<u16>()
    .map_err(|e| ParseError::InvalidDimension {
      value: value.to_owned(),
      reason: e.to_string(),
    })?;

  if parsed == 0 {
    return Err(ParseError::InvalidDimension {
      value: value.to_owned(),
      reason: "must be greater than zero".to_owned(),
    });
  }

  Ok(u32::from(parsed))
}

fn offset(value: Option<&str>) -> Result<i32, ParseError> {
  match value {
    None => Ok(0),
    Some(v) => v.parse::<i32>().map_err(|e| ParseError::InvalidOffset {
      value: v.to_owned(),
      reason: e.to_string(),
    }),
  }
}

fn gravity(
  kind: OperationKind,
  captures: &Captures<'_>,
  source_path: &str,
) -> Result<Gravity, ParseError> {
  if let Some(direction) = captures.name("direction") {
    return Gravity::from_token(direction.as_str())
      .ok_or_else(|| ParseError::InvalidDirection(direction.as_str().to_owned()));
  }

  if kind == OperationKind::Resize {
    return Ok(Gravity::Unspecified);
  }

  // "NorthEast/a.png" or "centre/a.png" must not quietly become a directory
  if let Some((first, _)) = source_path.split_once('/') {
    if is_misspelled_direction(first) {
      return Err(ParseError::InvalidDirection(first.to_owned()));
    }
  }

  Ok(Gravity::Unspecified)
}

/// A direction word in any case, a word followed by a separator or a single
/// stray character (`south-east`, `northx`), or a truncated word (`nort`).
/// Ordinary names that merely start with a word (`westminster`) pass.
fn is_misspelled_direction(segment: &str) -> bool {
  let lowered = segment.to_ascii_lowercase();

  DIRECTION_WORDS.iter().any(|word| {
    if let Some(rest) = lowered.strip_prefix(word) {
      return rest.is_empty()
        || rest.len() == 1
        || rest.starts_with(|c: char| !c.is_ascii_alphanumeric());
    }

    lowered.len() >= MIN_TRUNCATED_LEN && word.starts_with(lowered.as_str())
  })
}
