//! Pure geometry used to plan a transformation: how big the working region is
//! and where it is sampled from in the source image.

use thiserror::Error;

pub mod offset;
pub mod size;

pub use offset::resolve_offset;
pub use size::{crop_box, fit_box, limit, normalize};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
  #[error("degenerate region {width}x{height}")]
  ZeroSized { width: u32, height: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
  pub width: u32,
  pub height: u32,
}

impl Dimensions {
  pub const fn new(width: u32, height: u32) -> Self {
    Self { width, height }
  }

  /// True when `self` fits inside `other` on both axes.
  pub fn fits_within(&self, other: Dimensions) -> bool {
    self.width <= other.width && self.height <= other.height
  }

  pub(crate) fn non_zero(self) -> Result<Self, GeometryError> {
    if self.width == 0 || self.height == 0 {
      return Err(GeometryError::ZeroSized {
        width: self.width,
        height: self.height,
      });
    }

    Ok(self)
  }
}

impl std::fmt::Display for Dimensions {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}x{}", self.width, self.height)
  }
}

/// Top-left sampling coordinate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Point {
  pub x: i64,
  pub y: i64,
}

/// Caller supplied manual shift, applied after gravity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Offset {
  pub x: i32,
  pub y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
  pub origin: Point,
  pub size: Dimensions,
}

/// Anchor used to pick which part of the source survives a crop.
///
/// `Unspecified` is what a descriptor without a direction parses to. It
/// resolves exactly like `Center`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Gravity {
  NorthWest,
  North,
  NorthEast,
  West,
  Center,
  East,
  SouthWest,
  South,
  SouthEast,
  #[default]
  Unspecified,
}

impl Gravity {
  /// Direction tokens accepted in descriptors, longest first so that an
  /// alternation built from them prefers `northwest` over `north`.
  pub const TOKENS: [(&'static str, Gravity); 9] = [
    ("northwest", Gravity::NorthWest),
    ("northeast", Gravity::NorthEast),
    ("southwest", Gravity::SouthWest),
    ("southeast", Gravity::SouthEast),
    ("north", Gravity::North),
    ("south", Gravity::South),
    ("center", Gravity::Center),
    ("west", Gravity::West),
    ("east", Gravity::East),
  ];

  pub fn from_token(token: &str) -> Option<Gravity> {
    Self::TOKENS
      .iter()
      .find(|(name, _)| *name == token)
      .map(|(_, gravity)| *gravity)
  }
}
