use super::{Dimensions, Gravity, Offset, Point};

/// Resolves the top-left corner of `region` inside `source`.
///
/// The gravity picks a base point, the manual offset shifts it, and the result
/// is pulled back so the region does not run past the right/bottom edge
/// before being floored at zero. The region is expected to fit inside the
/// source; this is not re-checked here.
pub fn resolve_offset(
  source: Dimensions,
  region: Dimensions,
  gravity: Gravity,
  offset: Offset,
) -> Point {
  let (sw, sh) = (i64::from(source.width), i64::from(source.height));
  let (rw, rh) = (i64::from(region.width), i64::from(region.height));

  let left = 0;
  let center = (sw - rw) / 2;
  let right = sw - rw;
  let top = 0;
  let middle = (sh - rh) / 2;
  let bottom = sh - rh;

  let (mut x, mut y) = match gravity {
    Gravity::NorthWest => (left, top),
    Gravity::North => (center, top),
    Gravity::NorthEast => (right, top),
    Gravity::West => (left, middle),
    Gravity::Center | Gravity::Unspecified => (center, middle),
    Gravity::East => (right, middle),
    Gravity::SouthWest => (left, bottom),
    Gravity::South => (center, bottom),
    Gravity::SouthEast => (right, bottom),
  };

  x += i64::from(offset.x);
  y += i64::from(offset.y);

  x -= (x + rw - sw).max(0);
  y -= (y + rh - sh).max(0);

  Point {
    x: x.max(0),
    y: y.max(0),
  }
}
