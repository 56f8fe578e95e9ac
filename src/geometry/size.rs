//! Working size calculations.
//!
//! All arithmetic is integer with truncating division. A zero sized result is
//! reported as [`GeometryError`] rather than handed to the codec.

use super::{Dimensions, GeometryError};

/// Largest box with the source aspect ratio that fits inside `request`.
///
/// A source that already fits inside the request box is returned as is, the
/// image is never upscaled.
pub fn normalize(source: Dimensions, request: Dimensions) -> Result<Dimensions, GeometryError> {
  source.non_zero()?;
  request.non_zero()?;

  if source.fits_within(request) {
    return Ok(source);
  }

  let size = if wide(request.width) * wide(source.height) <= wide(request.height) * wide(source.width)
  {
    // width is the tighter constraint
    Dimensions::new(
      request.width,
      scale(source.height, request.width, source.width),
    )
  } else {
    Dimensions::new(
      scale(source.width, request.height, source.height),
      request.height,
    )
  };

  size.non_zero()
}

/// Largest box with the requested aspect ratio that fits inside both the
/// request and the source. Snaps to `request` when the source is big enough.
pub fn fit_box(source: Dimensions, request: Dimensions) -> Result<Dimensions, GeometryError> {
  source.non_zero()?;
  request.non_zero()?;

  if request.fits_within(source) {
    return Ok(request);
  }

  crop_box(source, request)
}

/// Largest box with the requested aspect ratio that fits inside the source.
///
/// Unlike [`fit_box`] the result may be larger than `request`, it is the area
/// a thumbnail samples before being scaled down to the requested size.
pub fn crop_box(source: Dimensions, request: Dimensions) -> Result<Dimensions, GeometryError> {
  source.non_zero()?;
  request.non_zero()?;

  let size = if wide(source.height) * wide(request.width) <= wide(source.width) * wide(request.height)
  {
    Dimensions::new(
      scale(request.width, source.height, request.height),
      source.height,
    )
  } else {
    Dimensions::new(
      source.width,
      scale(request.height, source.width, request.width),
    )
  };

  size.non_zero()
}

/// Shrinks `request` so neither side exceeds `max_side`, keeping its aspect
/// ratio. `max_side == 0` disables the limit.
pub fn limit(request: Dimensions, max_side: u32) -> Dimensions {
  if max_side == 0 {
    return request;
  }

  let bounded = if request.width > request.height {
    Dimensions::new(max_side, scale(request.height, max_side, request.width))
  } else {
    Dimensions::new(
      scale(request.width, max_side, request.height.max(1)),
      max_side,
    )
  };

  if bounded.width >= request.width && bounded.height >= request.height {
    return request;
  }

  bounded
}

fn wide(value: u32) -> u64 {
  u64::from(value)
}

/// `value * num / den`, truncated.
fn scale(value: u32, num: u32, den: u32) -> u32 {
  let scaled = wide(value) * wide(num) / wide(den);
  u32::try_from(scaled).unwrap_or(u32::MAX)
}
