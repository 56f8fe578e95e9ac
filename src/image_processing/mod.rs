//! Plans and runs resize, crop and thumbnail operations against a [`Codec`].

use thiserror::Error;
use tracing::debug;

use crate::descriptor::Operation;
use crate::geometry::{self, Dimensions, GeometryError, Gravity, Offset, Region};

pub mod codec;
pub mod content_type;
pub mod raster;
#[cfg(feature = "vips")]
pub mod vips;

pub use codec::Codec;

#[derive(Error, Debug)]
pub enum ProcessingError {
  #[error("failed to decode image: {0}")]
  Decode(String),
  #[error(transparent)]
  Geometry(#[from] GeometryError),
  #[error("failed to transform image: {0}")]
  Transform(String),
}

#[derive(Debug, Clone, Copy)]
pub struct TransformOptions {
  /// Compression quality handed to the encoder.
  pub quality: u8,
  /// Longest side a request may ask for, 0 for no limit.
  pub max_output_size: u32,
}

impl Default for TransformOptions {
  fn default() -> Self {
    Self {
      quality: 80,
      max_output_size: 2000,
    }
  }
}

/// Object safe entry point for the HTTP layer, which picks a codec once at
/// startup.
pub trait Transform: Send + Sync {
  fn apply(&self, data: &[u8], operation: &Operation) -> Result<Vec<u8>, ProcessingError>;
}

pub struct Transformer<C> {
  codec: C,
  options: TransformOptions,
}

impl<C: Codec> Transformer<C> {
  pub fn new(codec: C, options: TransformOptions) -> Self {
    Self { codec, options }
  }

  pub fn resize(&self, data: &[u8], request: Dimensions) -> Result<Vec<u8>, ProcessingError> {
    let image = self.codec.decode(data)?;
    let source = self.codec.dimensions(&image);

    let size = geometry::normalize(source, self.bounded(request))?;
    debug!(%source, %request, %size, "resize");

    let image = self.codec.resize(image, size)?;
    self.finish(image)
  }

  pub fn crop(
    &self,
    data: &[u8],
    request: Dimensions,
    offset: Offset,
    gravity: Gravity,
  ) -> Result<Vec<u8>, ProcessingError> {
    let image = self.codec.decode(data)?;
    let source = self.codec.dimensions(&image);

    let size = geometry::fit_box(source, self.bounded(request))?;
    let origin = geometry::resolve_offset(source, size, gravity, offset);
    debug!(%source, %request, %size, x = origin.x, y = origin.y, ?gravity, "crop");

    let image = self.codec.crop(image, Region { origin, size })?;
    self.finish(image)
  }

  /// Crops the largest area with the requested aspect ratio, then scales it
  /// down to the requested box.
  pub fn thumbnail(
    &self,
    data: &[u8],
    request: Dimensions,
    gravity: Gravity,
  ) -> Result<Vec<u8>, ProcessingError> {
    let image = self.codec.decode(data)?;
    let source = self.codec.dimensions(&image);

    let target = geometry::fit_box(source, self.bounded(request))?;
    let crop = geometry::crop_box(source, request)?;
    let origin = geometry::resolve_offset(source, crop, gravity, Offset::default());
    debug!(%source, %request, %crop, %target, x = origin.x, y = origin.y, ?gravity, "thumbnail");

    let image = self.codec.crop(image, Region { origin, size: crop })?;
    let image = self.codec.resize(image, target)?;
    self.finish(image)
  }

  fn bounded(&self, request: Dimensions) -> Dimensions {
    geometry::limit(request, self.options.max_output_size)
  }

  fn finish(&self, mut image: C::Image) -> Result<Vec<u8>, ProcessingError> {
    self.codec.set_quality(&mut image, self.options.quality)?;
    self.codec.encode(&image)
  }
}

impl<C: Codec> Transform for Transformer<C> {
  fn apply(&self, data: &[u8], operation: &Operation) -> Result<Vec<u8>, ProcessingError> {
    match *operation {
      Operation::Resize { size } => self.resize(data, size),
      Operation::Crop {
        size,
        offset,
        gravity,
      } => self.crop(data, size, offset, gravity),
      Operation::Thumbnail { size, gravity } => self.thumbnail(data, size, gravity),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::geometry::Point;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::{Arc, Mutex};

  #[derive(Debug, Clone, PartialEq)]
  enum Call {
    Resize(Dimensions),
    Crop(Region),
    Quality(u8),
    Encode,
  }

  #[derive(Debug, Clone, Copy, PartialEq)]
  enum Step {
    Resize,
    Crop,
    Encode,
  }

  /// Decodes `b"<w>x<h>"` into a fake handle and records every call.
  #[derive(Default)]
  struct RecordingCodec {
    calls: Mutex<Vec<Call>>,
    live: Arc<AtomicUsize>,
    fail_on: Option<Step>,
  }

  struct FakeImage {
    size: Dimensions,
    live: Arc<AtomicUsize>,
  }

  impl Drop for FakeImage {
    fn drop(&mut self) {
      self.live.fetch_sub(1, Ordering::SeqCst);
    }
  }

  impl RecordingCodec {
    fn failing(step: Step) -> Self {
      Self {
        fail_on: Some(step),
        ..Self::default()
      }
    }

    fn record(&self, call: Call) {
      self.calls.lock().unwrap().push(call);
    }

    fn check(&self, step: Step) -> Result<(), ProcessingError> {
      if self.fail_on == Some(step) {
        return Err(ProcessingError::Transform(format!("{step:?} failed")));
      }
      Ok(())
    }
  }

  impl Codec for RecordingCodec {
    type Image = FakeImage;

    fn decode(&self, data: &[u8]) -> Result<FakeImage, ProcessingError> {
      let text = std::str::from_utf8(data).map_err(|e| ProcessingError::Decode(e.to_string()))?;
      let (w, h) = text
        .split_once('x')
        .ok_or_else(|| ProcessingError::Decode("not an image".to_owned()))?;
      let size = Dimensions::new(
        w.parse().map_err(|_| ProcessingError::Decode(w.to_owned()))?,
        h.parse().map_err(|_| ProcessingError::Decode(h.to_owned()))?,
      );

      self.live.fetch_add(1, Ordering::SeqCst);
      Ok(FakeImage {
        size,
        live: self.live.clone(),
      })
    }

    fn dimensions(&self, image: &FakeImage) -> Dimensions {
      image.size
    }

    fn resize(&self, mut image: FakeImage, size: Dimensions) -> Result<FakeImage, ProcessingError> {
      self.record(Call::Resize(size));
      self.check(Step::Resize)?;
      image.size = size;
      Ok(image)
    }

    fn crop(&self, mut image: FakeImage, region: Region) -> Result<FakeImage, ProcessingError> {
      self.record(Call::Crop(region));
      self.check(Step::Crop)?;
      image.size = region.size;
      Ok(image)
    }

    fn set_quality(&self, _image: &mut FakeImage, quality: u8) -> Result<(), ProcessingError> {
      self.record(Call::Quality(quality));
      Ok(())
    }

    fn encode(&self, image: &FakeImage) -> Result<Vec<u8>, ProcessingError> {
      self.record(Call::Encode);
      self.check(Step::Encode)?;
      Ok(image.size.to_string().into_bytes())
    }
  }

  fn transformer(codec: RecordingCodec) -> Transformer<RecordingCodec> {
    Transformer::new(codec, TransformOptions::default())
  }

  fn calls(t: &Transformer<RecordingCodec>) -> Vec<Call> {
    t.codec.calls.lock().unwrap().clone()
  }

  fn live(t: &Transformer<RecordingCodec>) -> usize {
    t.codec.live.load(Ordering::SeqCst)
  }

  #[test]
  fn resize_normalizes_then_resizes_once() {
    let t = transformer(RecordingCodec::default());
    let out = t.resize(b"400x300", Dimensions::new(200, 200)).unwrap();

    assert_eq!(out, b"200x150");
    assert_eq!(
      calls(&t),
      vec![
        Call::Resize(Dimensions::new(200, 150)),
        Call::Quality(80),
        Call::Encode
      ]
    );
    assert_eq!(live(&t), 0);
  }

  #[test]
  fn crop_applies_gravity_and_offset() {
    let t = transformer(RecordingCodec::default());
    let out = t
      .crop(
        b"400x300",
        Dimensions::new(100, 50),
        Offset { x: 10, y: 10 },
        Gravity::Unspecified,
      )
      .unwrap();

    assert_eq!(out, b"100x50");
    assert_eq!(
      calls(&t)[0],
      Call::Crop(Region {
        origin: Point { x: 160, y: 135 },
        size: Dimensions::new(100, 50),
      })
    );
  }

  #[test]
  fn crop_larger_than_source_is_shrunk() {
    let t = transformer(RecordingCodec::default());
    t.crop(
      b"300x300",
      Dimensions::new(600, 300),
      Offset { x: 50, y: 0 },
      Gravity::NorthWest,
    )
    .unwrap();

    assert_eq!(
      calls(&t)[0],
      Call::Crop(Region {
        origin: Point { x: 0, y: 0 },
        size: Dimensions::new(300, 150),
      })
    );
  }

  #[test]
  fn thumbnail_crops_then_resizes() {
    let t = transformer(RecordingCodec::default());
    let out = t
      .thumbnail(b"400x300", Dimensions::new(78, 110), Gravity::NorthEast)
      .unwrap();

    assert_eq!(out, b"78x110");
    assert_eq!(
      calls(&t),
      vec![
        Call::Crop(Region {
          origin: Point { x: 188, y: 0 },
          size: Dimensions::new(212, 300),
        }),
        Call::Resize(Dimensions::new(78, 110)),
        Call::Quality(80),
        Call::Encode,
      ]
    );
    assert_eq!(live(&t), 0);
  }

  #[test]
  fn thumbnail_center_matches_unspecified() {
    let center = transformer(RecordingCodec::default());
    let unspecified = transformer(RecordingCodec::default());

    center
      .thumbnail(b"400x300", Dimensions::new(78, 110), Gravity::Center)
      .unwrap();
    unspecified
      .thumbnail(b"400x300", Dimensions::new(78, 110), Gravity::Unspecified)
      .unwrap();

    assert_eq!(calls(&center), calls(&unspecified));
  }

  #[test]
  fn thumbnail_never_upscales() {
    let t = transformer(RecordingCodec::default());
    let out = t
      .thumbnail(b"100x100", Dimensions::new(400, 200), Gravity::Unspecified)
      .unwrap();

    assert_eq!(out, b"100x50");
  }

  #[test]
  fn max_output_size_bounds_request() {
    let t = Transformer::new(
      RecordingCodec::default(),
      TransformOptions {
        quality: 90,
        max_output_size: 100,
      },
    );
    let out = t.resize(b"4000x3000", Dimensions::new(400, 400)).unwrap();

    assert_eq!(out, b"100x75");
    assert_eq!(calls(&t)[1], Call::Quality(90));
  }

  #[test]
  fn zero_sized_geometry_is_rejected_before_resize() {
    let t = transformer(RecordingCodec::default());
    let err = t.resize(b"5000x1", Dimensions::new(10, 10)).unwrap_err();

    assert!(matches!(err, ProcessingError::Geometry(_)));
    assert!(calls(&t).is_empty());
    assert_eq!(live(&t), 0);
  }

  #[test]
  fn decode_failure_issues_no_calls() {
    let t = transformer(RecordingCodec::default());
    let err = t.resize(b"garbage", Dimensions::new(10, 10)).unwrap_err();

    assert!(matches!(err, ProcessingError::Decode(_)));
    assert!(calls(&t).is_empty());
  }

  #[test]
  fn handles_are_released_on_failure() {
    for step in [Step::Resize, Step::Crop, Step::Encode] {
      let t = transformer(RecordingCodec::failing(step));
      let err = t
        .thumbnail(b"400x300", Dimensions::new(50, 50), Gravity::South)
        .unwrap_err();

      assert!(matches!(err, ProcessingError::Transform(_)), "{step:?}");
      assert_eq!(live(&t), 0, "{step:?}");
    }
  }

  #[test]
  fn apply_dispatches_on_operation() {
    let t = transformer(RecordingCodec::default());
    let out = t
      .apply(
        b"400x300",
        &Operation::Thumbnail {
          size: Dimensions::new(40, 30),
          gravity: Gravity::Unspecified,
        },
      )
      .unwrap();

    assert_eq!(out, b"40x30");
  }
}
