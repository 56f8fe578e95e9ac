use crate::geometry::{Dimensions, Region};

use super::ProcessingError;

/// Pixel level capability the transformer drives.
///
/// A decoded `Image` owns whatever the backing library allocated for it and
/// gives it back when dropped, so every early return releases it.
pub trait Codec: Send + Sync {
  type Image;

  fn decode(&self, data: &[u8]) -> Result<Self::Image, ProcessingError>;

  fn dimensions(&self, image: &Self::Image) -> Dimensions;

  /// Resamples to exactly `size`.
  fn resize(&self, image: Self::Image, size: Dimensions) -> Result<Self::Image, ProcessingError>;

  fn crop(&self, image: Self::Image, region: Region) -> Result<Self::Image, ProcessingError>;

  /// Compression quality in `1..=100`, used by lossy encoders.
  fn set_quality(&self, image: &mut Self::Image, quality: u8) -> Result<(), ProcessingError>;

  /// Encodes in the format the image was decoded from.
  fn encode(&self, image: &Self::Image) -> Result<Vec<u8>, ProcessingError>;
}
