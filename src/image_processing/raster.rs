//! Pure Rust codec built on the `image` crate.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;

use super::{Codec, ProcessingError};
use crate::geometry::{Dimensions, Region};

const DEFAULT_QUALITY: u8 = 80;

pub struct RasterImage {
  pixels: DynamicImage,
  format: ImageFormat,
  quality: u8,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RasterCodec;

impl Codec for RasterCodec {
  type Image = RasterImage;

  fn decode(&self, data: &[u8]) -> Result<RasterImage, ProcessingError> {
    let format = image::guess_format(data).map_err(|e| ProcessingError::Decode(e.to_string()))?;
    if !matches!(format, ImageFormat::Png | ImageFormat::Jpeg) {
      return Err(ProcessingError::Decode(format!(
        "unsupported format {}",
        format.to_mime_type()
      )));
    }

    let pixels = image::load_from_memory_with_format(data, format)
      .map_err(|e| ProcessingError::Decode(e.to_string()))?;

    Ok(RasterImage {
      pixels,
      format,
      quality: DEFAULT_QUALITY,
    })
  }

  fn dimensions(&self, image: &RasterImage) -> Dimensions {
    Dimensions::new(image.pixels.width(), image.pixels.height())
  }

  fn resize(&self, mut image: RasterImage, size: Dimensions) -> Result<RasterImage, ProcessingError> {
    if size.width == 0 || size.height == 0 {
      return Err(ProcessingError::Transform(format!("cannot resize to {size}")));
    }

    image.pixels = image
      .pixels
      .resize_exact(size.width, size.height, FilterType::Lanczos3);
    Ok(image)
  }

  fn crop(&self, mut image: RasterImage, region: Region) -> Result<RasterImage, ProcessingError> {
    let out_of_bounds = || {
      ProcessingError::Transform(format!(
        "crop {}+{}+{} outside {}x{}",
        region.size,
        region.origin.x,
        region.origin.y,
        image.pixels.width(),
        image.pixels.height()
      ))
    };

    let x = u32::try_from(region.origin.x).map_err(|_| out_of_bounds())?;
    let y = u32::try_from(region.origin.y).map_err(|_| out_of_bounds())?;
    let right = x.checked_add(region.size.width).ok_or_else(out_of_bounds)?;
    let bottom = y.checked_add(region.size.height).ok_or_else(out_of_bounds)?;

    // crop_imm silently clamps, an out of range region is a planning bug
    if right > image.pixels.width() || bottom > image.pixels.height() {
      return Err(out_of_bounds());
    }

    image.pixels = image
      .pixels
      .crop_imm(x, y, region.size.width, region.size.height);
    Ok(image)
  }

  fn set_quality(&self, image: &mut RasterImage, quality: u8) -> Result<(), ProcessingError> {
    if !(1..=100).contains(&quality) {
      return Err(ProcessingError::Transform(format!(
        "quality {quality} outside 1..=100"
      )));
    }

    image.quality = quality;
    Ok(())
  }

  fn encode(&self, image: &RasterImage) -> Result<Vec<u8>, ProcessingError> {
    let mut buf = Vec::new();

    let res = match image.format {
      ImageFormat::Jpeg => {
        let encoder = JpegEncoder::new_with_quality(&mut buf, image.quality);
        image.pixels.write_with_encoder(encoder)
      }
      // png is lossless, quality does not apply
      format => image.pixels.write_to(&mut Cursor::new(&mut buf), format),
    };

    res.map_err(|e| ProcessingError::Transform(e.to_string()))?;
    Ok(buf)
  }
}
