//! libvips backed codec, enabled with the `vips` feature.

use anyhow::{anyhow, Result};
use image::ImageFormat;
use libvips::{ops, VipsApp, VipsImage};

use super::{Codec, ProcessingError};
use crate::geometry::{Dimensions, Region};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceFormat {
  Jpeg,
  Png,
}

pub struct VipsHandle {
  image: VipsImage,
  format: SourceFormat,
  quality: i32,
  // libvips may keep pointing into the buffer it loaded from
  _buffer: Vec<u8>,
}

/// Owns the libvips runtime; it is shut down when the codec is dropped.
pub struct VipsCodec {
  app: VipsApp,
}

impl VipsCodec {
  pub fn new(concurrency: i32) -> Result<Self> {
    let app = VipsApp::new("rusty-filter", false)
      .map_err(|e| anyhow!("cannot initialize libvips: {}", e))?;

    if concurrency > 0 {
      app.concurrency_set(concurrency);
    }

    // Outputs are never reused, keep libvips from caching them
    app.cache_set_max_mem(0);
    app.cache_set_max(0);
    app.cache_set_max_files(0);

    Ok(Self { app })
  }

  fn describe(&self, err: libvips::error::Error) -> String {
    format!("{} {}", err, self.app.error_buffer().unwrap_or(""))
      .trim_end()
      .to_owned()
  }
}

/// Output format follows the sniffed source bytes.
fn source_format(data: &[u8]) -> Result<SourceFormat, ProcessingError> {
  match image::guess_format(data) {
    Ok(ImageFormat::Jpeg) => Ok(SourceFormat::Jpeg),
    Ok(ImageFormat::Png) => Ok(SourceFormat::Png),
    Ok(other) => Err(ProcessingError::Decode(format!(
      "unsupported format {}",
      other.to_mime_type()
    ))),
    Err(e) => Err(ProcessingError::Decode(e.to_string())),
  }
}

fn to_i32(value: i64) -> Result<i32, ProcessingError> {
  i32::try_from(value).map_err(|_| ProcessingError::Transform(format!("{value} out of range")))
}

impl Codec for VipsCodec {
  type Image = VipsHandle;

  fn decode(&self, data: &[u8]) -> Result<VipsHandle, ProcessingError> {
    let format = source_format(data)?;
    let buffer = data.to_vec();
    let image = VipsImage::new_from_buffer(&buffer, "")
      .map_err(|e| ProcessingError::Decode(self.describe(e)))?;

    Ok(VipsHandle {
      image,
      format,
      quality: 80,
      _buffer: buffer,
    })
  }

  fn dimensions(&self, handle: &VipsHandle) -> Dimensions {
    Dimensions::new(
      handle.image.get_width().max(0) as u32,
      handle.image.get_height().max(0) as u32,
    )
  }

  fn resize(&self, mut handle: VipsHandle, size: Dimensions) -> Result<VipsHandle, ProcessingError> {
    let source = self.dimensions(&handle);
    if source.width == 0 || source.height == 0 || size.width == 0 || size.height == 0 {
      return Err(ProcessingError::Transform(format!(
        "cannot resize {source} to {size}"
      )));
    }

    let hscale = f64::from(size.width) / f64::from(source.width);
    let vscale = f64::from(size.height) / f64::from(source.height);

    handle.image = ops::resize_with_opts(
      &handle.image,
      hscale,
      &ops::ResizeOptions {
        vscale,
        kernel: ops::Kernel::Lanczos3,
        ..ops::ResizeOptions::default()
      },
    )
    .map_err(|e| ProcessingError::Transform(self.describe(e)))?;

    Ok(handle)
  }

  fn crop(&self, mut handle: VipsHandle, region: Region) -> Result<VipsHandle, ProcessingError> {
    handle.image = ops::extract_area(
      &handle.image,
      to_i32(region.origin.x)?,
      to_i32(region.origin.y)?,
      to_i32(i64::from(region.size.width))?,
      to_i32(i64::from(region.size.height))?,
    )
    .map_err(|e| ProcessingError::Transform(self.describe(e)))?;

    Ok(handle)
  }

  fn set_quality(&self, handle: &mut VipsHandle, quality: u8) -> Result<(), ProcessingError> {
    if !(1..=100).contains(&quality) {
      return Err(ProcessingError::Transform(format!(
        "quality {quality} outside 1..=100"
      )));
    }

    handle.quality = i32::from(quality);
    Ok(())
  }

  fn encode(&self, handle: &VipsHandle) -> Result<Vec<u8>, ProcessingError> {
    let res = match handle.format {
      SourceFormat::Jpeg => ops::jpegsave_buffer_with_opts(
        &handle.image,
        &ops::JpegsaveBufferOptions {
          q: handle.quality,
          ..ops::JpegsaveBufferOptions::default()
        },
      ),
      SourceFormat::Png => ops::pngsave_buffer(&handle.image),
    };

    res.map_err(|e| ProcessingError::Transform(self.describe(e)))
  }
}
