use crate::http::storage::Storage;
use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tracing::debug;

pub struct Client {
  s3_client: aws_sdk_s3::Client,
  bucket: String,
}

impl Client {
  pub fn new(s3_client: aws_sdk_s3::Client, bucket: &str) -> Self {
    Self {
      s3_client,
      bucket: bucket.to_owned(),
    }
  }
}

#[async_trait]
impl Storage for Client {
  async fn read_file(&self, key: &str) -> Result<Vec<u8>> {
    let trimmed = key.trim_start_matches('/');

    debug!(
      "downloading object: {} from bucket: {}",
      trimmed, self.bucket
    );

    let object = self
      .s3_client
      .get_object()
      .bucket(self.bucket.as_str())
      .key(trimmed)
      .send()
      .await
      .with_context(|| format!("failed to download object: {}", trimmed))?;

    let capacity = object
      .content_length
      .and_then(|len| usize::try_from(len).ok())
      .unwrap_or_default();
    let mut data = Vec::with_capacity(capacity);
    object
      .body
      .into_async_read()
      .read_to_end(&mut data)
      .await
      .with_context(|| format!("failed to read object body: {}", trimmed))?;

    Ok(data)
  }
}
