use std::path::{Component, Path, PathBuf};

use crate::http::storage::Storage;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tracing::debug;

pub struct Client {
  path: PathBuf,
}

impl Client {
  pub fn new(path: PathBuf) -> Self {
    Self { path }
  }
}

#[async_trait]
impl Storage for Client {
  async fn read_file(&self, key: &str) -> Result<Vec<u8>> {
    let relative = Path::new(key);
    if relative
      .components()
      .any(|c| !matches!(c, Component::Normal(_)))
    {
      bail!("invalid file path: {}", key);
    }

    let file_path = self.path.join(relative);
    debug!("reading file: {}", file_path.display());

    let mut file = tokio::fs::File::open(&file_path)
      .await
      .with_context(|| format!("failed to open file: {}", key))?;

    let mut data = Vec::new();
    file
      .read_to_end(&mut data)
      .await
      .with_context(|| format!("failed to read file: {}", key))?;

    Ok(data)
  }
}
