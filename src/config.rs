use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageType {
  Local,
  S3,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CodecType {
  #[default]
  Raster,
  Vips,
}

#[derive(Deserialize, Debug)]
pub struct Config {
  pub app: AppConfig,
  #[serde(default)]
  pub image: ImageConfig,
  pub storage: StorageConfig,
}

#[derive(Deserialize, Debug)]
pub struct AppConfig {
  pub listen: String,
  pub metrics_listen: String,
  pub request_timeout_secs: Option<u64>,
  pub enable_openapi: Option<bool>,
}

#[derive(Deserialize, Debug)]
pub struct ImageConfig {
  #[serde(default)]
  pub codec: CodecType,
  #[serde(default = "default_quality")]
  pub quality: u8,
  #[serde(default = "default_max_output_size")]
  pub max_output_size: u32,
  #[serde(default)]
  pub vips_concurrency: i32,
}

impl Default for ImageConfig {
  fn default() -> Self {
    Self {
      codec: CodecType::default(),
      quality: default_quality(),
      max_output_size: default_max_output_size(),
      vips_concurrency: 0,
    }
  }
}

fn default_quality() -> u8 {
  80
}

fn default_max_output_size() -> u32 {
  2000
}

#[derive(Deserialize, Debug)]
pub struct StorageConfig {
  pub storage_type: StorageType,
  pub s3: Option<StorageConfigS3>,
  pub local: Option<StorageConfigLocal>,
}

#[derive(Deserialize, Debug)]
pub struct StorageConfigS3 {
  pub endpoint: String,
  pub bucket: String,
  pub access_key_id: String,
  pub secret_access_key: String,
  pub region: String,
  pub force_path_style: bool,
}

#[derive(Deserialize, Debug)]
pub struct StorageConfigLocal {
  pub path: String,
}

pub fn parse(config_path: &str) -> Result<Config> {
  let toml_str = fs::read_to_string(config_path)
    .with_context(|| format!("failed to read config file {}", config_path))?;

  from_str(&toml_str)
}

pub fn from_str(toml_str: &str) -> Result<Config> {
  let cfg: Config = toml::from_str(toml_str).context("failed to deserialize config")?;
  cfg.validate()?;
  Ok(cfg)
}

impl Config {
  fn validate(&self) -> Result<()> {
    if !(1..=100).contains(&self.image.quality) {
      bail!(
        "image quality {} is outside 1..=100",
        self.image.quality
      );
    }

    Ok(())
  }
}
