use axum::{
  extract::{Path, State},
  http::header,
  response::{IntoResponse, Response},
};
use tracing::{debug, error, warn};

use crate::descriptor::{self, OperationKind};
use crate::http::error::AppError;
use crate::http::AppState;
use crate::image_processing::content_type;

#[utoipa::path(
  get,
  path = "/resize/{descriptor}",
  params(
    ("descriptor" = String, Path, description = "`<width>x<height>/<path>`, e.g. `200x200/photos/cat.jpg`")
  ),
  responses(
    (status = 200, description = "Image scaled to fit the box, same type as the source"),
    (status = 400, description = "Bad descriptor, unreadable source or failed transformation", body = String)
  )
)]
pub async fn resize(
  Path(descriptor): Path<String>,
  State(state): State<AppState>,
) -> Result<Response, AppError> {
  transform(OperationKind::Resize, &descriptor, &state).await
}

#[utoipa::path(
  get,
  path = "/crop/{descriptor}",
  params(
    ("descriptor" = String, Path, description = "`<width>x<height>[+<x>+<y>][/<direction>]/<path>`, e.g. `30x150+0+20/northeast/circle.png`")
  ),
  responses(
    (status = 200, description = "Cropped region, same type as the source"),
    (status = 400, description = "Bad descriptor, unreadable source or failed transformation", body = String)
  )
)]
pub async fn crop(
  Path(descriptor): Path<String>,
  State(state): State<AppState>,
) -> Result<Response, AppError> {
  transform(OperationKind::Crop, &descriptor, &state).await
}

#[utoipa::path(
  get,
  path = "/thumbnail/{descriptor}",
  params(
    ("descriptor" = String, Path, description = "`<width>x<height>[/<direction>]/<path>`, e.g. `78x110/photo.jpg`")
  ),
  responses(
    (status = 200, description = "Thumbnail filling the requested box, same type as the source"),
    (status = 400, description = "Bad descriptor, unreadable source or failed transformation", body = String)
  )
)]
pub async fn thumbnail(
  Path(descriptor): Path<String>,
  State(state): State<AppState>,
) -> Result<Response, AppError> {
  transform(OperationKind::Thumbnail, &descriptor, &state).await
}

async fn transform(
  kind: OperationKind,
  descriptor: &str,
  state: &AppState,
) -> Result<Response, AppError> {
  let res = run(kind, descriptor, state).await;
  if let Err(e) = &res {
    warn!("{} {} failed: {}", kind, descriptor, e);
  }
  res
}

async fn run(kind: OperationKind, descriptor: &str, state: &AppState) -> Result<Response, AppError> {
  let request = descriptor::parse(kind, descriptor)?;
  debug!(?request, "parsed descriptor");

  let data = state
    .storage_client
    .read_file(&request.source_path)
    .await
    .map_err(|e| AppError::Backend(format!("{:#}", e)))?;

  // Sniff the bytes, the extension was only checked by the parser
  let mime = content_type::ensure_allowed(&data)?;

  // Run the image transformation in a thread from the thread pool
  let operation = request.operation();
  let transformer = state.transformer.clone();
  let (send, recv) = tokio::sync::oneshot::channel();
  rayon::spawn(move || {
    let _ = send.send(transformer.apply(&data, &operation));
  });

  let body = recv.await.map_err(|e| {
    error!("failed to receive: {}", e);
    AppError::InternalServerError(e.to_string())
  })??;

  Ok(([(header::CONTENT_TYPE, mime)], body).into_response())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::descriptor::Operation;
  use crate::http::storage::Storage;
  use crate::image_processing::{ProcessingError, Transform};
  use anyhow::{anyhow, Result};
  use async_trait::async_trait;
  use axum::http::StatusCode;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Arc;

  const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

  struct FixedStorage {
    data: Option<Vec<u8>>,
    reads: AtomicUsize,
  }

  #[async_trait]
  impl Storage for FixedStorage {
    async fn read_file(&self, key: &str) -> Result<Vec<u8>> {
      self.reads.fetch_add(1, Ordering::SeqCst);
      self
        .data
        .clone()
        .ok_or_else(|| anyhow!("no such object: {}", key))
    }
  }

  #[derive(Default)]
  struct CountingTransform {
    calls: AtomicUsize,
  }

  impl Transform for CountingTransform {
    fn apply(&self, _data: &[u8], _operation: &Operation) -> Result<Vec<u8>, ProcessingError> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      Ok(b"out".to_vec())
    }
  }

  fn state(data: Option<&[u8]>) -> (AppState, Arc<FixedStorage>, Arc<CountingTransform>) {
    let storage = Arc::new(FixedStorage {
      data: data.map(|d| d.to_vec()),
      reads: AtomicUsize::new(0),
    });
    let transformer = Arc::new(CountingTransform::default());
    let state = AppState {
      storage_client: storage.clone(),
      transformer: transformer.clone(),
    };
    (state, storage, transformer)
  }

  #[tokio::test]
  async fn backend_failure_skips_transform() {
    let (state, storage, transformer) = state(None);

    let err = resize(Path("10x10/missing.png".to_owned()), State(state))
      .await
      .unwrap_err();

    assert!(matches!(&err, AppError::Backend(msg) if msg.contains("missing.png")));
    assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    assert_eq!(storage.reads.load(Ordering::SeqCst), 1);
    assert_eq!(transformer.calls.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn bad_extension_skips_storage() {
    let (state, storage, _) = state(Some(PNG_MAGIC));

    let err = crop(Path("10x10/anim.gif".to_owned()), State(state))
      .await
      .unwrap_err();

    assert!(matches!(err, AppError::Parse(_)));
    assert_eq!(storage.reads.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn non_image_payload_skips_transform() {
    let (state, _, transformer) = state(Some(b"just some text"));

    let err = thumbnail(Path("10x10/fake.png".to_owned()), State(state))
      .await
      .unwrap_err();

    assert!(matches!(err, AppError::ContentType(_)));
    assert_eq!(transformer.calls.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn success_uses_sniffed_content_type() {
    let (state, _, transformer) = state(Some(PNG_MAGIC));

    // extension says jpg, bytes say png
    let response = thumbnail(Path("10x10/photo.jpg".to_owned()), State(state))
      .await
      .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
      response.headers()[header::CONTENT_TYPE],
      "image/png"
    );
    assert_eq!(transformer.calls.load(Ordering::SeqCst), 1);
  }
}
