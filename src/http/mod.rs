use anyhow::{anyhow, Context, Result};
use axum::{
  extract::{MatchedPath, Request},
  middleware::{self, Next},
  response::IntoResponse,
  routing::get,
  Router,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::any::Any;
use std::future::ready;
use std::{path::Path, sync::Arc};
use tokio::signal;
use tokio::time::{Duration, Instant};
use tower_http::{
  catch_panic::CatchPanicLayer,
  timeout::TimeoutLayer,
  trace::{self, TraceLayer},
};
use tracing::{error, info, warn, Level};
use utoipa::OpenApi;
use utoipa_redoc::{Redoc, Servable};

use crate::config::{CodecType, Config, StorageType};
use crate::image_processing::{raster::RasterCodec, Transform, TransformOptions, Transformer};

mod error;
mod local_storage;
mod s3;
pub mod storage;
mod transform_image;

const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(OpenApi)]
#[openapi(
  paths(
    transform_image::resize,
    transform_image::crop,
    transform_image::thumbnail
  ),
  info(
    title = "Rusty Filter API",
    version = "0.1.0",
    description = "Resizes, crops and thumbnails stored images on request"
  )
)]
struct ApiDoc;

#[derive(Clone)]
struct AppState {
  storage_client: Arc<dyn storage::Storage>,
  transformer: Arc<dyn Transform>,
}

pub fn bootstrap(cfg: &Config) -> Result<Router> {
  if let Err(e) = worker_pool().build_global() {
    warn!("transform pool already initialized: {}", e);
  }

  let state = AppState {
    storage_client: storage_client(cfg)?,
    transformer: transformer(cfg)?,
  };

  // Routing
  let mut app = Router::new()
    .route("/resize/*descriptor", get(transform_image::resize))
    .route("/crop/*descriptor", get(transform_image::crop))
    .route("/thumbnail/*descriptor", get(transform_image::thumbnail))
    .with_state(state);

  // Conditionally add OpenAPI routes if enabled
  if cfg.app.enable_openapi.unwrap_or(false) {
    let spec =
      serde_json::to_value(ApiDoc::openapi()).context("failed to serialize openapi document")?;
    app = app.merge(Redoc::with_url("/redoc", spec)).route(
      "/api-docs/openapi.json",
      get(|| async { axum::Json(ApiDoc::openapi()) }),
    );
  }

  let timeout = cfg.app.request_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
  let app = app.layer((
    middleware::from_fn(track_metrics),
    TraceLayer::new_for_http()
      .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
      .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
    TimeoutLayer::new(Duration::from_secs(timeout)),
    CatchPanicLayer::new(),
  ));

  Ok(app)
}

/// Pool running the image transformations. A panicking job is logged and its
/// result channel dropped, so the request fails without taking the process down.
fn worker_pool() -> rayon::ThreadPoolBuilder {
  rayon::ThreadPoolBuilder::new()
    .thread_name(|i| format!("transform-{}", i))
    .panic_handler(|panic| error!("transform worker panicked: {}", panic_message(&*panic)))
}

fn panic_message<'a>(panic: &'a (dyn Any + Send + 'static)) -> &'a str {
  if let Some(msg) = panic.downcast_ref::<&str>() {
    *msg
  } else if let Some(msg) = panic.downcast_ref::<String>() {
    msg.as_str()
  } else {
    "unknown panic"
  }
}

fn storage_client(cfg: &Config) -> Result<Arc<dyn storage::Storage>> {
  match cfg.storage.storage_type {
    StorageType::Local => {
      let local = cfg
        .storage
        .local
        .as_ref()
        .ok_or_else(|| anyhow!("local storage config is missing"))?;
      info!("serving images from {}", local.path);
      Ok(Arc::new(local_storage::Client::new(
        Path::new(&local.path).to_path_buf(),
      )))
    }
    StorageType::S3 => {
      let storage_config = match &cfg.storage.s3 {
        Some(s3) => s3,
        None => return Err(anyhow!("S3 storage config is missing")),
      };

      let cred = aws_sdk_s3::config::Credentials::new(
        storage_config.access_key_id.clone(),
        storage_config.secret_access_key.clone(),
        None,
        None,
        "loaded-from-custom-env",
      );

      let s3_config = aws_sdk_s3::config::Builder::new()
        .endpoint_url(storage_config.endpoint.clone())
        .credentials_provider(cred)
        .region(aws_sdk_s3::config::Region::new(
          storage_config.region.clone(),
        ))
        .force_path_style(storage_config.force_path_style) // apply bucketname as path param instead of pre-domain
        .behavior_version_latest()
        .build();

      let client = aws_sdk_s3::Client::from_conf(s3_config);
      info!("serving images from bucket {}", storage_config.bucket);
      Ok(Arc::new(s3::Client::new(client, &storage_config.bucket)))
    }
  }
}

fn transformer(cfg: &Config) -> Result<Arc<dyn Transform>> {
  let options = TransformOptions {
    quality: cfg.image.quality,
    max_output_size: cfg.image.max_output_size,
  };

  match cfg.image.codec {
    CodecType::Raster => Ok(Arc::new(Transformer::new(RasterCodec, options))),
    #[cfg(feature = "vips")]
    CodecType::Vips => {
      let codec = crate::image_processing::vips::VipsCodec::new(cfg.image.vips_concurrency)?;
      Ok(Arc::new(Transformer::new(codec, options)))
    }
    #[cfg(not(feature = "vips"))]
    CodecType::Vips => Err(anyhow!(
      "libvips codec requested but the binary was built without the vips feature"
    )),
  }
}

pub async fn serve(router: Router, listen: &str) {
  // Start HTTP server
  let listener = tokio::net::TcpListener::bind(listen)
    .await
    .expect("failed to bind to address");
  info!("listening on {}", listen);
  axum::serve(listener, router)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("error running HTTP server");
}

async fn healthz() -> &'static str {
  "pong"
}

async fn shutdown_signal() {
  let ctrl_c = async {
    signal::ctrl_c()
      .await
      .expect("failed to install Ctrl+C handler");
  };

  #[cfg(unix)]
  let terminate = async {
    signal::unix::signal(signal::unix::SignalKind::terminate())
      .expect("failed to install signal handler")
      .recv()
      .await;
  };

  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
      _ = ctrl_c => {},
      _ = terminate => {},
  }
}

pub async fn serve_metrics(listen: &str) {
  let app = metrics_app();

  let listener = tokio::net::TcpListener::bind(listen)
    .await
    .expect("failed to bind to address");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("error running metrics HTTP server");
}

fn metrics_app() -> Router {
  let recorder_handle = setup_metrics_recorder();
  Router::new()
    .route("/metrics", get(move || ready(recorder_handle.render())))
    .route("/healthz", get(healthz))
}

fn setup_metrics_recorder() -> PrometheusHandle {
  const EXPONENTIAL_SECONDS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
  ];

  PrometheusBuilder::new()
    .set_buckets_for_metric(
      Matcher::Full("http_requests_duration_seconds".to_string()),
      EXPONENTIAL_SECONDS,
    )
    .expect("invalid histogram buckets")
    .install_recorder()
    .expect("failed to install metrics recorder")
}

async fn track_metrics(req: Request, next: Next) -> impl IntoResponse {
  let start = Instant::now();
  let path = if let Some(matched_path) = req.extensions().get::<MatchedPath>() {
    matched_path.as_str().to_owned()
  } else {
    req.uri().path().to_owned()
  };
  let method = req.method().clone();

  let response = next.run(req).await;

  let latency = start.elapsed().as_secs_f64();
  let status = response.status().as_u16().to_string();

  let labels = [
    ("method", method.to_string()),
    ("path", path),
    ("status", status),
  ];

  metrics::counter!("http_requests_total", &labels).increment(1);
  metrics::histogram!("http_requests_duration_seconds", &labels).record(latency);

  response
}
