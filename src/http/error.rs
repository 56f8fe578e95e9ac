use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::descriptor::ParseError;
use crate::image_processing::content_type::ContentTypeError;
use crate::image_processing::ProcessingError;

#[derive(Error, Debug)]
pub enum AppError {
  #[error(transparent)]
  Parse(#[from] ParseError),
  #[error("{0}")]
  Backend(String),
  #[error(transparent)]
  ContentType(#[from] ContentTypeError),
  #[error(transparent)]
  Processing(#[from] ProcessingError),
  #[error("internal server error {0}")]
  InternalServerError(String),
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    match self {
      AppError::InternalServerError(_msg) => {
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
      }
      err => (StatusCode::BAD_REQUEST, err.to_string()).into_response(),
    }
  }
}
