//! Request extractors that report failures in the standard error format

use axum::extract::FromRequest;

use crate::error::AppError;

/// JSON body extractor whose rejections render as [`AppError`]
#[derive(Debug, Clone, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);
