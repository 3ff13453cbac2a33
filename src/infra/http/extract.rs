//! Extractors whose rejections surface as `AppError::Validation`, so malformed
//! bodies, query strings and path ids get the same JSON error body and
//! `ErrorReport` as every other failure.

use axum::extract::{FromRequest, FromRequestParts, Path, Query};
use axum::Json;

use crate::application::error::AppError;

#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);
