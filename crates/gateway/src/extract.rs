//! Request extractors

use axum::{
    extract::FromRequest,
    response::{IntoResponse, Response},
};
use paperlens_common::errors::AppError;
use serde::Serialize;

/// JSON body whose rejections use the flat error body with a 400
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}
