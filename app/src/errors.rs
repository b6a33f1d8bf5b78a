use std::fmt;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use err_derive::Error;
use log::*;
use serde::Serialize;

use crate::auth::AuthError;

/// Every failure a handler can report. Anything not listed here is folded
/// into `Unprocessable` after being logged.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error(display = "Resource not found")]
    NotFound,
    #[error(display = "Unprocessable")]
    Unprocessable,
    #[error(display = "Method not allowed")]
    MethodNotAllowed,
    #[error(display = "{}", _0)]
    Auth(AuthError),
}

#[derive(Serialize, Debug)]
struct ErrorBody {
    success: bool,
    error: u16,
    message: String,
}

impl ApiError {
    pub fn unprocessable<E: fmt::Debug>(cause: E) -> Self {
        warn!("Unprocessable: {:?}", cause);
        ApiError::Unprocessable
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Auth(err)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Unprocessable => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Auth(e) => e.status(),
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        HttpResponse::build(status).json(ErrorBody {
            success: false,
            error: status.as_u16(),
            message: self.to_string(),
        })
    }
}

pub async fn resource_not_found() -> Result<HttpResponse, ApiError> {
    Err(ApiError::NotFound)
}

pub async fn method_not_allowed() -> Result<HttpResponse, ApiError> {
    Err(ApiError::MethodNotAllowed)
}
