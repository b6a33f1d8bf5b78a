use actix_web::http::StatusCode;
use err_derive::Error;

/// Why a request was refused. The display text is what the client sees.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error(display = "{}", _0)]
    InvalidHeader(&'static str),
    #[error(display = "{}", _0)]
    InvalidToken(&'static str),
    #[error(display = "Token expired.")]
    TokenExpired,
    #[error(display = "{}", _0)]
    InvalidClaims(&'static str),
    #[error(display = "Permission not found.")]
    InsufficientPermission,
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::InsufficientPermission => StatusCode::FORBIDDEN,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidHeader(_) => "invalid_header",
            AuthError::InvalidToken(_) => "invalid_token",
            AuthError::TokenExpired => "token_expired",
            AuthError::InvalidClaims(_) => "invalid_claims",
            AuthError::InsufficientPermission => "unauthorized",
        }
    }
}
