use actix_web::http::header::AUTHORIZATION;
use actix_web::HttpRequest;
use anyhow::Result;
use chrono::{DateTime, Utc};
use log::*;

use super::{AuthError, KeySet, Permissions, RemoteKeys, TokenVerifier};
use crate::config::AuthConfig;

/// What a successful check tells the handler about the caller.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub subject: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub permissions: Permissions,
}

pub struct Authorizer {
    verifier: TokenVerifier,
}

/// Pulls the token out of an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    let header =
        header.ok_or(AuthError::InvalidHeader("Authorization header is expected."))?;
    let parts = header.split_whitespace().collect::<Vec<_>>();
    match parts.as_slice() {
        [scheme, ..] if !scheme.eq_ignore_ascii_case("bearer") => Err(AuthError::InvalidHeader(
            "Authorization header must start with \"Bearer\".",
        )),
        [_, token] => Ok(*token),
        [] | [_] => Err(AuthError::InvalidHeader("Token not found.")),
        _ => Err(AuthError::InvalidHeader(
            "Authorization header must be bearer token.",
        )),
    }
}

impl Authorizer {
    pub fn new(verifier: TokenVerifier) -> Self {
        Authorizer { verifier }
    }

    /// Fetches the issuer's signing keys and builds an authorizer around
    /// them.
    pub async fn discover(config: &AuthConfig) -> Result<Self> {
        let url = config.jwks_url()?;
        let keys =
            RemoteKeys::discover(url, config.key_cache_ttl(), config.key_fetch_timeout()).await?;
        let verifier = TokenVerifier::new(
            KeySet::Remote(keys),
            config.issuer.as_str(),
            &config.audience,
        );
        Ok(Authorizer::new(verifier))
    }

    pub async fn authorize(
        &self,
        req: &HttpRequest,
        required: &str,
    ) -> Result<AuthContext, AuthError> {
        let header = req
            .headers()
            .get(AUTHORIZATION)
            .map(|v| v.to_str())
            .transpose()
            .map_err(|_| AuthError::InvalidHeader("Authorization header is not valid text."))?;

        let res = self.authorize_header(header, required).await;
        match &res {
            Ok(ctx) => debug!("Granted {} to {} on {}", required, ctx.subject, req.path()),
            Err(e) => info!(
                "Refused {} on {}: {} ({})",
                required,
                req.path(),
                e,
                e.code()
            ),
        }
        res
    }

    /// The header value is `None` when the request carried no
    /// `Authorization` header.
    pub async fn authorize_header(
        &self,
        header: Option<&str>,
        required: &str,
    ) -> Result<AuthContext, AuthError> {
        let token = bearer_token(header)?;
        let claims = self.verifier.verify(token).await?;
        let permissions = claims.permissions()?;
        if !permissions.contains(required) {
            return Err(AuthError::InsufficientPermission);
        }

        Ok(AuthContext {
            expires_at: claims.expires_at(),
            subject: claims.sub,
            permissions,
        })
    }
}
